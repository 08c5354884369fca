pub mod client;
pub mod error;
pub mod gemini;
pub mod rate_limiter;
pub mod secure_storage;

pub use client::{RateLimitConfig, TradeAnalyzer};
pub use error::ApiError;
pub use gemini::{GeminiClient, GeminiConfig};
pub use rate_limiter::RateLimiter;
pub use secure_storage::SecureStorage;
