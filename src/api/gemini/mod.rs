pub mod client;
pub mod types;

pub use client::{GeminiClient, GeminiConfig, DEFAULT_BASE_URL};
