use async_trait::async_trait;

use crate::models::{AiAnalysis, Screenshot, TradeDraft};

use super::error::ApiError;

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

/// Seam between the journal and whatever service critiques trades
#[async_trait]
pub trait TradeAnalyzer: Send + Sync {
    /// Backend name used in logs (e.g., "gemini")
    fn name(&self) -> &str;

    /// Ask for a structured review of a trade, optionally with its chart screenshot
    async fn analyze(
        &self,
        trade: &TradeDraft,
        screenshot: Option<&Screenshot>,
    ) -> Result<AiAnalysis, ApiError>;

    /// Get rate limit configuration for this backend
    fn rate_limit(&self) -> RateLimitConfig;
}
