use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;

use super::client::RateLimitConfig;

/// Token bucket in front of the analysis endpoint.
/// Generative-AI quotas are published per minute, so the bucket refills per minute.
pub struct RateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        Self {
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    /// Wait until a request can be made
    pub async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        log::debug!("Analysis quota exhausted, waiting for the bucket to refill");
        self.limiter.until_ready().await;
    }

    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
