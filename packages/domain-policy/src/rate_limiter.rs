//! Per-provider token-bucket rate limiting, built on the `governor`
//! crate.

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PolicyError, Result};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Token-bucket limiter for a single external provider (e.g. an
/// academic search API), plus a bounded wait before giving up.
pub struct ProviderRateLimiter {
    name: String,
    limiter: Arc<DefaultRateLimiter>,
    max_wait: Duration,
}

impl ProviderRateLimiter {
    /// `min_interval` is the minimum spacing between requests;
    /// `max_wait` bounds how long `acquire` will wait for a permit
    /// before giving up.
    pub fn new(name: impl Into<String>, min_interval: Duration, max_wait: Duration) -> Self {
        let per_second = (1.0 / min_interval.as_secs_f64()).max(0.01);
        let quota = Quota::per_second(NonZeroU32::new(per_second.ceil() as u32).unwrap())
            .allow_burst(NonZeroU32::new(1).unwrap());
        Self {
            name: name.into(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            max_wait,
        }
    }

    /// Acquire a permit, waiting up to `max_wait`. Returns an error if
    /// the bound is exceeded rather than blocking indefinitely.
    pub async fn acquire(&self) -> Result<()> {
        tokio::time::timeout(self.max_wait, self.limiter.until_ready())
            .await
            .map_err(|_| PolicyError::RateLimitWaitExceeded(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_within_bound() {
        let limiter = ProviderRateLimiter::new("test", Duration::from_millis(10), Duration::from_secs(1));
        assert!(limiter.acquire().await.is_ok());
    }
}
