//! Fixed-delay rate limiter.
//!
//! netkeiba asks crawlers to stay at roughly one request per second, so
//! every fetch is followed by a mandatory pause before the next one may start.

use tokio::time::Duration;

/// Fixed pause taken after every request
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Create with default settings (1 request per second)
    pub fn default_limiter() -> Self {
        Self::from_millis(1000)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the inter-request delay.
    pub async fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        tokio::time::sleep(self.delay).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::default_limiter()
    }
}
