use async_trait::async_trait;
use histbars_application::rate_limiter::{RateLimiter, RateLimiterError};
use shaku::Component;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Grants requests no closer together than `delay`.
///
/// Each caller reserves the next free slot under the lock and then sleeps
/// until that slot outside of it, so concurrent callers queue up in order.
#[derive(Component)]
#[shaku(interface = RateLimiter)]
pub struct IntervalRateLimiter {
    delay: Duration,

    #[shaku(default = Mutex::new(None))]
    next_allowed: Mutex<Option<Instant>>,
}

impl IntervalRateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_allowed: Mutex::new(None),
        }
    }

    fn reserve(&self) -> Result<Instant, RateLimiterError> {
        let mut next_allowed = self
            .next_allowed
            .lock()
            .map_err(|_| RateLimiterError::Poisoned)?;

        let now = Instant::now();
        let slot = next_allowed.map_or(now, |next| next.max(now));
        *next_allowed = Some(slot + self.delay);
        Ok(slot)
    }
}

#[async_trait]
impl RateLimiter for IntervalRateLimiter {
    async fn acquire(&self) -> Result<(), RateLimiterError> {
        let slot = self.reserve()?;

        if slot > Instant::now() {
            debug!("Rate limiter: waiting {:?}", slot - Instant::now());
            sleep_until(slot).await;
        }
        Ok(())
    }
}
