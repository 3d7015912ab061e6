use std::time::Duration;

/// Bounded exponential backoff for transient request failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a page gets `max_retries + 1` tries.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Per-page retry state: failures seen so far against a policy.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Records a failure and returns how long to wait before the next try,
    /// or `None` once the retry budget is spent. A server supplied `hint`
    /// replaces the computed delay.
    pub fn next_delay(&mut self, hint: Option<Duration>) -> Option<Duration> {
        self.failures += 1;
        if self.failures > self.policy.max_retries {
            return None;
        }
        Some(hint.unwrap_or_else(|| self.policy.delay_for(self.failures - 1)))
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delays_double_until_cap() {
        let mut backoff = Backoff::new(policy(5));

        let delays: Vec<Duration> = (0..5).filter_map(|_| backoff.next_delay(None)).collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
    }

    #[test]
    fn test_budget_exhausted_after_max_retries() {
        let mut backoff = Backoff::new(policy(2));

        assert!(backoff.next_delay(None).is_some());
        assert!(backoff.next_delay(None).is_some());
        assert_eq!(backoff.next_delay(None), None);
        assert_eq!(backoff.failures(), 3);
    }

    #[test]
    fn test_zero_retries_fails_immediately() {
        let mut backoff = Backoff::new(policy(0));
        assert_eq!(backoff.next_delay(None), None);
    }

    #[test]
    fn test_server_hint_replaces_computed_delay() {
        let mut backoff = Backoff::new(policy(3));

        assert_eq!(
            backoff.next_delay(Some(Duration::from_secs(30))),
            Some(Duration::from_secs(30))
        );
        assert_eq!(backoff.next_delay(None), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_large_retry_index_does_not_overflow() {
        assert_eq!(policy(100).delay_for(64), Duration::from_secs(5));
    }
}
