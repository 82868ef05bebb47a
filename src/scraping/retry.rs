//! Retry policy for adapter invocations
//!
//! Retry is modeled as a value (max attempts plus a backoff schedule) passed
//! into the orchestrator, so policies are testable and swappable per
//! deployment rather than hand-rolled loops.

use rand::Rng;
use std::time::Duration;

use crate::config::ScrapeConfig;

/// Bounded retry with exponential backoff.
///
/// Retry exhaustion converts a transient fault into a terminal per-retailer
/// failure; it never aborts the batch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retry)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per subsequent attempt
    pub base_delay: Duration,
    /// Hard ceiling on any single backoff delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Backoff before retry number `retry` (0-based): base * 2^retry with a
    /// small random jitter, capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(retry.min(16)));
        let jitter_ceiling = (self.base_delay.as_millis() as u64 / 2).max(1);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ceiling));
        (exp + jitter).min(self.max_delay)
    }

    /// Number of retries remaining after `attempts_made` attempts.
    pub fn retries_left(&self, attempts_made: u32) -> u32 {
        self.max_attempts.saturating_sub(attempts_made)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(60));
        // Jitter adds at most base/2, so successive tiers stay ordered.
        assert!(policy.backoff(0) >= Duration::from_millis(100));
        assert!(policy.backoff(0) < Duration::from_millis(200));
        assert!(policy.backoff(2) >= Duration::from_millis(400));
        assert!(policy.backoff(2) < Duration::from_millis(500));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_millis(500), Duration::from_secs(2));
        for retry in 0..10 {
            assert!(policy.backoff(retry) <= Duration::from_secs(2));
        }
    }

    #[test]
    fn at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn retries_left_saturates() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        assert_eq!(policy.retries_left(1), 2);
        assert_eq!(policy.retries_left(3), 0);
        assert_eq!(policy.retries_left(7), 0);
    }
}
