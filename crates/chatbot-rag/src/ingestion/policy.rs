//! Pacing and retry policy for batch embedding

use std::time::Duration;

/// Decides how long to wait before each batch and between retries of a
/// failed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Delay before every batch except the first
    pub batch_delay: Duration,
    /// Retries of a failed batch before it is skipped
    pub max_retries: u32,
    /// Cap for the exponential retry backoff
    pub max_delay: Duration,
}

impl PacingPolicy {
    /// No pacing and no retries
    pub fn none() -> Self {
        Self {
            batch_delay: Duration::ZERO,
            max_retries: 0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before submitting batch `batch_index` (0-based)
    pub fn delay_before(&self, batch_index: usize) -> Duration {
        if batch_index == 0 {
            Duration::ZERO
        } else {
            self.batch_delay
        }
    }

    /// Backoff before retry `attempt` (1-based): `batch_delay * 2^(attempt-1)`,
    /// at least one second when no pacing is configured, capped at `max_delay`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let base = if self.batch_delay.is_zero() {
            Duration::from_secs(1)
        } else {
            self.batch_delay
        };
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether batch attempt `attempt` (0 = first try) may be retried
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(500),
            max_retries: 0,
            max_delay: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_batch_is_not_delayed() {
        let policy = PacingPolicy::default();
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_millis(500));
        assert_eq!(policy.delay_before(7), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        let policy = PacingPolicy {
            batch_delay: Duration::from_millis(500),
            max_retries: 5,
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.retry_delay(1), Duration::from_millis(500));
        assert_eq!(policy.retry_delay(2), Duration::from_secs(1));
        assert_eq!(policy.retry_delay(3), Duration::from_secs(2));
        assert_eq!(policy.retry_delay(4), Duration::from_secs(3));
        assert_eq!(policy.retry_delay(40), Duration::from_secs(3));
    }

    #[test]
    fn test_none_never_waits_or_retries() {
        let policy = PacingPolicy::none();
        assert_eq!(policy.delay_before(3), Duration::ZERO);
        assert_eq!(policy.retry_delay(2), Duration::ZERO);
        assert!(!policy.should_retry(0));
    }
}
