use crate::client::error_classification::ErrorClass;
use std::time::Duration;

/// Decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Retry budget and backoff shape shared by every error class.
///
/// The delay after attempt `a` (0-based) is `base_delay * 2^a + jitter * U(0, 1)`.
/// With the defaults that is `[1s, 2s)` after the first attempt and `[2s, 3s)` after the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total attempts per request, including the first one. Clamped to at least 1.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff before the attempt following `attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_delay_with(attempt, fastrand::f64())
    }

    /// Backoff with an explicit jitter sample in `[0, 1)`.
    pub fn backoff_delay_with(&self, attempt: u32, sample: f64) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let base = self.base_delay.saturating_mul(factor);
        let jitter =
            Duration::try_from_secs_f64(self.jitter.as_secs_f64() * sample.clamp(0.0, 1.0))
                .unwrap_or(Duration::MAX);
        base.saturating_add(jitter)
    }

    /// Decide what happens after `attempt` failed with `class`.
    pub fn decide(&self, attempt: u32, class: ErrorClass) -> Decision {
        if !class.is_retryable() || attempt + 1 >= self.max_attempts {
            return Decision::Fail;
        }
        Decision::Retry {
            delay: self.backoff_delay(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_is_three_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay, Duration::from_secs(1));
        assert_eq!(p.jitter, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_is_exponential_plus_jitter() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_delay_with(0, 0.0), Duration::from_secs(1));
        assert_eq!(p.backoff_delay_with(1, 0.0), Duration::from_secs(2));
        assert_eq!(p.backoff_delay_with(2, 0.0), Duration::from_secs(4));
        assert_eq!(p.backoff_delay_with(0, 0.5), Duration::from_millis(1500));
    }

    #[test]
    fn test_random_backoff_stays_in_window() {
        let p = RetryPolicy::default();
        for _ in 0..200 {
            let d0 = p.backoff_delay(0);
            assert!(d0 >= Duration::from_secs(1) && d0 < Duration::from_secs(2));
            let d1 = p.backoff_delay(1);
            assert!(d1 >= Duration::from_secs(2) && d1 < Duration::from_secs(3));
        }
    }

    #[test]
    fn test_huge_delays_saturate_instead_of_overflowing() {
        let p = RetryPolicy::new()
            .with_base_delay(Duration::MAX)
            .with_jitter(Duration::MAX);
        assert_eq!(p.backoff_delay_with(0, 0.999), Duration::MAX);
        assert_eq!(p.backoff_delay_with(40, 1.0), Duration::MAX);

        let p = RetryPolicy::new()
            .with_base_delay(Duration::from_secs(1))
            .with_jitter(Duration::MAX);
        assert!(p.backoff_delay_with(0, 0.999) > Duration::from_secs(1));
        assert!(p.backoff_delay(1) >= Duration::from_secs(2));
    }

    #[test]
    fn test_client_errors_fail_immediately() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(0, ErrorClass::TerminalClient), Decision::Fail);
    }

    #[test]
    fn test_transient_errors_retry_until_last_attempt() {
        let p = RetryPolicy::default();
        for class in [
            ErrorClass::TransientServer,
            ErrorClass::TransientNetwork,
            ErrorClass::Timeout,
            ErrorClass::UnexpectedContent,
        ] {
            assert!(matches!(p.decide(0, class), Decision::Retry { .. }));
            assert!(matches!(p.decide(1, class), Decision::Retry { .. }));
            assert_eq!(p.decide(2, class), Decision::Fail);
        }
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let p = RetryPolicy::new().with_max_attempts(0);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.decide(0, ErrorClass::Timeout), Decision::Fail);
    }
}
