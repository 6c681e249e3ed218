//! Retry policy with exponential backoff and jitter.
//!
//! The policy only decides; it never sleeps. The stage executor owns the
//! actual suspension so the wait can race a cancellation signal.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::capabilities::CapabilityError;

/// Backoff configuration for one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum attempts, including the initial one.
    pub max_attempts: u32,

    /// Base delay in milliseconds before the first retry.
    pub base_delay_ms: u64,

    /// Cap applied to the computed delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetrySettings {
    /// Pre-jitter delay for a 1-based attempt number: `min(base * 2^(n-1), max)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay (jitter already applied).
    RetryAfter(Duration),
    /// Stop retrying; the caller moves on to its fallback.
    GiveUp,
}

/// Decides whether the attempt that just failed should be retried.
///
/// `attempt` is 1-based. Non-retryable errors give up immediately regardless
/// of how many attempts remain; retryable errors back off exponentially with
/// a uniform jitter in `[0, 0.1 * delay]` to avoid thundering herds.
pub fn decide(attempt: u32, error: &CapabilityError, settings: &RetrySettings) -> RetryDecision {
    if !error.is_retryable() {
        return RetryDecision::GiveUp;
    }

    if attempt >= settings.max_attempts {
        return RetryDecision::GiveUp;
    }

    let delay = settings.backoff_delay(attempt);
    RetryDecision::RetryAfter(with_jitter(delay))
}

fn with_jitter(delay: Duration) -> Duration {
    let delay_ms = delay.as_millis() as u64;
    let jitter_cap = delay_ms / 10;
    if jitter_cap == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetrySettings {
        RetrySettings {
            max_attempts,
            base_delay_ms: base_ms,
            max_delay_ms: max_ms,
        }
    }

    #[test]
    fn test_backoff_delay_doubles_per_attempt() {
        let s = settings(5, 100, 60_000);
        assert_eq!(s.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(s.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(s.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(s.backoff_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_delay_monotone_and_capped() {
        let s = settings(10, 1000, 5000);

        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let delay = s.backoff_delay(attempt);
            assert!(delay >= previous, "delay shrank at attempt {attempt}");
            assert!(delay <= Duration::from_millis(5000));
            previous = delay;
        }
        assert_eq!(s.backoff_delay(10), Duration::from_millis(5000));
    }

    #[test]
    fn test_decide_retries_transient_until_bound() {
        let s = settings(3, 10, 1000);
        let err = CapabilityError::Transient("rate limited".into());

        assert!(matches!(decide(1, &err, &s), RetryDecision::RetryAfter(_)));
        assert!(matches!(decide(2, &err, &s), RetryDecision::RetryAfter(_)));
        assert_eq!(decide(3, &err, &s), RetryDecision::GiveUp);
    }

    #[test]
    fn test_decide_non_retryable_short_circuits() {
        let s = settings(5, 10, 1000);

        let unavailable = CapabilityError::Unavailable("video removed".into());
        assert_eq!(decide(1, &unavailable, &s), RetryDecision::GiveUp);

        let invalid = CapabilityError::InputInvalid("empty instruction".into());
        assert_eq!(decide(1, &invalid, &s), RetryDecision::GiveUp);
    }

    #[test]
    fn test_jitter_bounded_by_ten_percent() {
        let s = settings(5, 1000, 60_000);
        let err = CapabilityError::Transient("timeout".into());

        for _ in 0..50 {
            match decide(1, &err, &s) {
                RetryDecision::RetryAfter(delay) => {
                    assert!(delay >= Duration::from_millis(1000));
                    assert!(delay <= Duration::from_millis(1100));
                }
                RetryDecision::GiveUp => panic!("expected retry"),
            }
        }
    }
}
