//! Retry policy: capped exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::DeliveryConfig;

/// Backoff schedule for transient delivery failures.
///
/// The delay before retry N is `base * 2^(N-1)` plus additive jitter drawn
/// from `[0, delay/2)`, capped at `cap`. Because the jittered ranges of
/// consecutive attempts never overlap (`1.5d < 2d`), the schedule is
/// monotonic non-decreasing up to the cap.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    /// Creates a policy with explicit bounds.
    pub fn new(max_attempts: u32, base: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            base,
            cap,
        }
    }

    /// Returns the backoff to sleep after the given failed attempt number
    /// (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        // Beyond 2^20 the cap has long since taken over.
        let exp = (attempt - 1).min(20);

        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let cap_ms = self.cap.as_millis().min(u64::MAX as u128) as u64;

        let delay_ms = base_ms.saturating_mul(1u64 << exp);
        if delay_ms >= cap_ms {
            return Duration::from_millis(cap_ms);
        }

        let jitter_span = delay_ms / 2;
        let jitter_ms = if jitter_span == 0 {
            0
        } else {
            rand::rng().random_range(0..jitter_span)
        };

        Duration::from_millis(delay_ms.saturating_add(jitter_ms).min(cap_ms))
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self::new(config.max_attempts, config.base_backoff, config.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn policy(base_ms: u64, cap_ms: u64) -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(base_ms), Duration::from_millis(cap_ms))
    }

    #[test]
    fn test_backoff_within_jitter_bounds() {
        let policy = policy(100, 60_000);

        for attempt in 1..=8u32 {
            let delay_ms = 100u64 << (attempt - 1);
            for _ in 0..50 {
                let backoff = policy.backoff_for(attempt).as_millis() as u64;
                assert!(backoff >= delay_ms, "attempt {attempt}: {backoff} < {delay_ms}");
                assert!(
                    backoff < delay_ms + delay_ms / 2,
                    "attempt {attempt}: {backoff} exceeds jitter bound"
                );
            }
        }
    }

    #[test]
    fn test_backoff_is_monotonic_up_to_cap() {
        let policy = policy(100, 60_000);

        for attempt in 1..=12u32 {
            let current = policy.backoff_for(attempt);
            let next = policy.backoff_for(attempt + 1);
            assert!(next >= current, "attempt {attempt}: {next:?} < {current:?}");
        }
    }

    #[test]
    fn test_backoff_caps_exactly() {
        let policy = policy(100, 1_000);

        // 100 * 2^4 = 1600 >= cap, so attempt 5 onward returns the cap.
        assert_eq!(policy.backoff_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_for(50), Duration::from_millis(1_000));
    }

    #[test]
    fn test_attempt_zero_treated_as_first() {
        let policy = policy(100, 60_000);
        let backoff = policy.backoff_for(0).as_millis() as u64;
        assert!(backoff >= 100 && backoff < 150);
    }

    proptest! {
        #[test]
        fn prop_backoff_never_exceeds_cap(
            base_ms in 1u64..1_000,
            cap_ms in 1u64..120_000,
            attempt in 1u32..64,
        ) {
            let policy = policy(base_ms, cap_ms);
            let backoff = policy.backoff_for(attempt).as_millis() as u64;
            prop_assert!(backoff <= cap_ms);

            let delay = (base_ms as u128) << (attempt - 1).min(20);
            let floor = delay.min(cap_ms as u128) as u64;
            prop_assert!(backoff >= floor);
        }
    }
}
