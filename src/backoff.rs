//! Exponential backoff policy for automatic reconnection.
//!
//! Delay for automatic attempt `n` (n >= 1) is `min(base * 2^(n-1), cap)`.
//! With the default base of 1s and cap of 30s the schedule runs
//! 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// BackoffPolicy
// ============================================================================

/// Bounded exponential backoff schedule.
///
/// The policy is a pure function of the attempt number; the manager owns
/// the attempt counter itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first automatic attempt.
    base: Duration,
    /// Upper bound on any delay.
    cap: Duration,
}

impl BackoffPolicy {
    /// Creates a backoff policy with the given base delay and cap.
    #[inline]
    #[must_use]
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Returns the base delay.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Returns the delay cap.
    #[inline]
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Returns the delay before automatic attempt `attempt` (1-based).
    ///
    /// `attempt` 0 is treated as 1. Arithmetic saturates, so very large
    /// attempt numbers simply return the cap.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 1u64 << exponent;
        let delay = self
            .base
            .checked_mul(u32::try_from(factor).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX);
        delay.min(self.cap)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn reference_policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    #[test]
    fn test_reference_schedule() {
        let policy = reference_policy();
        let delays: Vec<u64> = (1..=6).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30]);
    }

    #[test]
    fn test_cap_holds_forever() {
        let policy = reference_policy();
        assert_eq!(policy.delay(6), Duration::from_secs(30));
        assert_eq!(policy.delay(100), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_attempt_zero_treated_as_one() {
        let policy = reference_policy();
        assert_eq!(policy.delay(0), policy.delay(1));
    }

    #[test]
    fn test_sub_second_base() {
        let policy = BackoffPolicy::new(Duration::from_millis(250), Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_millis(250));
        assert_eq!(policy.delay(2), Duration::from_millis(500));
        assert_eq!(policy.delay(3), Duration::from_secs(1));
        assert_eq!(policy.delay(10), Duration::from_secs(5));
    }

    proptest! {
        #[test]
        fn prop_delay_never_exceeds_cap(
            base_ms in 1u64..10_000,
            cap_ms in 1u64..120_000,
            attempt in 0u32..10_000,
        ) {
            let policy = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(cap_ms),
            );
            prop_assert!(policy.delay(attempt) <= policy.cap());
        }

        #[test]
        fn prop_delay_nondecreasing(
            base_ms in 1u64..10_000,
            cap_ms in 1u64..120_000,
            attempt in 1u32..64,
        ) {
            let policy = BackoffPolicy::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(cap_ms),
            );
            prop_assert!(policy.delay(attempt) <= policy.delay(attempt + 1));
        }
    }
}
