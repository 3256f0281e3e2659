//! Reconnect Policy
//!
//! Exponential backoff with jitter and an optional attempt cap.

use std::time::Duration;

use rand::Rng;

/// How long to wait before each reconnect attempt, and when to give up.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
    /// Upper bound on the un-jittered delay.
    pub max_delay: Duration,
    /// Jitter as a fraction of the delay, in `[0, 1]`.
    pub jitter: f64,
    /// Give up after this many consecutive failures. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            max_attempts: Some(8),
        }
    }
}

impl ReconnectPolicy {
    /// Constant delay, no jitter, unlimited retries.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            jitter: 0.0,
            max_attempts: None,
        }
    }

    /// Same policy, capped at `attempts` consecutive failures.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Un-jittered delay for the 1-based `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay before the 1-based `attempt`, or `None` once attempts are exhausted.
    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }

        let base = self.base_delay(attempt);
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if jitter == 0.0 || base.is_zero() {
            return Some(base);
        }

        let scale = 1.0 + rng.gen_range(-jitter..=jitter);
        Some(base.mul_f64(scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_doubles_from_two_seconds() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay(2), Duration::from_secs(4));
        assert_eq!(policy.base_delay(3), Duration::from_secs(8));
        assert_eq!(policy.base_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_fixed_policy_never_gives_up() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(2000));
        let mut rng = StdRng::seed_from_u64(1);
        for attempt in [1, 2, 50, 10_000] {
            assert_eq!(policy.delay_for(attempt, &mut rng), Some(Duration::from_millis(2000)));
        }
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(10)).with_max_attempts(3);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(policy.delay_for(3, &mut rng).is_some());
        assert!(policy.delay_for(4, &mut rng).is_none());
    }

    #[test]
    fn test_non_finite_jitter_is_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let policy = ReconnectPolicy { jitter, ..Default::default() };
            assert_eq!(policy.delay_for(1, &mut rng), Some(Duration::from_secs(2)));
        }
    }

    proptest! {
        #[test]
        fn prop_jittered_delay_within_bounds(attempt in 1u32..20, seed in any::<u64>()) {
            let policy = ReconnectPolicy { max_attempts: None, ..Default::default() };
            let mut rng = StdRng::seed_from_u64(seed);
            let base = policy.base_delay(attempt);
            let delay = policy.delay_for(attempt, &mut rng).unwrap();

            prop_assert!(delay >= base.mul_f64(0.8) - Duration::from_millis(1));
            prop_assert!(delay <= base.mul_f64(1.2) + Duration::from_millis(1));
            prop_assert!(base <= policy.max_delay);
        }
    }
}
