//! Jittered exponential back-off for venue retries
//!
//! Delays grow geometrically up to a cap, with multiplicative jitter so a
//! fleet of retrying clients does not synchronize against a recovering
//! venue. Attempts are capped; exhaustion surfaces the last venue error.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Geometric growth factor per attempt.
    pub growth: f64,
    /// Total retry attempts before giving up.
    pub max_attempts: u32,
    /// Multiplicative jitter span, 0.0 to 1.0.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            growth: 2.0,
            max_attempts: 5,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Fast schedule for tests.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            growth: 2.0,
            max_attempts: 3,
            jitter: 0.0,
        }
    }
}

/// Retry state machine: call [`next_delay`](Self::next_delay) after each
/// failure until it returns `None`.
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    attempt: u32,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            current: policy.base_delay,
            attempt: 0,
            policy,
        }
    }

    /// Delay to sleep before the next attempt, `None` once attempts are
    /// exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        self.attempt += 1;

        let delay = self.jittered(self.current);
        let grown = self.current.as_secs_f64() * self.policy.growth;
        self.current = Duration::from_secs_f64(grown).min(self.policy.max_delay);
        Some(delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.policy.jitter <= 0.0 {
            return delay;
        }
        // Uniform in [1 - jitter/2, 1 + jitter/2).
        let spread = rand::thread_rng().gen::<f64>() * self.policy.jitter;
        let factor = 1.0 + spread - self.policy.jitter / 2.0;
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current = self.policy.base_delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            growth: 2.0,
            max_attempts: 4,
            jitter,
        }
    }

    #[test]
    fn test_growth_and_cap_without_jitter() {
        let mut backoff = ExponentialBackoff::new(policy(0.0));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400))); // capped
        assert_eq!(backoff.next_delay(), None); // exhausted
    }

    #[test]
    fn test_jitter_stays_near_nominal() {
        let mut backoff = ExponentialBackoff::new(policy(0.2));
        let delay = backoff.next_delay().unwrap();
        let ms = delay.as_secs_f64() * 1_000.0;
        assert!((90.0..110.0).contains(&ms), "jittered delay {ms}ms out of band");
    }

    #[test]
    fn test_reset() {
        let mut backoff = ExponentialBackoff::new(policy(0.0));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }
}
