//! Fixed backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay applied between retry rounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    jitter_ratio: f64,
}

impl Backoff {
    /// Create a backoff of `base` plus up to `jitter_ratio * base` of random jitter.
    pub fn new(base: Duration, jitter_ratio: f64) -> Self {
        Self {
            base,
            jitter_ratio: jitter_ratio.clamp(0.0, 1.0),
        }
    }

    /// A backoff without jitter.
    pub fn fixed(base: Duration) -> Self {
        Self::new(base, 0.0)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.backoff(), config.jitter_ratio)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// The next delay to sleep.
    pub fn delay(&self) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let jitter_range = (base_ms as f64 * self.jitter_ratio) as u64;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(base_ms + jitter)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let backoff = Backoff::new(Duration::from_millis(1000), 0.1);
        for _ in 0..100 {
            let delay = backoff.delay();
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay < Duration::from_millis(1100));
        }
    }

    #[test]
    fn fixed_has_no_jitter() {
        let backoff = Backoff::fixed(Duration::from_millis(250));
        assert_eq!(backoff.delay(), Duration::from_millis(250));
    }

    #[test]
    fn default_is_two_seconds() {
        let backoff = Backoff::default();
        assert_eq!(backoff.base(), Duration::from_secs(2));
        assert!(backoff.delay() >= Duration::from_secs(2));
    }

    #[test]
    fn jitter_ratio_is_clamped() {
        let backoff = Backoff::new(Duration::from_millis(10), 5.0);
        assert!(backoff.delay() < Duration::from_millis(20));
    }
}
