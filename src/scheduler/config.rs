//! Schedule configuration.
//!
//! Scheduled passes fire once per interval for every installed repository. With
//! jitter enabled, each repository's pass is delayed by a random amount within
//! the interval so that a large installation base does not hit the API at the
//! same instant.

use std::time::Duration;

use rand::Rng;

/// Default interval between scheduled passes (5 minutes).
pub const DEFAULT_INTERVAL_MS: u64 = 300_000;

/// Configuration for the periodic scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Time between ticks.
    ///
    /// Default: 5 minutes. Configure via `SCHEDULER_INTERVAL_MS`.
    pub interval: Duration,

    /// Whether each repository's pass is delayed by a random amount in
    /// `[0, interval)`.
    ///
    /// Default: true. Configure via `SCHEDULER_DELAY`.
    pub jitter: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleConfig {
    pub fn new() -> Self {
        ScheduleConfig {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            jitter: true,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the delay before one repository's pass within a tick.
    ///
    /// Always zero when jitter is disabled; otherwise uniform in `[0, interval)`.
    pub fn pass_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let max_ms = self.interval.as_millis().min(u64::MAX as u128) as u64;
        if !self.jitter || max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_config_has_expected_values() {
        let config = ScheduleConfig::new();

        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.jitter);
    }

    #[test]
    fn no_jitter_means_no_delay() {
        let config = ScheduleConfig::new().with_jitter(false);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            assert_eq!(config.pass_delay(&mut rng), Duration::ZERO);
        }
    }

    #[test]
    fn zero_interval_never_panics() {
        let config = ScheduleConfig::new().with_interval(Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(config.pass_delay(&mut rng), Duration::ZERO);
    }

    proptest! {
        #[test]
        fn delay_stays_within_interval(interval_ms in 1u64..10_000_000, seed: u64) {
            let config = ScheduleConfig::new().with_interval(Duration::from_millis(interval_ms));
            let mut rng = StdRng::seed_from_u64(seed);

            let delay = config.pass_delay(&mut rng);

            prop_assert!(delay < config.interval);
        }
    }
}
