//! Parameters of a single simulation run.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::ArbiterError;

/// Timing and sizing of a run. Every run of a benchmark uses the same `Config`
/// for each strategy so their results are comparable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of workers, which is also the number of resources.
    pub workers: usize,
    /// Time after start during which acquisitions are not counted.
    pub warmup: Duration,
    /// Length of the measurement window that follows the warmup.
    pub measure: Duration,
    /// Bounds of the random thinking sleep.
    pub think: RangeInclusive<Duration>,
    /// Bounds of the random eating sleep.
    pub eat: RangeInclusive<Duration>,
    /// Nap between polling attempts of the busy-wait strategy.
    pub poll_interval: Duration,
    /// How long workers may keep running after the window closes.
    pub grace: Duration,
    /// Base seed for the per-worker generators; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 6,
            warmup: Duration::from_secs(2),
            measure: Duration::from_secs(10),
            think: Duration::from_millis(1)..=Duration::from_millis(10),
            eat: Duration::from_millis(1)..=Duration::from_millis(10),
            poll_interval: Duration::from_millis(1),
            grace: Duration::from_secs(5),
            seed: None,
        }
    }
}

impl Config {
    /// Sets the ring size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets warmup and measurement durations.
    pub fn with_window(mut self, warmup: Duration, measure: Duration) -> Self {
        self.warmup = warmup;
        self.measure = measure;
        self
    }

    /// Sets the thinking and eating bounds.
    pub fn with_pacing(
        mut self,
        think: RangeInclusive<Duration>,
        eat: RangeInclusive<Duration>,
    ) -> Self {
        self.think = think;
        self.eat = eat;
        self
    }

    /// Sets the busy-wait polling nap.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the grace period after cancellation.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Makes worker timing reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks that the configuration describes a runnable benchmark.
    pub fn validate(&self) -> Result<(), ArbiterError> {
        if self.workers < 2 {
            return Err(ArbiterError::RingTooSmall {
                workers: self.workers,
            });
        }
        if self.measure.is_zero() {
            return Err(ArbiterError::invalid("measurement window must be non-zero"));
        }
        if self.think.is_empty() {
            return Err(ArbiterError::invalid(format!(
                "think range {:?} is empty",
                self.think
            )));
        }
        if self.eat.is_empty() {
            return Err(ArbiterError::invalid(format!(
                "eat range {:?} is empty",
                self.eat
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ArbiterError::invalid("poll interval must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.workers, 6);
        assert_eq!(config.warmup, Duration::from_secs(2));
        assert_eq!(config.measure, Duration::from_secs(10));
    }

    #[test]
    fn rejects_small_rings() {
        let err = Config::default().with_workers(1).validate().unwrap_err();
        assert!(matches!(err, ArbiterError::RingTooSmall { workers: 1 }));
    }

    #[test]
    fn rejects_degenerate_timing() {
        let zero_window = Config::default().with_window(Duration::from_secs(1), Duration::ZERO);
        assert!(matches!(
            zero_window.validate(),
            Err(ArbiterError::InvalidConfig { .. })
        ));

        let inverted = Config::default().with_pacing(
            Duration::from_millis(5)..=Duration::from_millis(1),
            Duration::from_millis(1)..=Duration::from_millis(1),
        );
        assert!(matches!(
            inverted.validate(),
            Err(ArbiterError::InvalidConfig { .. })
        ));

        let no_poll = Config::default().with_poll_interval(Duration::ZERO);
        assert!(no_poll.validate().is_err());
    }

    #[test]
    fn zero_warmup_is_allowed() {
        Config::default()
            .with_window(Duration::ZERO, Duration::from_millis(100))
            .validate()
            .unwrap();
    }
}
