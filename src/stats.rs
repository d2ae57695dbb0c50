//! # Stats
//!
//! Per-worker wait accounting for one run.
//!
//! Each worker owns one slot and is the only writer of it, so recording is a
//! pair of relaxed atomic adds with no cross-worker synchronization. Slots
//! are read after every worker has been joined; a worker that panicked
//! mid-run still leaves the meals it recorded behind.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Duration;

use crate::WorkerId;

#[derive(Debug, Default)]
struct Slot {
    wait_nanos: AtomicU64,
    meals: AtomicU64,
}

/// Wait totals and meal counts for every worker of a run.
#[derive(Debug)]
pub struct Stats {
    slots: Box<[Slot]>,
}

/// Snapshot of one worker's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerTally {
    /// Sum of counted waits.
    pub total_wait: Duration,
    /// Acquisitions completed inside the measurement window.
    pub meals: u64,
}

/// A worker's mean wait, or the sentinel for a worker that never ate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    /// Mean wait per meal.
    Finite(Duration),
    /// No meal was completed in the measurement window.
    Starved,
}

/// Per-worker averages plus the mean of the finite ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// One entry per worker, in worker order.
    pub per_worker: Vec<Average>,
    /// Mean of the finite entries of `per_worker`; `Starved` when none is finite.
    pub overall: Average,
}

impl Stats {
    /// Zeroed stats for `workers` workers.
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| Slot::default()).collect(),
        }
    }

    /// Number of worker slots.
    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Adds one meal preceded by `wait` to `worker`'s slot.
    #[inline]
    pub fn record(&self, worker: WorkerId, wait: Duration) {
        let slot = &self.slots[worker.index()];
        let nanos = u64::try_from(wait.as_nanos()).unwrap_or(u64::MAX);
        slot.wait_nanos.fetch_add(nanos, Relaxed);
        slot.meals.fetch_add(1, Relaxed);
    }

    /// Current totals of `worker`.
    pub fn tally(&self, worker: WorkerId) -> WorkerTally {
        let slot = &self.slots[worker.index()];
        WorkerTally {
            total_wait: Duration::from_nanos(slot.wait_nanos.load(Relaxed)),
            meals: slot.meals.load(Relaxed),
        }
    }

    /// Current totals of every worker, in worker order.
    pub fn tallies(&self) -> Vec<WorkerTally> {
        (0..self.slots.len()).map(|i| self.tally(WorkerId(i))).collect()
    }

    /// Averages every worker's wait.
    pub fn summarize(&self) -> Summary {
        Summary::from_tallies(&self.tallies())
    }
}

impl WorkerTally {
    /// Mean wait per meal, or [`Average::Starved`] with no meals.
    pub fn average(&self) -> Average {
        if self.meals == 0 {
            return Average::Starved;
        }
        let nanos = self.total_wait.as_nanos() / u128::from(self.meals);
        Average::Finite(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

impl Average {
    /// The average in fractional milliseconds, `None` if starved.
    pub fn as_millis_f64(&self) -> Option<f64> {
        match self {
            Average::Finite(wait) => Some(wait.as_secs_f64() * 1_000.0),
            Average::Starved => None,
        }
    }

    /// Whether this worker ate at least once.
    pub fn is_finite(&self) -> bool {
        matches!(self, Average::Finite(_))
    }
}

impl fmt::Display for Average {
    /// Milliseconds with three decimals, or `INF` for a starved worker.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_millis_f64() {
            Some(ms) => write!(f, "{ms:.3}"),
            None => f.write_str("INF"),
        }
    }
}

impl Summary {
    /// Builds the summary from per-worker tallies.
    pub fn from_tallies(tallies: &[WorkerTally]) -> Self {
        let per_worker: Vec<Average> = tallies.iter().map(WorkerTally::average).collect();

        let finite: Vec<Duration> = per_worker
            .iter()
            .filter_map(|avg| match avg {
                Average::Finite(wait) => Some(*wait),
                Average::Starved => None,
            })
            .collect();
        let overall = if finite.is_empty() {
            Average::Starved
        } else {
            let sum: Duration = finite.iter().sum();
            Average::Finite(sum / finite.len() as u32)
        };

        Self {
            per_worker,
            overall,
        }
    }

    /// Workers that completed no meal.
    pub fn starved(&self) -> impl Iterator<Item = WorkerId> + '_ {
        self.per_worker
            .iter()
            .enumerate()
            .filter(|(_, avg)| !avg.is_finite())
            .map(|(i, _)| WorkerId(i))
    }
}
