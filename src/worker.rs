//! # Worker
//!
//! One worker per ring position, each on its own OS thread, cycling through
//!
//! ```text
//! Thinking -> Attempting -> Eating -> Releasing -> Thinking ...
//!     \            \
//!      `------------`--> Stopped   (cancel observed)
//! ```
//!
//! Cancellation is checked at the top of every cycle, inside the strategy's
//! `acquire`, and by the interruptible think/eat sleeps. A worker that is
//! cancelled while eating still releases its pair before it stops.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::{Arbiter, CancelSignal, Config, MeasurementWindow, Stats, WorkerId};

/// Where a worker is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sleeping a random interval before the next attempt.
    Thinking,
    /// Inside the strategy's `acquire`.
    Attempting,
    /// Holding the pair for a random interval.
    Eating,
    /// Handing the pair back.
    Releasing,
    /// Cancel observed; the loop has ended.
    Stopped,
}

/// Holds a worker's pair and gives it back on drop.
///
/// Dropping during a panic still releases, so neighbours of a failed worker
/// are not left blocked.
struct Held {
    arbiter: Arc<dyn Arbiter>,
    worker: WorkerId,
}

impl Drop for Held {
    fn drop(&mut self) {
        self.arbiter.release(self.worker);
    }
}

/// What a worker did over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerReport {
    /// Completed think/eat/release cycles, inside or outside the window.
    pub cycles: u64,
    /// Cycles whose acquisition was counted in the stats.
    pub measured: u64,
}

/// The think/attempt/eat/release loop of a single worker.
pub struct Worker {
    id: WorkerId,
    arbiter: Arc<dyn Arbiter>,
    cancel: CancelSignal,
    window: MeasurementWindow,
    stats: Arc<Stats>,
    think: RangeInclusive<Duration>,
    eat: RangeInclusive<Duration>,
    rng: StdRng,
    phase: Phase,
    held: Option<Held>,
    report: WorkerReport,
}

impl Worker {
    /// Creates worker `id` in the `Thinking` phase, paced by `config`.
    ///
    /// With `config.seed = Some(s)` the worker's generator is seeded with
    /// `s + id`; otherwise it is seeded from OS entropy.
    pub fn new(
        id: WorkerId,
        arbiter: Arc<dyn Arbiter>,
        cancel: CancelSignal,
        window: MeasurementWindow,
        stats: Arc<Stats>,
        config: &Config,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id.index() as u64)),
            None => StdRng::from_entropy(),
        };
        Self {
            id,
            arbiter,
            cancel,
            window,
            stats,
            think: config.think.clone(),
            eat: config.eat.clone(),
            rng,
            phase: Phase::Thinking,
            held: None,
            report: WorkerReport::default(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the loop until cancellation and returns what the worker did.
    pub fn run(mut self) -> WorkerReport {
        while self.advance() != Phase::Stopped {}
        debug!(worker = %self.id, cycles = self.report.cycles, "stopped");
        self.report
    }

    /// Performs the current phase and moves to the next one, which is returned.
    pub fn advance(&mut self) -> Phase {
        self.phase = self.step();
        self.phase
    }

    fn step(&mut self) -> Phase {
        match self.phase {
            Phase::Thinking => {
                if self.cancel.is_cancelled() {
                    return Phase::Stopped;
                }
                let nap = self.rng.gen_range(self.think.clone());
                if self.cancel.sleep(nap) {
                    Phase::Attempting
                } else {
                    Phase::Stopped
                }
            }
            Phase::Attempting => {
                let attempt = Instant::now();
                if !self.arbiter.acquire(self.id, &self.cancel) {
                    return Phase::Stopped;
                }
                let acquired = Instant::now();
                self.held = Some(Held {
                    arbiter: Arc::clone(&self.arbiter),
                    worker: self.id,
                });

                if let Some(wait) = self.window.measured_wait(attempt, acquired) {
                    self.stats.record(self.id, wait);
                    self.report.measured += 1;
                    trace!(worker = %self.id, ?wait, "ate");
                }
                Phase::Eating
            }
            Phase::Eating => {
                let meal = self.rng.gen_range(self.eat.clone());
                // Interrupted or not, the pair is released next.
                self.cancel.sleep(meal);
                Phase::Releasing
            }
            Phase::Releasing => {
                self.held = None;
                self.report.cycles += 1;
                Phase::Thinking
            }
            Phase::Stopped => Phase::Stopped,
        }
    }
}
