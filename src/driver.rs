//! # Simulation driver
//!
//! Runs one strategy over one ring for one measurement window:
//!
//! 1. build a fresh strategy, [`Stats`] and [`CancelSignal`];
//! 2. arm the [`MeasurementWindow`] timer;
//! 3. spawn one OS thread per worker, all sharing the strategy;
//! 4. wait for every worker to leave, bounded by `measure_end + grace`;
//! 5. join, tolerating workers that panicked, and summarize.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, info_span, warn};

use crate::{
    Arbiter, ArbiterError, CancelSignal, Config, MeasurementWindow, Ring, Stats, StrategyKind,
    Summary, Worker, WorkerId, WorkerReport, WorkerTally,
};

/// Counts workers that have not exited yet.
#[derive(Debug)]
struct Roster {
    running: Mutex<usize>,
    left: Condvar,
}

/// Marks its worker as gone when dropped, including on panic.
struct Departure<'a> {
    roster: &'a Roster,
}

impl Roster {
    fn new() -> Self {
        Self {
            running: Mutex::new(0),
            left: Condvar::new(),
        }
    }

    fn enlist(&self) {
        *self.running.lock() += 1;
    }

    fn depart(&self) -> Departure<'_> {
        Departure { roster: self }
    }

    /// Waits until every worker has left or `deadline` passes.
    ///
    /// Returns the number still running.
    fn wait_until(&self, deadline: Instant) -> usize {
        let mut running = self.running.lock();
        while *running > 0 {
            if self.left.wait_until(&mut running, deadline).timed_out() {
                break;
            }
        }
        *running
    }
}

impl Drop for Departure<'_> {
    fn drop(&mut self) {
        let mut running = self.roster.running.lock();
        *running -= 1;
        if *running == 0 {
            self.roster.left.notify_all();
        }
    }
}

/// Outcome of one run of one strategy.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Record name of the strategy.
    pub strategy: &'static str,
    /// Ring size.
    pub workers: usize,
    /// Raw per-worker totals the summary was computed from.
    pub tallies: Vec<WorkerTally>,
    /// Per-worker averages and their overall mean.
    pub summary: Summary,
    /// What each worker reported; `None` for workers that panicked.
    pub outcomes: Vec<Option<WorkerReport>>,
    /// Strategy-specific contention count at the end of the run.
    pub contention: u64,
    /// Wall-clock time from start to the last join.
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of workers that terminated abnormally.
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_none()).count()
    }

    /// Total cycles completed by the workers that exited normally.
    pub fn cycles(&self) -> u64 {
        self.outcomes.iter().flatten().map(|o| o.cycles).sum()
    }
}

/// A validated configuration ready to run strategies.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: Config,
    ring: Ring,
}

impl Simulation {
    /// Validates `config` and prepares its ring.
    pub fn new(config: Config) -> Result<Self, ArbiterError> {
        config.validate()?;
        let ring = Ring::new(config.workers)?;
        Ok(Self { config, ring })
    }

    /// The run configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The ring every run arbitrates over.
    pub fn ring(&self) -> Ring {
        self.ring
    }

    /// Runs a fresh instance of a built-in strategy.
    pub fn run(&self, kind: StrategyKind) -> Result<RunReport, ArbiterError> {
        self.run_with(kind.build(self.ring, &self.config))
    }

    /// Runs the given strategy instance.
    ///
    /// The instance must arbitrate over [`Simulation::ring`] and should be
    /// fresh: resources still held from an earlier run would never be freed.
    pub fn run_with(&self, arbiter: Arc<dyn Arbiter>) -> Result<RunReport, ArbiterError> {
        let span = info_span!("run", strategy = arbiter.name(), workers = self.ring.size());
        let _entered = span.enter();

        let cancel = CancelSignal::new();
        let stats = Arc::new(Stats::new(self.ring.size()));
        let roster = Arc::new(Roster::new());
        let window = MeasurementWindow::starting_now(self.config.warmup, self.config.measure);
        info!(
            warmup = ?self.config.warmup,
            measure = ?self.config.measure,
            "starting run"
        );

        let timer = window.arm(cancel.clone())?;
        let mut handles = Vec::with_capacity(self.ring.size());
        for id in self.ring.workers() {
            match self.spawn(id, &arbiter, &cancel, window, &stats, &roster) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    cancel.cancel();
                    error!(worker = %id, %err, "failed to spawn worker, aborting run");
                    roster.wait_until(Instant::now() + self.config.grace);
                    timer.join();
                    return Err(err.into());
                }
            }
        }

        let deadline = window.measure_end() + self.config.grace;
        let pending = roster.wait_until(deadline);
        if pending > 0 {
            // Make sure nobody keeps going if the window timer was not the cause.
            cancel.cancel();
            error!(pending, grace = ?self.config.grace, "workers did not stop in time");
            return Err(ArbiterError::Stalled {
                pending,
                grace: self.config.grace,
            });
        }

        let outcomes: Vec<Option<WorkerReport>> = handles
            .into_iter()
            .enumerate()
            .map(|(id, handle)| match handle.join() {
                Ok(report) => Some(report),
                Err(_) => {
                    warn!(worker = id, "worker terminated abnormally");
                    None
                }
            })
            .collect();
        timer.join();

        let tallies = stats.tallies();
        let report = RunReport {
            strategy: arbiter.name(),
            workers: self.ring.size(),
            summary: Summary::from_tallies(&tallies),
            tallies,
            outcomes,
            contention: arbiter.contention(),
            elapsed: window.run_start().elapsed(),
        };
        info!(
            cycles = report.cycles(),
            contention = report.contention,
            failures = report.failures(),
            overall_ms = %report.summary.overall,
            "run finished"
        );
        Ok(report)
    }

    fn spawn(
        &self,
        id: WorkerId,
        arbiter: &Arc<dyn Arbiter>,
        cancel: &CancelSignal,
        window: MeasurementWindow,
        stats: &Arc<Stats>,
        roster: &Arc<Roster>,
    ) -> std::io::Result<JoinHandle<WorkerReport>> {
        let worker = Worker::new(
            id,
            Arc::clone(arbiter),
            cancel.clone(),
            window,
            Arc::clone(stats),
            &self.config,
        );
        let roster = Arc::clone(roster);
        roster.enlist();

        let spawned = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn({
                let roster = Arc::clone(&roster);
                move || {
                    let _departure = roster.depart();
                    let _span = info_span!("worker", id = id.index()).entered();
                    worker.run()
                }
            });
        if spawned.is_err() {
            // The closure, and with it the departure, never ran.
            drop(roster.depart());
        }
        debug!(worker = %id, ok = spawned.is_ok(), "spawned");
        spawned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short() -> Config {
        Config::default()
            .with_workers(3)
            .with_window(Duration::from_millis(20), Duration::from_millis(150))
            .with_pacing(
                Duration::from_micros(200)..=Duration::from_millis(1),
                Duration::from_micros(200)..=Duration::from_millis(1),
            )
            .with_grace(Duration::from_secs(5))
            .with_seed(11)
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let err = Simulation::new(Config::default().with_workers(1)).unwrap_err();
        assert!(matches!(err, ArbiterError::RingTooSmall { workers: 1 }));
    }

    #[test]
    fn roster_counts_departures() {
        let roster = Roster::new();
        roster.enlist();
        roster.enlist();
        drop(roster.depart());
        assert_eq!(roster.wait_until(Instant::now()), 1);
        drop(roster.depart());
        assert_eq!(roster.wait_until(Instant::now() + Duration::from_secs(1)), 0);
    }

    #[test]
    fn run_reports_every_worker() {
        let sim = Simulation::new(short()).unwrap();
        for kind in StrategyKind::ALL {
            let report = sim.run(kind).unwrap();
            assert_eq!(report.strategy, kind.name());
            assert_eq!(report.workers, 3);
            assert_eq!(report.summary.per_worker.len(), 3);
            assert_eq!(report.outcomes.len(), 3);
            assert_eq!(report.failures(), 0);
            assert!(report.cycles() > 0);
            assert!(report.elapsed >= Duration::from_millis(170));
        }
    }

    /// A strategy whose acquire panics for one worker does not sink the run.
    #[test]
    fn panicking_worker_is_tolerated() {
        struct Flaky(Arc<dyn Arbiter>);

        impl Arbiter for Flaky {
            fn name(&self) -> &'static str {
                "flaky"
            }

            fn acquire(&self, worker: WorkerId, cancel: &CancelSignal) -> bool {
                assert_ne!(worker, WorkerId(0), "worker 0 always fails");
                self.0.acquire(worker, cancel)
            }

            fn release(&self, worker: WorkerId) {
                self.0.release(worker)
            }
        }

        let sim = Simulation::new(short()).unwrap();
        let inner = StrategyKind::Ordered.build(sim.ring(), sim.config());
        let report = sim.run_with(Arc::new(Flaky(inner))).unwrap();

        assert_eq!(report.failures(), 1);
        assert!(report.outcomes[0].is_none());
        assert!(report.outcomes[1].is_some());
        assert_eq!(report.summary.per_worker[0], crate::Average::Starved);
    }

    /// A strategy that never returns is reported as a stall, not a hang.
    #[test]
    fn stuck_workers_are_reported() {
        struct Stuck;

        impl Arbiter for Stuck {
            fn name(&self) -> &'static str {
                "stuck"
            }

            fn acquire(&self, _worker: WorkerId, _cancel: &CancelSignal) -> bool {
                thread::sleep(Duration::from_secs(3));
                false
            }

            fn release(&self, _worker: WorkerId) {}
        }

        let config = short()
            .with_window(Duration::ZERO, Duration::from_millis(20))
            .with_grace(Duration::from_millis(50));
        let sim = Simulation::new(config).unwrap();
        let err = sim.run_with(Arc::new(Stuck)).unwrap_err();
        assert!(matches!(err, ArbiterError::Stalled { pending: 3, .. }));
    }
}
