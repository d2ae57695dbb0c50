//! # Measurement window
//!
//! A run starts with a warmup period whose acquisitions are ignored, followed
//! by the measurement period. When the measurement period ends a background
//! timer sets the run's [`CancelSignal`], which stops every worker.
//!
//! ```text
//! run_start        measure_start                 measure_end
//!     |---- warmup ----|-------- measurement --------| cancel
//! ```

use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::CancelSignal;

/// The instants that bound a run's measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementWindow {
    run_start: Instant,
    measure_start: Instant,
    measure_end: Instant,
}

impl MeasurementWindow {
    /// A window whose warmup begins at `run_start`.
    pub fn new(run_start: Instant, warmup: Duration, measure: Duration) -> Self {
        let measure_start = run_start + warmup;
        Self {
            run_start,
            measure_start,
            measure_end: measure_start + measure,
        }
    }

    /// A window whose warmup begins now.
    pub fn starting_now(warmup: Duration, measure: Duration) -> Self {
        Self::new(Instant::now(), warmup, measure)
    }

    /// When the run (and its warmup) started.
    pub fn run_start(&self) -> Instant {
        self.run_start
    }

    /// First instant counted towards statistics.
    pub fn measure_start(&self) -> Instant {
        self.measure_start
    }

    /// Instant at which the run is cancelled; not itself counted.
    pub fn measure_end(&self) -> Instant {
        self.measure_end
    }

    /// Length of the measurement period.
    pub fn measure_duration(&self) -> Duration {
        self.measure_end - self.measure_start
    }

    /// Whether `at` falls in `[measure_start, measure_end)`.
    #[inline]
    pub fn contains(&self, at: Instant) -> bool {
        self.measure_start <= at && at < self.measure_end
    }

    /// The part of a wait that counts towards statistics.
    ///
    /// `None` when the acquisition at `acquired` lies outside the window.
    /// Otherwise the wait from `attempt` to `acquired`, with any part spent
    /// during warmup cut off. A worker whose first counted meal was requested
    /// before `measure_start` therefore reports less than its raw wait for
    /// that meal, which keeps each worker's total within the window.
    pub fn measured_wait(&self, attempt: Instant, acquired: Instant) -> Option<Duration> {
        if !self.contains(acquired) {
            return None;
        }
        Some(acquired.saturating_duration_since(attempt.max(self.measure_start)))
    }

    /// Starts the background timer that cancels the run at `measure_end`.
    ///
    /// The timer exits early if `cancel` is set by someone else.
    pub fn arm(&self, cancel: CancelSignal) -> io::Result<WindowTimer> {
        let window = *self;
        let handle = thread::Builder::new()
            .name("window-timer".into())
            .spawn(move || {
                if cancel.wait_until(window.measure_start) {
                    debug!("run cancelled during warmup");
                    return;
                }
                debug!("warmup finished, measuring");
                if cancel.wait_until(window.measure_end) {
                    debug!("run cancelled before the window closed");
                    return;
                }
                cancel.cancel();
                debug!("measurement window closed");
            })?;
        Ok(WindowTimer { handle })
    }
}

/// Handle to the thread started by [`MeasurementWindow::arm`].
#[derive(Debug)]
pub struct WindowTimer {
    handle: JoinHandle<()>,
}

impl WindowTimer {
    /// Waits for the timer thread to finish.
    pub fn join(self) {
        // The timer body cannot panic short of a logging failure.
        let _ = self.handle.join();
    }
}
