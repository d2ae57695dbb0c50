//! Busy-wait-both: claim both flags under one lock, or nap and poll again.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Duration;

use tracing::trace;

use super::Arbiter;
use crate::{BackOff, CancelSignal, Ring, SpinLock, WorkerId};

/// Polling strategy over a table of "in use" flags.
///
/// The whole table sits behind a single [`SpinLock`]. An attempt checks both
/// of the worker's flags and sets both in the same critical section, so a
/// worker never holds one resource while waiting for the other. When either
/// flag is taken the worker drops the lock, naps for `poll` and retries,
/// re-checking cancellation on every iteration.
pub struct BusyWaitBoth {
    ring: Ring,
    in_use: SpinLock<Box<[bool]>>,
    poll: Duration,
    retries: AtomicU64,
}

impl BusyWaitBoth {
    /// Record name of this strategy.
    pub const NAME: &'static str = "busy-wait-both";

    /// Creates the strategy with every resource free.
    pub fn new(ring: Ring, poll: Duration) -> Self {
        Self {
            ring,
            in_use: SpinLock::new(vec![false; ring.size()].into_boxed_slice()),
            poll,
            retries: AtomicU64::new(0),
        }
    }

    /// Claims both resources of `worker` if both are free.
    fn try_claim(&self, worker: WorkerId) -> bool {
        let (left, right) = self.ring.pair(worker);
        self.in_use.with_lock(|in_use| {
            if in_use[left.index()] || in_use[right.index()] {
                return false;
            }
            in_use[left.index()] = true;
            in_use[right.index()] = true;
            true
        })
    }
}

impl Arbiter for BusyWaitBoth {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn acquire(&self, worker: WorkerId, cancel: &CancelSignal) -> bool {
        let backoff = BackOff::with_nap(self.poll);
        let mut attempts = 0u64;
        loop {
            if cancel.is_cancelled() {
                trace!(%worker, attempts, "gave up polling");
                return false;
            }
            if self.try_claim(worker) {
                trace!(%worker, attempts, "claimed pair");
                return true;
            }
            attempts += 1;
            self.retries.fetch_add(1, Relaxed);
            if !backoff.nap(cancel) {
                trace!(%worker, attempts, "gave up polling");
                return false;
            }
        }
    }

    fn release(&self, worker: WorkerId) {
        let (left, right) = self.ring.pair(worker);
        self.in_use.with_lock(|in_use| {
            in_use[left.index()] = false;
            in_use[right.index()] = false;
        });
    }

    fn contention(&self) -> u64 {
        self.retries.load(Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn strategy(size: usize) -> BusyWaitBoth {
        BusyWaitBoth::new(Ring::new(size).unwrap(), Duration::from_millis(1))
    }

    #[test]
    fn claims_both_or_neither() {
        let arbiter = strategy(3);
        let cancel = CancelSignal::new();

        assert!(arbiter.acquire(WorkerId(0), &cancel));
        // Worker 1 needs resource 1, which worker 0 holds. Neither of its
        // flags may be set by the failed attempt.
        assert!(!arbiter.try_claim(WorkerId(1)));
        assert_eq!(&arbiter.in_use.lock()[..], &[true, true, false]);

        arbiter.release(WorkerId(0));
        assert_eq!(&arbiter.in_use.lock()[..], &[false, false, false]);
        assert!(arbiter.try_claim(WorkerId(1)));
    }

    #[test]
    fn cancelled_poll_returns_false_and_holds_nothing() {
        let arbiter = Arc::new(strategy(2));
        let cancel = CancelSignal::new();
        assert!(arbiter.acquire(WorkerId(0), &cancel));

        let waiter = {
            let arbiter = Arc::clone(&arbiter);
            let cancel = cancel.clone();
            thread::spawn(move || arbiter.acquire(WorkerId(1), &cancel))
        };
        thread::sleep(Duration::from_millis(30));
        let start = Instant::now();
        cancel.cancel();

        assert!(!waiter.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(arbiter.contention() > 0, "waiter should have polled");
        assert_eq!(&arbiter.in_use.lock()[..], &[true, true]);
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let arbiter = Arc::new(strategy(2));
        let cancel = CancelSignal::new();
        assert!(arbiter.acquire(WorkerId(1), &cancel));

        let waiter = {
            let arbiter = Arc::clone(&arbiter);
            let cancel = cancel.clone();
            thread::spawn(move || arbiter.acquire(WorkerId(0), &cancel))
        };
        thread::sleep(Duration::from_millis(10));
        arbiter.release(WorkerId(1));

        assert!(waiter.join().unwrap());
    }
}
