//! # CancelSignal
//!
//! A shared, set-once cancellation flag broadcast to every worker of a run.
//!
//! Polling code calls [`CancelSignal::is_cancelled`] at its checkpoints.
//! Sleeping code uses [`CancelSignal::sleep`] or [`CancelSignal::wait_until`],
//! which wake immediately when the signal fires instead of finishing the nap.
//!
//! Sleepers do not all park on one lock: every clone is assigned one of
//! [`WAKE_SHARDS`] lock/condvar pairs round-robin, so workers napping on
//! their own clones rarely touch the same mutex. Cancelling wakes every shard.

use std::sync::atomic::{
    AtomicBool, AtomicUsize,
    Ordering::{AcqRel, Acquire, Relaxed},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Number of independent wake queues behind one signal.
pub const WAKE_SHARDS: usize = 16;

#[derive(Debug, Default)]
struct Shard {
    lock: Mutex<()>,
    wake: Condvar,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    shards: Box<[Shard]>,
    next_shard: AtomicUsize,
}

/// Cloneable handle to a monotonic cancellation flag.
///
/// Once [`cancel`](CancelSignal::cancel) has been called the signal stays set
/// for the lifetime of every clone.
#[derive(Debug)]
pub struct CancelSignal {
    inner: Arc<Inner>,
    shard: usize,
}

impl CancelSignal {
    /// Creates an unset signal.
    pub fn new() -> Self {
        let inner = Inner {
            cancelled: AtomicBool::new(false),
            shards: (0..WAKE_SHARDS).map(|_| Shard::default()).collect(),
            next_shard: AtomicUsize::new(1),
        };
        Self {
            inner: Arc::new(inner),
            shard: 0,
        }
    }

    /// Sets the signal and wakes every sleeper.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, AcqRel);
        if first {
            for shard in self.inner.shards.iter() {
                // Taking the lock orders this notify after any sleeper's flag check.
                let _guard = shard.lock.lock();
                shard.wake.notify_all();
            }
        }
        first
    }

    /// Whether the signal has been set.
    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Acquire)
    }

    /// Blocks until `deadline` or until the signal fires.
    ///
    /// Returns `true` if the signal is set on return.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let shard = &self.inner.shards[self.shard];
        let mut guard = shard.lock.lock();
        while !self.is_cancelled() {
            if shard.wake.wait_until(&mut guard, deadline).timed_out() {
                return self.is_cancelled();
            }
        }
        true
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the sleep
    /// was cut short (or never started) because the signal is set.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        !self.wait_until(Instant::now() + duration)
    }
}

impl Clone for CancelSignal {
    /// Shares the flag and moves the clone onto the next wake shard.
    fn clone(&self) -> Self {
        let shard = self.inner.next_shard.fetch_add(1, Relaxed) % WAKE_SHARDS;
        Self {
            inner: Arc::clone(&self.inner),
            shard,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn cancel_is_set_once() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());

        assert!(signal.cancel(), "first cancel flips the flag");
        assert!(!signal.cancel(), "second cancel is a no-op");
        assert!(signal.is_cancelled());
        assert!(signal.clone().is_cancelled(), "clones share the flag");
    }

    #[test]
    fn sleep_runs_to_completion_when_not_cancelled() {
        let signal = CancelSignal::new();
        let start = Instant::now();
        assert!(signal.sleep(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sleep_after_cancel_returns_immediately() {
        let signal = CancelSignal::new();
        signal.cancel();
        let start = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancel_wakes_sleepers() {
        let signal = CancelSignal::new();
        let sleepers: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.sleep(Duration::from_secs(30)))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        signal.cancel();

        for sleeper in sleepers {
            assert!(!sleeper.join().unwrap(), "sleep should report interruption");
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn clones_spread_over_wake_shards() {
        let signal = CancelSignal::new();
        let shards: Vec<usize> = (0..WAKE_SHARDS).map(|_| signal.clone().shard).collect();

        assert_eq!(signal.shard, 0);
        assert_eq!(shards[0], 1);
        assert_eq!(shards[WAKE_SHARDS - 1], 0, "assignment wraps around");
        let mut distinct = shards.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), WAKE_SHARDS);
    }

    /// Sleepers on more clones than there are shards are all woken.
    #[test]
    fn cancel_wakes_every_shard() {
        let signal = CancelSignal::new();
        let sleepers: Vec<_> = (0..WAKE_SHARDS + 3)
            .map(|_| {
                let signal = signal.clone();
                thread::spawn(move || signal.sleep(Duration::from_secs(30)))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        signal.cancel();

        for sleeper in sleepers {
            assert!(!sleeper.join().unwrap());
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
