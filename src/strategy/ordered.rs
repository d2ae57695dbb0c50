//! Ordered locking: one blocking lock per resource, lower index first.
//!
//! Every worker takes its two locks in ascending resource order, so a chain
//! of workers each waiting on a lock held by the next can never close into a
//! cycle. This ordering rule is the only thing preventing deadlock here; all
//! acquisition goes through [`Ring::ordered_pair`].
//!
//! Cancellation is checked before the first lock and once more right after
//! it. Once the attempt on the second lock has started it is not
//! interruptible: the holder of that lock is guaranteed to release it, so the
//! wait is finite, and an acquisition that completes slightly after the
//! measurement window closed is filtered out by its timestamp.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::Arbiter;
use crate::{CancelSignal, ResourceId, Ring, WorkerId};

/// Blocking, non-reentrant lock over a single resource.
///
/// Unlike a `MutexGuard`, ownership is recorded as the holding worker, so the
/// lock can be taken in `acquire` and given back in a later `release` call.
#[derive(Debug, Default)]
struct ResourceLock {
    holder: Mutex<Option<WorkerId>>,
    freed: Condvar,
}

impl ResourceLock {
    /// Blocks until the resource is free, then records `worker` as holder.
    ///
    /// Returns `true` if the caller had to wait.
    fn lock(&self, worker: WorkerId) -> bool {
        let mut holder = self.holder.lock();
        let blocked = holder.is_some();
        while holder.is_some() {
            self.freed.wait(&mut holder);
        }
        *holder = Some(worker);
        blocked
    }

    fn unlock(&self, worker: WorkerId) {
        let mut holder = self.holder.lock();
        debug_assert_eq!(*holder, Some(worker), "resource released by a non-holder");
        *holder = None;
        drop(holder);
        self.freed.notify_one();
    }

    fn holder(&self) -> Option<WorkerId> {
        *self.holder.lock()
    }
}

/// Deadlock-free blocking strategy based on a global lock order.
pub struct OrderedLocking {
    ring: Ring,
    locks: Box<[ResourceLock]>,
    blocked: AtomicU64,
}

impl OrderedLocking {
    /// Record name of this strategy.
    pub const NAME: &'static str = "ordered-locking";

    /// Creates the strategy with every resource unlocked.
    pub fn new(ring: Ring) -> Self {
        Self {
            ring,
            locks: (0..ring.size()).map(|_| ResourceLock::default()).collect(),
            blocked: AtomicU64::new(0),
        }
    }

    fn lock(&self, resource: ResourceId, worker: WorkerId) {
        if self.locks[resource.index()].lock(worker) {
            self.blocked.fetch_add(1, Relaxed);
        }
    }

    fn unlock(&self, resource: ResourceId, worker: WorkerId) {
        self.locks[resource.index()].unlock(worker);
    }

    /// Current holder of `resource`, if any.
    pub fn holder(&self, resource: ResourceId) -> Option<WorkerId> {
        self.locks[resource.index()].holder()
    }
}

impl Arbiter for OrderedLocking {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn acquire(&self, worker: WorkerId, cancel: &CancelSignal) -> bool {
        let (first, second) = self.ring.ordered_pair(worker);

        if cancel.is_cancelled() {
            return false;
        }
        self.lock(first, worker);

        if cancel.is_cancelled() {
            self.unlock(first, worker);
            trace!(%worker, %first, "cancelled between locks");
            return false;
        }
        self.lock(second, worker);

        trace!(%worker, %first, %second, "locked pair");
        true
    }

    fn release(&self, worker: WorkerId) {
        let (first, second) = self.ring.ordered_pair(worker);
        self.unlock(second, worker);
        self.unlock(first, worker);
    }

    fn contention(&self) -> u64 {
        self.blocked.load(Relaxed)
    }
}
