//! Runtime auditing of the mutual-exclusion and release-symmetry invariants.

use std::sync::atomic::{
    AtomicBool, AtomicU64, AtomicUsize,
    Ordering::{AcqRel, Acquire, Relaxed, Release},
};

use tracing::error;

use super::Arbiter;
use crate::{CancelSignal, ResourceId, Ring, WorkerId};

const FREE: usize = usize::MAX;

/// Wraps an [`Arbiter`] and checks every acquire and release it performs.
///
/// Each resource carries the id of the worker the inner strategy last handed
/// it to. A successful acquire that finds one of its resources still marked
/// for another worker, a release by a worker that holds nothing, or a second
/// acquire without an intervening release is counted as a violation and
/// logged. The inner strategy's behaviour is left untouched.
pub struct Audited<A> {
    inner: A,
    ring: Ring,
    holders: Box<[AtomicUsize]>,
    holding: Box<[AtomicBool]>,
    violations: AtomicU64,
    acquisitions: AtomicU64,
}

impl<A: Arbiter> Audited<A> {
    /// Audits `inner`, which arbitrates over `ring`.
    pub fn new(inner: A, ring: Ring) -> Self {
        Self {
            inner,
            ring,
            holders: (0..ring.size()).map(|_| AtomicUsize::new(FREE)).collect(),
            holding: (0..ring.size()).map(|_| AtomicBool::new(false)).collect(),
            violations: AtomicU64::new(0),
            acquisitions: AtomicU64::new(0),
        }
    }

    /// Invariant violations observed so far.
    pub fn violations(&self) -> u64 {
        self.violations.load(Acquire)
    }

    /// Successful acquisitions observed so far.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Relaxed)
    }

    fn violation(&self, worker: WorkerId, what: &str) {
        self.violations.fetch_add(1, AcqRel);
        error!(%worker, strategy = self.inner.name(), "{what}");
    }

    fn claim(&self, resource: ResourceId, worker: WorkerId) {
        let slot = &self.holders[resource.index()];
        if let Err(other) = slot.compare_exchange(FREE, worker.index(), AcqRel, Acquire) {
            self.violation(
                worker,
                &format!("resource {resource} handed out while worker {other} holds it"),
            );
        }
    }

    fn unclaim(&self, resource: ResourceId, worker: WorkerId) {
        let slot = &self.holders[resource.index()];
        if slot
            .compare_exchange(worker.index(), FREE, AcqRel, Acquire)
            .is_err()
        {
            self.violation(
                worker,
                &format!("resource {resource} released by a worker not holding it"),
            );
        }
    }
}

impl<A: Arbiter> Arbiter for Audited<A> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn acquire(&self, worker: WorkerId, cancel: &CancelSignal) -> bool {
        if self.holding[worker.index()].load(Acquire) {
            self.violation(worker, "acquire while already holding its pair");
        }
        if !self.inner.acquire(worker, cancel) {
            return false;
        }

        let (left, right) = self.ring.pair(worker);
        self.claim(left, worker);
        self.claim(right, worker);
        self.holding[worker.index()].store(true, Release);
        self.acquisitions.fetch_add(1, Relaxed);
        true
    }

    fn release(&self, worker: WorkerId) {
        if !self.holding[worker.index()].swap(false, AcqRel) {
            self.violation(worker, "release without a matching acquire");
            return;
        }
        // Marks are cleared before the inner release so the next holder finds them free.
        let (left, right) = self.ring.pair(worker);
        self.unclaim(left, worker);
        self.unclaim(right, worker);
        self.inner.release(worker);
    }

    fn contention(&self) -> u64 {
        self.inner.contention()
    }
}
