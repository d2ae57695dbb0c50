//! # Arbitration strategies
//!
//! An [`Arbiter`] hands out a worker's resource pair as a unit. Two
//! interchangeable implementations are provided:
//!
//! - [`BusyWaitBoth`]: one coarse lock over a flag table; a worker claims both
//!   flags or neither and polls until it succeeds.
//! - [`OrderedLocking`]: one blocking lock per resource, always taken lower
//!   index first, so no circular wait can form.
//!
//! [`Audited`] wraps either of them and checks mutual exclusion and
//! acquire/release symmetry at runtime.

mod audited;
mod busy_wait;
mod ordered;

use std::fmt;
use std::sync::Arc;

pub use audited::Audited;
pub use busy_wait::BusyWaitBoth;
pub use ordered::OrderedLocking;

use crate::{CancelSignal, Config, Ring, WorkerId};

/// Exclusive, all-or-nothing access to a worker's resource pair.
///
/// A successful [`acquire`](Arbiter::acquire) for worker `i` guarantees that
/// `i` alone holds resources `i` and `(i + 1) mod N` until the matching
/// [`release`](Arbiter::release). Every successful acquire must be matched by
/// exactly one release before the same worker acquires again.
pub trait Arbiter: Send + Sync {
    /// Name used in result records.
    fn name(&self) -> &'static str;

    /// Blocks or polls until `worker` holds its whole pair.
    ///
    /// Returns `false` if `cancel` was observed before success, in which case
    /// the worker holds nothing.
    fn acquire(&self, worker: WorkerId, cancel: &CancelSignal) -> bool;

    /// Frees both resources of `worker`'s pair.
    fn release(&self, worker: WorkerId);

    /// How often workers found their resources busy so far.
    ///
    /// For polling strategies this counts failed attempts, for blocking ones
    /// it counts lock acquisitions that had to wait.
    fn contention(&self) -> u64 {
        0
    }
}

impl<A: Arbiter + ?Sized> Arbiter for Arc<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn acquire(&self, worker: WorkerId, cancel: &CancelSignal) -> bool {
        (**self).acquire(worker, cancel)
    }

    fn release(&self, worker: WorkerId) {
        (**self).release(worker)
    }

    fn contention(&self) -> u64 {
        (**self).contention()
    }
}

/// Selects one of the built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// [`BusyWaitBoth`].
    BusyWait,
    /// [`OrderedLocking`].
    Ordered,
}

impl StrategyKind {
    /// Every built-in strategy, in benchmark order.
    pub const ALL: [StrategyKind; 2] = [StrategyKind::BusyWait, StrategyKind::Ordered];

    /// Record name of the strategy.
    pub const fn name(self) -> &'static str {
        match self {
            StrategyKind::BusyWait => BusyWaitBoth::NAME,
            StrategyKind::Ordered => OrderedLocking::NAME,
        }
    }

    /// Builds a fresh strategy instance for `ring`.
    pub fn build(self, ring: Ring, config: &Config) -> Arc<dyn Arbiter> {
        match self {
            StrategyKind::BusyWait => Arc::new(BusyWaitBoth::new(ring, config.poll_interval)),
            StrategyKind::Ordered => Arc::new(OrderedLocking::new(ring)),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_strategies_carry_their_names() {
        let ring = Ring::new(4).unwrap();
        let config = Config::default();
        for kind in StrategyKind::ALL {
            let arbiter = kind.build(ring, &config);
            assert_eq!(arbiter.name(), kind.name());
            assert_eq!(arbiter.contention(), 0);
        }
        assert_eq!(StrategyKind::BusyWait.to_string(), "busy-wait-both");
        assert_eq!(StrategyKind::Ordered.to_string(), "ordered-locking");
    }

    /// Every strategy hands out disjoint pairs to non-neighbours at once.
    #[test]
    fn non_adjacent_workers_hold_pairs_together() {
        let ring = Ring::new(4).unwrap();
        let config = Config::default();
        let cancel = CancelSignal::new();
        for kind in StrategyKind::ALL {
            let arbiter = kind.build(ring, &config);
            assert!(arbiter.acquire(WorkerId(0), &cancel));
            assert!(arbiter.acquire(WorkerId(2), &cancel));
            arbiter.release(WorkerId(0));
            arbiter.release(WorkerId(2));
            assert!(arbiter.acquire(WorkerId(1), &cancel));
            arbiter.release(WorkerId(1));
        }
    }
}
