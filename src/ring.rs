//! # Ring
//!
//! `N` workers sit around a ring of `N` shared resources. Worker `i` needs
//! resource `i` (its *left*) and resource `(i + 1) mod N` (its *right*) at the
//! same time before it can make progress.
//!
//! ```rust
//! use axiom_arbiter::{Ring, WorkerId, ResourceId};
//!
//! let ring = Ring::new(5).unwrap();
//! // The last worker wraps around to resource 0.
//! assert_eq!(ring.pair(WorkerId(4)), (ResourceId(4), ResourceId(0)));
//! // Ordered acquisition always takes the lower index first.
//! assert_eq!(ring.ordered_pair(WorkerId(4)), (ResourceId(0), ResourceId(4)));
//! ```

use std::fmt;

use crate::ArbiterError;

/// Position of a worker in the ring, in `[0, N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(pub usize);

/// Position of a shared resource in the ring, in `[0, N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub usize);

impl WorkerId {
    /// Index of this worker, usable for slot lookups.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl ResourceId {
    /// Index of this resource, usable for slot lookups.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-size ring of resources shared by the same number of workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ring {
    size: usize,
}

impl Ring {
    /// Creates a ring of `size` resources and `size` workers.
    ///
    /// Fails with [`ArbiterError::RingTooSmall`] when `size < 2`: a single
    /// worker would need the same resource twice.
    pub fn new(size: usize) -> Result<Self, ArbiterError> {
        if size < 2 {
            return Err(ArbiterError::RingTooSmall { workers: size });
        }
        Ok(Self { size })
    }

    /// Number of resources, which is also the number of workers.
    #[inline(always)]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// The `(left, right)` resources worker `worker` needs.
    #[inline]
    pub fn pair(&self, worker: WorkerId) -> (ResourceId, ResourceId) {
        debug_assert!(worker.0 < self.size, "worker {worker} outside ring of {}", self.size);
        (ResourceId(worker.0), ResourceId((worker.0 + 1) % self.size))
    }

    /// The worker's pair sorted into global acquisition order `(lower, higher)`.
    ///
    /// Every lock-based strategy must route its acquisition through this
    /// helper: ascending order is what rules out a circular wait.
    #[inline]
    pub fn ordered_pair(&self, worker: WorkerId) -> (ResourceId, ResourceId) {
        let (left, right) = self.pair(worker);
        (left.min(right), left.max(right))
    }

    /// All workers of the ring, in index order.
    pub fn workers(&self) -> impl Iterator<Item = WorkerId> {
        (0..self.size).map(WorkerId)
    }
}
