//! # BackOff
//!
//! Pacing for the two kinds of retry loop in this crate:
//!
//! - **spinning** on the coarse [`SpinLock`](crate::SpinLock) that guards the
//!   busy-wait flag table. Critical sections there are a handful of loads and
//!   stores, so the waiter spins with exponentially growing bursts of
//!   [`core::hint::spin_loop`] and starts yielding the thread once the bursts
//!   get long.
//! - **polling** for a free resource pair. The busy-wait strategy naps for a
//!   short, bounded interval between attempts; the nap wakes early if the run
//!   is cancelled.
//!
//! ```rust
//! use std::time::Duration;
//! use axiom_arbiter::{BackOff, CancelSignal};
//!
//! let backoff = BackOff::with_nap(Duration::from_millis(1));
//! backoff.spin();
//! assert!(backoff.current() > 1);
//!
//! let cancel = CancelSignal::new();
//! assert!(backoff.nap(&cancel));
//! cancel.cancel();
//! assert!(!backoff.nap(&cancel));
//! ```

use core::{cell::Cell, hint::spin_loop};
use std::time::Duration;

use crate::CancelSignal;

/// Upper bound on a single spin burst.
const MAX_SPIN: u32 = 1 << 12;

/// First spin burst.
const START_VALUE: u32 = 1 << 2;

/// Bursts longer than this also yield the thread.
const YIELD_THRESHOLD: u32 = 1 << 8;

/// Default polling nap, one time unit.
pub const DEFAULT_NAP: Duration = Duration::from_millis(1);

/// Per-call-site retry pacer.
///
/// A `BackOff` lives on the stack of a single retry loop and is not shared.
#[derive(Debug)]
pub struct BackOff {
    spin: Cell<u32>,
    nap: Duration,
}

impl BackOff {
    /// Creates a pacer with the default one-unit polling nap.
    #[inline(always)]
    pub const fn new() -> Self {
        Self::with_nap(DEFAULT_NAP)
    }

    /// Creates a pacer that naps for `nap` between polling attempts.
    #[inline(always)]
    pub const fn with_nap(nap: Duration) -> Self {
        Self {
            spin: Cell::new(START_VALUE),
            nap,
        }
    }

    /// Spins for the current burst length, then doubles it up to [`MAX_SPIN`].
    #[inline]
    pub fn spin(&self) {
        let burst = self.spin.get();

        for _ in 0..burst {
            spin_loop();
        }

        self.spin.set((burst << 1).min(MAX_SPIN));

        if burst > YIELD_THRESHOLD {
            std::thread::yield_now();
        }
    }

    /// Naps for the configured polling interval.
    ///
    /// Returns `false` if `cancel` is set before or during the nap.
    #[inline]
    pub fn nap(&self, cancel: &CancelSignal) -> bool {
        cancel.sleep(self.nap)
    }

    /// Current spin burst length.
    #[inline(always)]
    pub fn current(&self) -> u32 {
        self.spin.get()
    }
}

impl Default for BackOff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Spin bursts grow monotonically and saturate at MAX_SPIN.
    #[test]
    fn spin_grows_up_to_cap() {
        let b = BackOff::new();

        let mut prev = b.current();
        for _ in 0..16 {
            b.spin();
            let curr = b.current();
            assert!(curr >= prev, "spin burst shrank");
            prev = curr;
        }

        assert_eq!(b.current(), MAX_SPIN);
    }

    #[test]
    fn nap_waits_roughly_one_interval() {
        let nap = Duration::from_millis(5);
        let b = BackOff::with_nap(nap);
        let cancel = CancelSignal::new();

        let start = Instant::now();
        assert!(b.nap(&cancel));
        assert!(start.elapsed() >= nap);
    }

    #[test]
    fn nap_observes_cancellation() {
        let b = BackOff::with_nap(Duration::from_secs(10));
        let cancel = CancelSignal::new();
        cancel.cancel();

        let start = Instant::now();
        assert!(!b.nap(&cancel));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
