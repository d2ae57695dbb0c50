//! # SpinLock
//!
//! The single coarse lock of the busy-wait strategy. It guards the whole
//! resource flag table, so "check both flags, set both flags" happens as one
//! indivisible step and no worker ever ends up holding exactly one resource.
//!
//! The critical section under this lock is a few loads and stores, which is
//! why it spins with [`BackOff`] instead of parking the thread.
//!
//! ```rust
//! use axiom_arbiter::SpinLock;
//!
//! let table = SpinLock::new(vec![false; 4]);
//! let claimed = table.with_lock(|flags| {
//!     if !flags[1] && !flags[2] {
//!         flags[1] = true;
//!         flags[2] = true;
//!         true
//!     } else {
//!         false
//!     }
//! });
//! assert!(claimed);
//! assert_eq!(*table.lock(), vec![false, true, true, false]);
//! ```

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{
    AtomicBool,
    Ordering::{Acquire, Relaxed, Release},
};

use crate::BackOff;

/// Test-and-test-and-set spin lock.
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

/// RAII access to the data behind a [`SpinLock`]; unlocks on drop.
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> SpinLock<T> {
    /// Wraps `data` in an unlocked spin lock.
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Spins until the lock is free and returns a guard.
    ///
    /// Waiters re-read the flag with plain loads between bursts and only
    /// retry the swap once it looks free, keeping the cache line shared.
    pub fn lock(&self) -> SpinGuard<'_, T> {
        if let Some(guard) = self.try_lock() {
            return guard;
        }

        let backoff = BackOff::new();
        loop {
            while self.locked.load(Relaxed) {
                backoff.spin();
            }
            if let Some(guard) = self.try_lock() {
                return guard;
            }
        }
    }

    /// Takes the lock if it is free right now.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        if self.locked.swap(true, Acquire) {
            None
        } else {
            Some(SpinGuard { lock: self })
        }
    }

    /// Runs `f` with exclusive access to the data.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// Whether some thread holds the lock at this instant.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Acquire)
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Release);
    }
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while `locked` is held by this thread.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` rules out a second live borrow.
        unsafe { &mut *self.lock.data.get() }
    }
}

// SAFETY: access to `data` is serialized by the `locked` flag.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn guard_releases_on_drop() {
        let lock = SpinLock::new([false; 3]);
        {
            let mut flags = lock.lock();
            flags[0] = true;
            assert!(lock.is_locked());
            assert!(lock.try_lock().is_none(), "lock is held by the guard");
        }
        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), [true, false, false]);
    }

    /// Updates made under the lock are never lost, even when hammered.
    #[test]
    fn pair_updates_are_not_lost() {
        let table = Arc::new(SpinLock::new(vec![0u32; 4]));
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    let (a, b) = (id, (id + 1) % 4);
                    for _ in 0..5_000 {
                        table.with_lock(|counts| {
                            counts[a] += 1;
                            counts[b] += 1;
                        });
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        // Every resource is the left of one worker and the right of another.
        assert_eq!(*table.lock(), vec![10_000; 4]);
    }
}
