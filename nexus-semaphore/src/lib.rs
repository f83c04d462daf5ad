//! # nexus-semaphore
//!
//! A counting semaphore for blocking producer/consumer handoff.
//!
//! The count is a single atomic, so acquiring an available unit is a CAS and
//! releasing one is a `fetch_add`. Waiting follows the same three phases as
//! `nexus-channel`:
//!
//! ```text
//! Phase 1: Fast path
//! ├── CAS the count down if it is non-zero
//! └── Succeeds when a unit is already available
//!
//! Phase 2: Backoff (spin + yield)
//! ├── crossbeam's Backoff::snooze()
//! ├── Configurable iterations (default: 8)
//! └── Catches units released "soon"
//!
//! Phase 3: Park
//! ├── Register as a waiter, re-check, sleep on a condvar
//! └── Only when no unit is coming
//! ```
//!
//! `increment` only touches the condvar when a waiter is registered, so an
//! uncontended release is one atomic add and one load.
//!
//! # Example
//!
//! ```
//! use nexus_semaphore::Semaphore;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let sem = Arc::new(Semaphore::new(0));
//!
//! let waiter = {
//!     let sem = Arc::clone(&sem);
//!     thread::spawn(move || sem.decrement())
//! };
//!
//! sem.increment();
//! waiter.join().unwrap();
//! assert_eq!(sem.available(), 0);
//! ```
//!
//! # Scoped Acquisition
//!
//! A semaphore with one unit works as a lock. [`Semaphore::acquire`] returns a
//! guard that gives the unit back when dropped, including during unwinding:
//!
//! ```
//! use nexus_semaphore::Semaphore;
//!
//! let lock = Semaphore::new(1);
//!
//! {
//!     let _guard = lock.acquire();
//!     assert!(lock.try_acquire().is_none());
//! }
//!
//! assert_eq!(lock.available(), 1);
//! ```
//!
//! # Wake-up Ordering
//!
//! ```text
//! Waiter:                           Incrementer:
//! ─────────────────────             ─────────────────────
//! lock(park_lock)
//! waiters += 1
//! [SeqCst barrier]                  permits += 1
//! try CAS permits -> 0              [SeqCst barrier]
//! condvar.wait()                    load(waiters) -> 1
//!                                   lock(park_lock); notify_one()
//! ```
//!
//! Both sides write then read with `SeqCst`, so at least one of them observes
//! the other: either the waiter sees the new unit, or the incrementer sees the
//! waiter and notifies it. The waiter holds `park_lock` from registration until
//! it is inside `wait`, so the notification cannot slip in between.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use core::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::{Backoff, CachePadded};
use log::trace;
use parking_lot::{Condvar, Mutex};

/// Default number of backoff snooze iterations before parking.
pub const DEFAULT_SNOOZE_ITERS: usize = 8;

/// A counting semaphore.
///
/// Holds a non-negative count of units. [`increment`](Semaphore::increment)
/// adds a unit and wakes one parked waiter; [`decrement`](Semaphore::decrement)
/// takes a unit, blocking while the count is zero.
///
/// Which waiter gets a released unit is unspecified. A spinning thread can
/// take a unit ahead of a parked one.
pub struct Semaphore {
    permits: CachePadded<AtomicUsize>,
    waiters: CachePadded<AtomicUsize>,
    park_lock: Mutex<()>,
    cvar: Condvar,
    snooze_iters: usize,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` units.
    ///
    /// Uses default backoff settings (8 snooze iterations before parking).
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self::with_config(permits, DEFAULT_SNOOZE_ITERS)
    }

    /// Creates a semaphore with custom backoff configuration.
    ///
    /// # Arguments
    ///
    /// * `permits` - Initial number of units
    /// * `snooze_iters` - Number of backoff iterations before parking. Higher
    ///   values burn more CPU but catch units released shortly after the wait
    ///   started. `0` parks immediately after the fast path fails.
    #[must_use]
    pub fn with_config(permits: usize, snooze_iters: usize) -> Self {
        Self {
            permits: CachePadded::new(AtomicUsize::new(permits)),
            waiters: CachePadded::new(AtomicUsize::new(0)),
            park_lock: Mutex::new(()),
            cvar: Condvar::new(),
            snooze_iters,
        }
    }

    /// Releases one unit, waking a parked waiter if there is one.
    ///
    /// Never waits on the count.
    pub fn increment(&self) {
        self.permits.fetch_add(1, Ordering::SeqCst);

        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _park = self.park_lock.lock();
            self.cvar.notify_one();
        }
    }

    /// Takes one unit, blocking while the count is zero.
    ///
    /// There is no timeout: if no unit is ever released, the calling thread
    /// stays blocked. Use [`decrement_timeout`](Semaphore::decrement_timeout)
    /// for a bounded wait.
    pub fn decrement(&self) {
        if self.spin_decrement(None) {
            return;
        }

        let mut park = self.park_lock.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);

        while !self.try_decrement() {
            trace!("parking until a unit is released");
            self.cvar.wait(&mut park);
        }

        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    /// Takes one unit if one is available, without blocking.
    ///
    /// Returns `true` if a unit was taken.
    pub fn try_decrement(&self) -> bool {
        let mut current = self.permits.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                return false;
            }

            match self.permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Takes one unit, blocking for at most `timeout`.
    ///
    /// Returns `true` if a unit was taken, `false` if the timeout elapsed
    /// first. A timeout too large to represent as a deadline waits without
    /// bound.
    pub fn decrement_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.decrement();
            return true;
        };

        if self.spin_decrement(Some(deadline)) {
            return true;
        }

        let mut park = self.park_lock.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);

        let acquired = loop {
            if self.try_decrement() {
                break true;
            }

            trace!("parking until a unit is released or {timeout:?} elapses");
            if self.cvar.wait_until(&mut park, deadline).timed_out() {
                // A notification racing the deadline still gets its attempt.
                break self.try_decrement();
            }
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);

        if !acquired {
            trace!("timed out after {timeout:?} waiting for a unit");
        }
        acquired
    }

    /// Acquires one unit and returns a guard that releases it on drop.
    ///
    /// Blocks like [`decrement`](Semaphore::decrement).
    pub fn acquire(&self) -> SemaphoreGuard<'_> {
        self.decrement();
        SemaphoreGuard { semaphore: self }
    }

    /// Acquires one unit without blocking.
    ///
    /// Returns `None` if no unit is available.
    pub fn try_acquire(&self) -> Option<SemaphoreGuard<'_>> {
        self.try_decrement()
            .then(|| SemaphoreGuard { semaphore: self })
    }

    /// Returns the number of units currently available.
    ///
    /// This is a snapshot; it may be stale by the time it is read.
    #[inline]
    pub fn available(&self) -> usize {
        self.permits.load(Ordering::SeqCst)
    }

    /// Fast path and backoff phase. Returns `true` if a unit was taken.
    fn spin_decrement(&self, deadline: Option<Instant>) -> bool {
        if self.try_decrement() {
            return true;
        }

        let backoff = Backoff::new();
        for _ in 0..self.snooze_iters {
            backoff.snooze();

            if self.try_decrement() {
                return true;
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
        }

        false
    }
}

impl Default for Semaphore {
    /// A semaphore with no units.
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("available", &self.available())
            .field("waiters", &self.waiters.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Scoped hold on one semaphore unit.
///
/// Created by [`Semaphore::acquire`] and [`Semaphore::try_acquire`]. The unit
/// is released when the guard is dropped.
#[must_use = "the unit is released as soon as the guard is dropped"]
pub struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphoreGuard<'_> {
    /// Returns the semaphore this guard holds a unit of.
    #[inline]
    pub fn semaphore(&self) -> &Semaphore {
        self.semaphore
    }
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.increment();
    }
}

impl fmt::Debug for SemaphoreGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphoreGuard").finish_non_exhaustive()
    }
}
