//! # nexus-msgqueue
//!
//! Bounded, thread-safe message queues for handing values between producer
//! and consumer threads.
//!
//! Two variants with different backpressure policies:
//!
//! | Queue | `push` when full | `pop` when empty |
//! |-------|------------------|------------------|
//! | [`BoundedBlockingQueue`] | blocks until a `pop` frees a slot | blocks |
//! | [`BoundedReplacingQueue`] | evicts the oldest element, never blocks | blocks |
//!
//! Any number of producers and consumers may share one queue through `&self`
//! (wrap it in an `Arc`, or borrow it from scoped threads).
//!
//! # Design
//!
//! Both queues are a `VecDeque` behind a mutex plus counting semaphores from
//! [`nexus_semaphore`]:
//!
//! ```text
//! BoundedBlockingQueue:
//! ┌──────────────────────────────────────────────────────────┐
//! │ push: slots.decrement -> lock { push_back } -> items.inc │
//! │ pop:  items.decrement -> lock { pop_front } -> slots.inc │
//! └──────────────────────────────────────────────────────────┘
//!
//! BoundedReplacingQueue:
//! ┌──────────────────────────────────────────────────────────┐
//! │ push: lock { full ? evict oldest + push_back             │
//! │            : push_back + items.inc }                     │
//! │ pop:  items.decrement -> lock { pop_front }              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The mutex is only taken after a semaphore wait has succeeded and is never
//! held while waiting on a semaphore, so there is no lock-ordering cycle and
//! the critical section is a single container operation.
//!
//! Ordering is strict FIFO among elements that are actually delivered. With
//! several producers, the order between their pushes is whatever order they
//! reach the mutex.
//!
//! # Example
//!
//! ```
//! use nexus_msgqueue::BoundedBlockingQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(BoundedBlockingQueue::new(2));
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for i in 0..10 {
//!             // Blocks while two values are waiting
//!             queue.push(i);
//!         }
//!     })
//! };
//!
//! for i in 0..10 {
//!     assert_eq!(queue.pop(), i);
//! }
//! producer.join().unwrap();
//! ```
//!
//! # Replacing Oldest
//!
//! ```
//! use nexus_msgqueue::BoundedReplacingQueue;
//!
//! let queue = BoundedReplacingQueue::new(2);
//!
//! queue.push('a');
//! queue.push('b');
//! queue.push('c'); // evicts 'a'
//!
//! assert_eq!(queue.pop(), 'b');
//! assert_eq!(queue.pop(), 'c');
//! assert_eq!(queue.evicted(), 1);
//! ```
//!
//! # Capacity
//!
//! Capacity is fixed at construction. A capacity of `0` is clamped to `1`;
//! there is no rounding to a power of two.
//!
//! # Timeouts
//!
//! `push` and `pop` block without bound, which is the contract the queues are
//! built around. `try_*` and `*_timeout` variants exist for callers that need
//! to give up.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use core::fmt;

pub mod blocking;
pub mod replacing;

pub use blocking::BoundedBlockingQueue;
pub use nexus_semaphore::DEFAULT_SNOOZE_ITERS;
pub use replacing::BoundedReplacingQueue;

/// Error returned when a value cannot be pushed because the queue is full.
///
/// Contains the value that could not be pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue is full")
    }
}

impl<T: fmt::Debug> std::error::Error for Full<T> {}

/// Clamps a requested capacity to the smallest usable one.
fn clamp_capacity(requested: usize) -> usize {
    if requested == 0 {
        log::debug!("requested queue capacity 0, using 1");
        1
    } else {
        requested
    }
}
