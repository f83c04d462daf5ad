//! Bounded queue where producers wait for free space.
//!
//! Classic bounded buffer: one semaphore counts stored items, one counts free
//! slots, and a mutex guards the container.
//!
//! ```text
//! items + slots == capacity     (outside of push/pop)
//! len(storage) == items
//! ```
//!
//! # Example
//!
//! ```
//! use nexus_msgqueue::{BoundedBlockingQueue, Full};
//!
//! let queue = BoundedBlockingQueue::new(2);
//!
//! queue.push(1);
//! queue.push(2);
//! assert_eq!(queue.try_push(3), Err(Full(3)));
//!
//! assert_eq!(queue.pop(), 1);
//! queue.push(3);
//! assert_eq!(queue.pop(), 2);
//! assert_eq!(queue.pop(), 3);
//! ```

use core::fmt;
use std::collections::VecDeque;
use std::time::Duration;

use nexus_semaphore::{DEFAULT_SNOOZE_ITERS, Semaphore};
use parking_lot::Mutex;

use crate::{Full, clamp_capacity};

/// A bounded FIFO queue whose `push` blocks while the queue is full and whose
/// `pop` blocks while it is empty.
///
/// Never holds more than [`capacity`](BoundedBlockingQueue::capacity)
/// elements.
pub struct BoundedBlockingQueue<T> {
    storage: Mutex<VecDeque<T>>,
    /// Elements available to pop.
    items: Semaphore,
    /// Free slots available to fill.
    slots: Semaphore,
    capacity: usize,
}

impl<T> BoundedBlockingQueue<T> {
    /// Creates a queue holding at most `capacity` elements.
    ///
    /// A capacity of `0` is treated as `1`. Uses default backoff settings
    /// (8 snooze iterations before parking); see
    /// [`with_config`](BoundedBlockingQueue::with_config).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, DEFAULT_SNOOZE_ITERS)
    }

    /// Creates a queue with custom backoff configuration.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of buffered elements (`0` becomes `1`)
    /// * `snooze_iters` - Number of backoff iterations a blocked `push` or
    ///   `pop` spins before parking
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_msgqueue::BoundedBlockingQueue;
    ///
    /// // Park right away; suits queues that are usually idle
    /// let queue = BoundedBlockingQueue::<u64>::with_config(64, 0);
    /// assert_eq!(queue.capacity(), 64);
    /// ```
    #[must_use]
    pub fn with_config(capacity: usize, snooze_iters: usize) -> Self {
        let capacity = clamp_capacity(capacity);

        Self {
            storage: Mutex::new(VecDeque::with_capacity(capacity)),
            items: Semaphore::with_config(0, snooze_iters),
            slots: Semaphore::with_config(capacity, snooze_iters),
            capacity,
        }
    }

    /// Appends `item` to the tail, blocking while the queue is full.
    ///
    /// Returns once the item is stored. If no consumer ever pops, a push into
    /// a full queue blocks forever.
    pub fn push(&self, item: T) {
        self.slots.decrement();
        self.store(item);
    }

    /// Appends `item` if there is a free slot, without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), Full<T>> {
        if !self.slots.try_decrement() {
            return Err(Full(item));
        }
        self.store(item);
        Ok(())
    }

    /// Appends `item`, blocking for at most `timeout` while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(item))` if no slot freed up before the timeout.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), Full<T>> {
        if !self.slots.decrement_timeout(timeout) {
            return Err(Full(item));
        }
        self.store(item);
        Ok(())
    }

    /// Removes and returns the head element, blocking while the queue is
    /// empty.
    pub fn pop(&self) -> T {
        self.items.decrement();
        self.take()
    }

    /// Removes and returns the head element, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        self.items.try_decrement().then(|| self.take())
    }

    /// Removes and returns the head element, blocking for at most `timeout`
    /// while the queue is empty.
    ///
    /// Returns `None` if nothing arrived before the timeout.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        self.items.decrement_timeout(timeout).then(|| self.take())
    }

    /// Returns the maximum number of elements the queue holds.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of stored elements.
    ///
    /// This is a snapshot; concurrent pushes and pops may change it
    /// immediately.
    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    /// Returns `true` if no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the queue holds `capacity` elements.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Second half of a push, once a slot has been claimed.
    fn store(&self, item: T) {
        self.storage.lock().push_back(item);
        self.items.increment();
    }

    /// Second half of a pop, once an item has been claimed.
    fn take(&self) -> T {
        let item = self
            .storage
            .lock()
            .pop_front()
            .expect("item permit without stored item");
        self.slots.increment();
        item
    }
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBlockingQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
