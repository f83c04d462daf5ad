//! Bounded queue where producers never wait.
//!
//! When the queue is full, `push` evicts the oldest element and appends the
//! new one in the same critical section. Only the freshest `capacity`
//! elements are kept.
//!
//! # Use Cases
//!
//! - Sensor feeds where the producer must never stall
//! - Status updates where only recent values matter
//! - Diagnostics buffers where dropping old entries is acceptable
//!
//! # Example
//!
//! ```
//! use nexus_msgqueue::BoundedReplacingQueue;
//!
//! let queue = BoundedReplacingQueue::new(3);
//!
//! for reading in 1..=5 {
//!     queue.push(reading);
//! }
//!
//! // 1 and 2 were evicted
//! assert_eq!(queue.pop(), 3);
//! assert_eq!(queue.pop(), 4);
//! assert_eq!(queue.pop(), 5);
//! assert_eq!(queue.evicted(), 2);
//! ```

use core::fmt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::trace;
use nexus_semaphore::{DEFAULT_SNOOZE_ITERS, Semaphore};
use parking_lot::Mutex;

use crate::clamp_capacity;

/// A bounded FIFO queue whose `push` never blocks: when full, the oldest
/// element is evicted to make room. `pop` blocks while the queue is empty.
pub struct BoundedReplacingQueue<T> {
    storage: Mutex<VecDeque<T>>,
    /// Elements available to pop. Only grows when storage grows; an
    /// eviction followed by an append leaves it unchanged.
    items: Semaphore,
    evicted: AtomicU64,
    capacity: usize,
}

impl<T> BoundedReplacingQueue<T> {
    /// Creates a queue holding at most `capacity` elements.
    ///
    /// A capacity of `0` is treated as `1`. Uses default backoff settings
    /// (8 snooze iterations before parking).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, DEFAULT_SNOOZE_ITERS)
    }

    /// Creates a queue with custom backoff configuration.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of buffered elements (`0` becomes `1`)
    /// * `snooze_iters` - Number of backoff iterations a blocked `pop` spins
    ///   before parking
    #[must_use]
    pub fn with_config(capacity: usize, snooze_iters: usize) -> Self {
        let capacity = clamp_capacity(capacity);

        Self {
            storage: Mutex::new(VecDeque::with_capacity(capacity)),
            items: Semaphore::with_config(0, snooze_iters),
            evicted: AtomicU64::new(0),
            capacity,
        }
    }

    /// Appends `item` to the tail. Never blocks.
    ///
    /// Returns `None` if there was room, or `Some(oldest)` if the queue was
    /// full and its head had to be evicted. The return value can be ignored;
    /// an evicted element is simply gone and no consumer will see it.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_msgqueue::BoundedReplacingQueue;
    ///
    /// let queue = BoundedReplacingQueue::new(1);
    ///
    /// assert_eq!(queue.push("old"), None);
    /// assert_eq!(queue.push("new"), Some("old"));
    /// assert_eq!(queue.pop(), "new");
    /// ```
    pub fn push(&self, item: T) -> Option<T> {
        let mut storage = self.storage.lock();

        if storage.len() >= self.capacity {
            let oldest = storage.pop_front();
            storage.push_back(item);

            let evicted = self.evicted.fetch_add(1, Ordering::Relaxed) + 1;
            trace!("queue full at {}, evicted oldest ({evicted} total)", self.capacity);
            oldest
        } else {
            storage.push_back(item);
            self.items.increment();
            None
        }
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

    /// Returns `true` if the next `push` would evict.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Returns how many elements have been evicted since construction.
    #[inline]
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Second half of a pop, once an item has been claimed.
    fn take(&self) -> T {
        self.storage
            .lock()
            .pop_front()
            .expect("item permit without stored item")
    }
}

impl<T> fmt::Debug for BoundedReplacingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedReplacingQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("evicted", &self.evicted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    // ============================================================================
    // Basic Operations
    // ============================================================================

    #[test]
    fn push_pop_single() {
        let queue = BoundedReplacingQueue::new(4);

        assert_eq!(queue.push(42u64), None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), 42);
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_clamped_to_one() {
        let queue = BoundedReplacingQueue::new(0);
        assert_eq!(queue.capacity(), 1);

        queue.push(1u8);
        queue.push(2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), 2);
    }

    #[test]
    fn try_pop_empty() {
        let queue = BoundedReplacingQueue::<u64>::new(2);
        assert_eq!(queue.try_pop(), None);

        queue.push(7);
        assert_eq!(queue.try_pop(), Some(7));
        assert_eq!(queue.try_pop(), None);
    }

    // ============================================================================
    // Eviction
    // ============================================================================

    #[test]
    fn push_returns_evicted_oldest() {
        let queue = BoundedReplacingQueue::new(2);

        assert_eq!(queue.push('a'), None);
        assert_eq!(queue.push('b'), None);
        assert_eq!(queue.push('c'), Some('a'));
        assert_eq!(queue.push('d'), Some('b'));

        assert_eq!(queue.pop(), 'c');
        assert_eq!(queue.pop(), 'd');
    }

    #[test]
    fn keeps_last_capacity_elements() {
        let queue = BoundedReplacingQueue::new(4);

        for i in 0..100u64 {
            queue.push(i);
        }

        assert_eq!(queue.len(), 4);
        assert_eq!(queue.evicted(), 96);
        for i in 96..100 {
            assert_eq!(queue.pop(), i);
        }
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn eviction_does_not_signal_items() {
        let queue = BoundedReplacingQueue::new(2);

        for i in 0..10 {
            queue.push(i);
        }

        assert_eq!(queue.items.available(), 2);
        assert_eq!(queue.items.available(), queue.len());
    }

    #[test]
    fn interleaved_push_pop_with_eviction() {
        let queue = BoundedReplacingQueue::new(2);

        queue.push(1);
        queue.push(2);
        queue.push(3); // evicts 1
        assert_eq!(queue.pop(), 2);

        queue.push(4);
        queue.push(5); // evicts 3
        assert_eq!(queue.pop(), 4);
        assert_eq!(queue.pop(), 5);
        assert_eq!(queue.try_pop(), None);
        assert_eq!(queue.evicted(), 2);
    }

    // ============================================================================
    // Blocking Behavior
    // ============================================================================

    #[test]
    fn pop_blocks_until_push() {
        let queue = Arc::new(BoundedReplacingQueue::new(4));
        let start = Instant::now();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(50));
        queue.push(42u64);

        assert_eq!(consumer.join().unwrap(), 42);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn push_never_blocks_when_full() {
        let queue = BoundedReplacingQueue::new(1);
        let start = Instant::now();

        for i in 0..10_000u64 {
            queue.push(i);
        }

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(queue.pop(), 9_999);
    }

    #[test]
    fn pop_timeout_expires_on_empty() {
        let queue = BoundedReplacingQueue::<u64>::new(2);
        let start = Instant::now();

        assert_eq!(queue.pop_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn pop_timeout_wakes_on_push() {
        let queue = Arc::new(BoundedReplacingQueue::new(2));

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_timeout(Duration::from_secs(10)))
        };

        thread::sleep(Duration::from_millis(20));
        queue.push(5u64);

        assert_eq!(consumer.join().unwrap(), Some(5));
    }

    // ============================================================================
    // Cross-Thread
    // ============================================================================

    #[test]
    fn delivered_values_stay_in_order() {
        let queue = Arc::new(BoundedReplacingQueue::new(8));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..50_000u64 {
                    queue.push(i);
                }
                queue.push(u64::MAX);
            })
        };

        let mut last = None;
        loop {
            let value = queue.pop();
            if value == u64::MAX {
                break;
            }
            if let Some(prev) = last {
                assert!(value > prev, "FIFO order violated: {value} after {prev}");
            }
            last = Some(value);
        }

        producer.join().unwrap();
    }

    // ============================================================================
    // Drop Behavior
    // ============================================================================

    #[test]
    fn evicted_and_remaining_values_dropped() {
        use std::sync::atomic::AtomicUsize;

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropCounter;

        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);

        {
            let queue = BoundedReplacingQueue::new(2);
            queue.push(DropCounter);
            queue.push(DropCounter);
            queue.push(DropCounter);
            assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);
        }

        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn debug_shows_evicted() {
        let queue = BoundedReplacingQueue::new(1);
        queue.push(1u8);
        queue.push(2);

        let debug = format!("{queue:?}");
        assert!(debug.contains("evicted: 1"));
    }
}
