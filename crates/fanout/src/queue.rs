//! Shared FIFO of pending work items.
//!
//! Filled once by the supervisor before workers start, drained concurrently
//! by workers. `try_pop` never blocks: an empty queue is the workers' signal
//! to finish.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe FIFO with exactly-once delivery.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
    consumed: AtomicUsize,
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            consumed: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, item: T) {
        self.lock().push_back(item);
    }

    /// Pop the oldest item, or `None` if the queue is momentarily empty.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().pop_front();
        if item.is_some() {
            self.consumed.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of items handed out by `try_pop` so far.
    pub fn consumed(&self) -> usize {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Discard everything still queued. Returns how many items were dropped.
    ///
    /// Discarded items are never executed.
    pub fn abandon(&self) -> usize {
        let mut items = self.lock();
        let discarded = items.len();
        items.clear();
        discarded
    }

    // No user code runs under the lock, so a poisoned deque is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for WorkQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: Mutex::new(iter.into_iter().collect()),
            consumed: AtomicUsize::new(0),
        }
    }
}
