//! Bounded FIFO of parked agent connections

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Bounded first-in first-out queue with non-blocking operations
///
/// Items move in and out by value: a rejected enqueue hands the item back
/// so the caller decides how to dispose of it.
#[derive(Debug)]
pub struct WaitingQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> WaitingQueue<T> {
    /// Create an empty queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append an item, or give it back if the queue is full
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        Ok(())
    }

    /// Remove the oldest item, if any
    pub fn try_dequeue(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Remove and return every queued item, oldest first
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // The deque is never left half-modified, so a poisoned lock is still usable
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
