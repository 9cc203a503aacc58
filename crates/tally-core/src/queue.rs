//! Fixed-capacity buffering for modules that defer work to a later event.
//!
//! A module that needs to look back over a window (say, damage dealt while
//! a cooldown was up) pushes items as they arrive and flushes them at a
//! boundary event. Overflow is an error rather than unbounded growth, so a
//! runaway buffer degrades the module instead of the process.

use std::collections::VecDeque;

use crate::error::HandlerError;

/// A FIFO queue that refuses items beyond its capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// An empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
        }
    }

    /// Append an item.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::QueueOverflow`] if the queue is full. The
    /// item is dropped.
    pub fn push(&mut self, item: T) -> Result<(), HandlerError> {
        if self.items.len() >= self.capacity {
            return Err(HandlerError::QueueOverflow {
                capacity: self.capacity,
            });
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Drain every item in arrival order through `f`, folding into `init`.
    pub fn flush<A>(&mut self, init: A, mut f: impl FnMut(A, T) -> A) -> A {
        let mut acc = init;
        while let Some(item) = self.items.pop_front() {
            acc = f(acc, item);
        }
        acc
    }

    /// Drop every buffered item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items currently buffered.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
