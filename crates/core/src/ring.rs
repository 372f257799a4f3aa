// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-capacity overwrite-oldest ring buffer.
//!
//! Single writer, many readers. Writes are O(1); readers copy a
//! consistent snapshot under the same short-lived lock the writer takes.
//! `total_written` counts lifetime entries so `dropped` can be derived
//! without tracking evictions separately.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Counters reported by [`RingBuffer::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingStats {
    pub total_written: u64,
    pub available: usize,
    pub dropped: u64,
}

#[derive(Debug)]
struct Inner<T> {
    entries: VecDeque<T>,
    total_written: u64,
}

/// Bounded append-only buffer that evicts the oldest entry when full.
#[derive(Debug)]
pub struct RingBuffer<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                total_written: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest when at capacity.
    pub fn push(&self, entry: T) {
        let mut inner = self.inner.lock();
        if inner.entries.len() == self.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
        inner.total_written += 1;
    }

    /// Copy the current contents in chronological order.
    pub fn snapshot(&self) -> Vec<T> {
        let inner = self.inner.lock();
        inner.entries.iter().cloned().collect()
    }

    /// Copy entries starting at lifetime offset `from` (oldest retained
    /// entry when `from` has already been evicted). Returns the copied
    /// entries and the lifetime offset of the next unread entry.
    pub fn snapshot_from(&self, from: u64) -> (Vec<T>, u64) {
        let inner = self.inner.lock();
        let oldest = inner.total_written - inner.entries.len() as u64;
        let skip = from.saturating_sub(oldest) as usize;
        let copied: Vec<T> = inner.entries.iter().skip(skip).cloned().collect();
        (copied, inner.total_written)
    }

    pub fn stats(&self) -> RingStats {
        let inner = self.inner.lock();
        RingStats {
            total_written: inner.total_written,
            available: inner.entries.len(),
            dropped: inner.total_written - inner.entries.len() as u64,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop all entries and reset the lifetime counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.total_written = 0;
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
