//! Bounded object reuse for hot-path record types
//!
//! Records are pre-allocated at startup and cycled through a lock-free
//! free-list. A release from any thread lands in the same MPMC queue that
//! `acquire` pops from, so cross-thread returns need no routing. When the
//! free-list runs dry the pool falls back to a fresh allocation and counts
//! the miss; a non-zero miss count is a sizing error, not a failure.

use crossbeam::queue::ArrayQueue;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Records that can be recycled must scrub themselves before reuse.
pub trait Recycle: Default {
    /// Restore the record to its blank state, retaining allocations
    /// (buffers keep their capacity).
    fn recycle(&mut self);
}

/// Fixed-capacity lock-free record pool.
pub struct RecordPool<T: Recycle> {
    free: Arc<ArrayQueue<T>>,
    capacity: usize,
    misses: CachePadded<AtomicU64>,
}

impl<T: Recycle> RecordPool<T> {
    /// Pre-allocate `capacity` records. Runs once at startup.
    pub fn new(capacity: usize) -> Self {
        let free = Arc::new(ArrayQueue::new(capacity.max(1)));
        for _ in 0..capacity {
            let _ = free.push(T::default());
        }
        Self {
            free,
            capacity: capacity.max(1),
            misses: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Take a blank record, allocating only when the pool is dry.
    #[inline]
    pub fn acquire(&self) -> T {
        match self.free.pop() {
            Some(record) => record,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                T::default()
            }
        }
    }

    /// Return a record. Scrubbed here so acquirers always see blank state.
    /// Returns on a full queue are dropped; that only happens after a miss
    /// grew the working set past capacity.
    #[inline]
    pub fn release(&self, mut record: T) {
        record.recycle();
        let _ = self.free.push(record);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Acquires served by fresh allocation because the free-list was empty.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            available: self.available(),
            misses: self.misses(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub misses: u64,
}

impl PoolStats {
    /// More than 90% of the pool is checked out.
    pub fn is_near_exhaustion(&self) -> bool {
        self.available * 10 < self.capacity
    }
}
