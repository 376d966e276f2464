//! Segment metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters, shareable across segments.
///
/// Relaxed ordering throughout; counters are independent of each other.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    searches_executed: AtomicU64,
    retrieves_executed: AtomicU64,
    retrieves_rejected: AtomicU64,
    rows_inserted: AtomicU64,
    chunks_appended: AtomicU64,
    chunks_skipped: AtomicU64,
    rows_hidden_by_timestamp: AtomicU64,
    deletes_applied: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_searches(&self) {
        self.searches_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retrieves(&self) {
        self.retrieves_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Retrieve refused by the byte budget
    pub fn increment_retrieves_rejected(&self) {
        self.retrieves_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_inserted(&self, rows: u64) {
        self.rows_inserted.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_chunks_appended(&self, chunks: u64) {
        self.chunks_appended.fetch_add(chunks, Ordering::Relaxed);
    }

    /// Chunks pruned by the skip index
    pub fn add_chunks_skipped(&self, chunks: u64) {
        self.chunks_skipped.fetch_add(chunks, Ordering::Relaxed);
    }

    /// Rows hidden because they were written after the query timestamp
    pub fn add_rows_hidden(&self, rows: u64) {
        self.rows_hidden_by_timestamp.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_deletes(&self, keys: u64) {
        self.deletes_applied.fetch_add(keys, Ordering::Relaxed);
    }

    pub fn chunks_skipped(&self) -> u64 {
        self.chunks_skipped.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches_executed: self.searches_executed.load(Ordering::Relaxed),
            retrieves_executed: self.retrieves_executed.load(Ordering::Relaxed),
            retrieves_rejected: self.retrieves_rejected.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            chunks_appended: self.chunks_appended.load(Ordering::Relaxed),
            chunks_skipped: self.chunks_skipped.load(Ordering::Relaxed),
            rows_hidden_by_timestamp: self.rows_hidden_by_timestamp.load(Ordering::Relaxed),
            deletes_applied: self.deletes_applied.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the registry's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub searches_executed: u64,
    pub retrieves_executed: u64,
    pub retrieves_rejected: u64,
    pub rows_inserted: u64,
    pub chunks_appended: u64,
    pub chunks_skipped: u64,
    pub rows_hidden_by_timestamp: u64,
    pub deletes_applied: u64,
}
