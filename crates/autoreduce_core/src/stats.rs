//! Index statistics.
//!
//! ```rust,ignore
//! let stats = index.stats().snapshot();
//! println!("mapped: {}", stats.documents_mapped);
//! println!("failed batches: {}", stats.batches_failed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one index.
///
/// All counters are atomic and can be read while a batch is running.
#[derive(Debug, Default)]
pub struct IndexStats {
    /// Documents passed through the map step.
    documents_mapped: AtomicU64,
    /// Tombstones processed.
    documents_deleted: AtomicU64,
    /// Map entries removed, by deletes or replacements.
    entries_retracted: AtomicU64,
    /// Buckets reduced.
    buckets_reduced: AtomicU64,
    /// Batches committed.
    batches_committed: AtomicU64,
    /// Batches rolled back.
    batches_failed: AtomicU64,
}

impl IndexStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_mapped(&self, documents: u64) {
        self.documents_mapped.fetch_add(documents, Ordering::Relaxed);
    }

    pub(crate) fn record_deleted(&self, documents: u64) {
        self.documents_deleted.fetch_add(documents, Ordering::Relaxed);
    }

    pub(crate) fn record_retracted(&self, entries: u64) {
        self.entries_retracted.fetch_add(entries, Ordering::Relaxed);
    }

    pub(crate) fn record_reduced(&self, buckets: u64) {
        self.buckets_reduced.fetch_add(buckets, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_committed(&self) {
        self.batches_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Documents passed through the map step.
    pub fn documents_mapped(&self) -> u64 {
        self.documents_mapped.load(Ordering::Relaxed)
    }

    /// Tombstones processed.
    pub fn documents_deleted(&self) -> u64 {
        self.documents_deleted.load(Ordering::Relaxed)
    }

    /// Map entries removed.
    pub fn entries_retracted(&self) -> u64 {
        self.entries_retracted.load(Ordering::Relaxed)
    }

    /// Buckets reduced.
    pub fn buckets_reduced(&self) -> u64 {
        self.buckets_reduced.load(Ordering::Relaxed)
    }

    /// Batches committed.
    pub fn batches_committed(&self) -> u64 {
        self.batches_committed.load(Ordering::Relaxed)
    }

    /// Batches rolled back.
    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> IndexStatsSnapshot {
        IndexStatsSnapshot {
            documents_mapped: self.documents_mapped(),
            documents_deleted: self.documents_deleted(),
            entries_retracted: self.entries_retracted(),
            buckets_reduced: self.buckets_reduced(),
            batches_committed: self.batches_committed(),
            batches_failed: self.batches_failed(),
        }
    }
}

/// Plain copy of [`IndexStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct IndexStatsSnapshot {
    pub documents_mapped: u64,
    pub documents_deleted: u64,
    pub entries_retracted: u64,
    pub buckets_reduced: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
}
