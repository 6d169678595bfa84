//! Per-transaction indexing context.

use crate::bucket::ReduceKeyBucket;
use crate::error::CoreResult;
use crate::types::{Etag, ReduceKeyHash};
use autoreduce_storage::WriteTransaction;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// Scope of one batch inside one write transaction.
///
/// The context borrows the transaction exclusively, caches a bucket handle
/// per reduce key hash on first use, and records which buckets the batch
/// changed and which results must be retracted. Everything it caches is
/// released when it goes out of scope, whether the batch succeeded or not.
pub struct IndexingContext<'t, 'env> {
    txn: &'t mut WriteTransaction<'env>,
    index: String,
    buckets: HashMap<ReduceKeyHash, ReduceKeyBucket>,
    touched: BTreeSet<ReduceKeyHash>,
    retracted: BTreeSet<ReduceKeyHash>,
}

/// What a finished context hands back to the batch runner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    /// Buckets that gained or lost a blob.
    pub touched: BTreeSet<ReduceKeyHash>,
    /// Buckets whose downstream result must be retracted.
    pub retracted: BTreeSet<ReduceKeyHash>,
}

impl<'t, 'env> IndexingContext<'t, 'env> {
    /// Opens a context for `index` over `txn`.
    pub fn new(txn: &'t mut WriteTransaction<'env>, index: impl Into<String>) -> Self {
        Self {
            txn,
            index: index.into(),
            buckets: HashMap::new(),
            touched: BTreeSet::new(),
            retracted: BTreeSet::new(),
        }
    }

    /// Name of the index this context serves.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// The underlying transaction.
    pub fn txn(&mut self) -> &mut WriteTransaction<'env> {
        &mut *self.txn
    }

    /// Read access to the underlying transaction.
    pub fn view(&self) -> &WriteTransaction<'env> {
        &*self.txn
    }

    /// Bucket handle for `hash`, opening and caching it on first use.
    pub fn bucket(&mut self, hash: ReduceKeyHash) -> &ReduceKeyBucket {
        cached_bucket(&mut self.buckets, self.txn, &self.index, hash)
    }

    /// Store a mapped blob in the bucket for `hash`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn put_mapped(&mut self, hash: ReduceKeyHash, etag: Etag, blob: &[u8]) -> CoreResult<()> {
        let bucket = cached_bucket(&mut self.buckets, self.txn, &self.index, hash);
        bucket.put(self.txn, etag, blob)?;
        self.touched.insert(hash);
        Ok(())
    }

    /// Remove a mapped blob from the bucket for `hash`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the delete fails.
    pub fn delete_mapped(&mut self, hash: ReduceKeyHash, etag: Etag) -> CoreResult<bool> {
        let bucket = cached_bucket(&mut self.buckets, self.txn, &self.index, hash);
        let removed = bucket.delete(self.txn, etag)?;
        self.touched.insert(hash);
        Ok(removed)
    }

    /// Returns `true` if the bucket for `hash` holds no blobs, counting this
    /// transaction's writes.
    pub fn bucket_is_empty(&mut self, hash: ReduceKeyHash) -> bool {
        let bucket = cached_bucket(&mut self.buckets, self.txn, &self.index, hash);
        bucket.is_empty(&*self.txn)
    }

    /// Record that the downstream result for `hash` must be retracted.
    pub fn retract(&mut self, hash: ReduceKeyHash) {
        self.retracted.insert(hash);
    }

    /// Number of cached bucket handles.
    pub fn cached_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Buckets changed so far.
    pub fn touched(&self) -> &BTreeSet<ReduceKeyHash> {
        &self.touched
    }

    /// Close the context, handing back what the batch changed.
    pub fn finish(mut self) -> ContextSummary {
        ContextSummary {
            touched: std::mem::take(&mut self.touched),
            retracted: std::mem::take(&mut self.retracted),
        }
    }
}

fn cached_bucket<'b>(
    buckets: &'b mut HashMap<ReduceKeyHash, ReduceKeyBucket>,
    txn: &mut WriteTransaction<'_>,
    index: &str,
    hash: ReduceKeyHash,
) -> &'b ReduceKeyBucket {
    match buckets.entry(hash) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(ReduceKeyBucket::open(txn, index, hash)),
    }
}

impl Drop for IndexingContext<'_, '_> {
    fn drop(&mut self) {
        trace!(
            index = %self.index,
            buckets = self.buckets.len(),
            "releasing indexing context"
        );
        self.buckets.clear();
    }
}
