//! Reduce key buckets.

use crate::error::CoreResult;
use crate::keys;
use crate::types::{Etag, ReduceKeyHash};
use autoreduce_codec::{from_cbor, Value};
use autoreduce_storage::{ReadView, WriteTransaction};

/// Handle on the tree holding every mapped blob for one reduce key hash,
/// keyed by etag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceKeyBucket {
    hash: ReduceKeyHash,
    tree: String,
}

impl ReduceKeyBucket {
    /// Handle for `hash` without touching storage.
    pub fn new(index: &str, hash: ReduceKeyHash) -> Self {
        Self {
            hash,
            tree: keys::bucket_tree(index, hash),
        }
    }

    /// Handle for `hash`, creating the bucket tree if it does not exist.
    pub fn open(txn: &mut WriteTransaction<'_>, index: &str, hash: ReduceKeyHash) -> Self {
        let bucket = Self::new(index, hash);
        txn.create_tree(&bucket.tree);
        bucket
    }

    /// The bucket's reduce key hash.
    pub fn hash(&self) -> ReduceKeyHash {
        self.hash
    }

    /// Name of the backing tree.
    pub fn tree_name(&self) -> &str {
        &self.tree
    }

    /// Store a mapped blob under `etag`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the bucket tree does not exist.
    pub fn put(&self, txn: &mut WriteTransaction<'_>, etag: Etag, blob: &[u8]) -> CoreResult<()> {
        txn.put(&self.tree, &keys::encode_etag(etag), blob)?;
        Ok(())
    }

    /// Remove the blob under `etag`. Returns `true` if it was present.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the bucket tree does not exist.
    pub fn delete(&self, txn: &mut WriteTransaction<'_>, etag: Etag) -> CoreResult<bool> {
        Ok(txn.delete(&self.tree, &keys::encode_etag(etag))?)
    }

    /// Decoded blobs in etag order. A bucket that was never created is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a key or blob is malformed.
    pub fn entries(&self, view: &(impl ReadView + ?Sized)) -> CoreResult<Vec<(Etag, Value)>> {
        if !view.tree_exists(&self.tree) {
            return Ok(Vec::new());
        }
        view.iter_from(&self.tree, &[])?
            .map(|(key, blob)| -> CoreResult<(Etag, Value)> {
                Ok((keys::decode_etag(key)?, from_cbor(blob)?))
            })
            .collect()
    }

    /// Number of blobs in the bucket.
    pub fn len(&self, view: &(impl ReadView + ?Sized)) -> usize {
        view.tree_len(&self.tree)
    }

    /// Returns `true` if the bucket holds no blobs.
    pub fn is_empty(&self, view: &(impl ReadView + ?Sized)) -> bool {
        self.len(view) == 0
    }
}
