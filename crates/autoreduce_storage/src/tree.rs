//! Ordered trees and snapshots.

use crate::error::{StorageError, StorageResult};
use im::ordmap::{self, OrdMap};
use std::ops::Bound;

/// An ordered key-value tree. Keys compare bytewise.
///
/// Trees are persistent maps: a clone shares every node with the original,
/// and a write copies only the nodes on the path to the changed key.
pub type Tree = OrdMap<Vec<u8>, Vec<u8>>;

/// Iterator over a tree range.
pub type TreeRange<'a> = ordmap::Iter<'a, Vec<u8>, Vec<u8>>;

/// An immutable view of every tree at one point in time.
///
/// Cloning a snapshot is constant time; a write transaction works on a
/// clone, and only the nodes it touches diverge from the committed state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    trees: OrdMap<String, Tree>,
}

impl Snapshot {
    /// Look up a tree by name.
    pub fn tree(&self, name: &str) -> Option<&Tree> {
        self.trees.get(name)
    }

    /// Names of all trees, in order.
    pub fn tree_names(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    /// Number of trees.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Create a tree if missing. Returns `true` if it was created.
    pub(crate) fn create_tree(&mut self, name: &str) -> bool {
        if self.trees.contains_key(name) {
            return false;
        }
        self.trees.insert(name.to_string(), Tree::new());
        true
    }

    pub(crate) fn tree_mut(&mut self, name: &str) -> StorageResult<&mut Tree> {
        self.trees
            .get_mut(name)
            .ok_or_else(|| StorageError::TreeNotFound(name.to_string()))
    }
}

/// Read access shared by read and write transactions.
///
/// A write transaction reads its own uncommitted writes; a read transaction
/// sees the snapshot it was opened on.
pub trait ReadView {
    /// The snapshot this view reads from.
    fn snapshot(&self) -> &Snapshot;

    /// Returns `true` if the tree exists.
    fn tree_exists(&self, tree: &str) -> bool {
        self.snapshot().tree(tree).is_some()
    }

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TreeNotFound`] if the tree does not exist.
    fn get(&self, tree: &str, key: &[u8]) -> StorageResult<Option<&[u8]>> {
        Ok(self.existing(tree)?.get(key).map(Vec::as_slice))
    }

    /// Iterate entries with keys at or after `from`, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TreeNotFound`] if the tree does not exist.
    fn iter_from(&self, tree: &str, from: &[u8]) -> StorageResult<TreeRange<'_>> {
        Ok(self
            .existing(tree)?
            .range::<_, [u8]>((Bound::Included(from), Bound::Unbounded)))
    }

    /// The entry with the greatest key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TreeNotFound`] if the tree does not exist.
    fn last(&self, tree: &str) -> StorageResult<Option<(&[u8], &[u8])>> {
        Ok(self
            .existing(tree)?
            .get_max()
            .map(|(k, v)| (k.as_slice(), v.as_slice())))
    }

    /// Number of entries in a tree, zero if it does not exist.
    fn tree_len(&self, tree: &str) -> usize {
        self.snapshot().tree(tree).map_or(0, Tree::len)
    }

    /// Names of all trees starting with `prefix`, in order.
    fn tree_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.snapshot()
            .tree_names()
            .filter(|name| name.starts_with(prefix))
            .map(str::to_string)
            .collect()
    }

    #[doc(hidden)]
    fn existing(&self, tree: &str) -> StorageResult<&Tree> {
        self.snapshot()
            .tree(tree)
            .ok_or_else(|| StorageError::TreeNotFound(tree.to_string()))
    }
}

impl ReadView for Snapshot {
    fn snapshot(&self) -> &Snapshot {
        self
    }
}
