//! Core type definitions for autoreduce.

use autoreduce_codec::Value;
use std::fmt;

/// Logical timestamp of one mapped contribution.
///
/// Etags are strictly increasing over the lifetime of an index and never
/// reused, even after the entry they named is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Etag(pub u64);

impl Etag {
    /// Creates a new etag.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw etag value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following etag, or `None` on overflow.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "etag:{}", self.0)
    }
}

/// 64-bit hash of a document's group-by values. Names a reduce bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReduceKeyHash(pub u64);

impl ReduceKeyHash {
    /// Creates a reduce key hash from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw hash value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReduceKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identifier of a source document. Compared bytewise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey(Vec<u8>);

impl DocumentKey {
    /// Creates a document key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for DocumentKey {
    fn from(key: &str) -> Self {
        Self(key.as_bytes().to_vec())
    }
}

impl From<String> for DocumentKey {
    fn from(key: String) -> Self {
        Self(key.into_bytes())
    }
}

impl From<Vec<u8>> for DocumentKey {
    fn from(key: Vec<u8>) -> Self {
        Self(key)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// A document flowing into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Source document key.
    pub key: DocumentKey,
    /// Document body.
    pub data: Value,
}

impl Document {
    /// Creates a document.
    pub fn new(key: impl Into<DocumentKey>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }
}

/// Marker for a deleted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    /// Key of the deleted document.
    pub key: DocumentKey,
}

impl Tombstone {
    /// Creates a tombstone.
    pub fn new(key: impl Into<DocumentKey>) -> Self {
        Self { key: key.into() }
    }
}

/// One unit of work in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexItem {
    /// A new or changed document.
    Put(Document),
    /// A deleted document.
    Delete(Tombstone),
}

impl IndexItem {
    /// Key of the document this item concerns.
    #[must_use]
    pub fn key(&self) -> &DocumentKey {
        match self {
            IndexItem::Put(document) => &document.key,
            IndexItem::Delete(tombstone) => &tombstone.key,
        }
    }
}

impl From<Document> for IndexItem {
    fn from(document: Document) -> Self {
        IndexItem::Put(document)
    }
}

impl From<Tombstone> for IndexItem {
    fn from(tombstone: Tombstone) -> Self {
        IndexItem::Delete(tombstone)
    }
}

/// One document's contribution to one reduce bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    /// Etag of the mapped blob inside the bucket.
    pub etag: Etag,
    /// Source document.
    pub document_key: DocumentKey,
    /// Bucket the blob lives in.
    pub reduce_key_hash: ReduceKeyHash,
}
