//! Model-checked integration harness.
//!
//! [`IndexHarness`] drives a [`TestIndex`] built from
//! [`orders_definition`] and keeps a plain map of the documents that should
//! be live. [`IndexHarness::verify`] checks the index against that model:
//! map entries, bucket contents and reduced output.

use crate::fixtures::{orders_definition, TestIndex};
use crate::generators::IndexOperation;
use autoreduce_codec::Value;
use autoreduce_core::{BatchResult, CoreResult, DocumentKey, ReduceKeyHash};
use std::collections::{BTreeMap, HashMap};

/// Harness pairing an orders index with the documents it should reflect.
pub struct IndexHarness {
    /// The index under test.
    pub index: TestIndex,
    live: BTreeMap<String, Value>,
}

impl IndexHarness {
    /// Creates a harness over an in-memory orders index.
    pub fn memory() -> Self {
        Self::with_index(TestIndex::memory(orders_definition()))
    }

    /// Creates a harness over a file-backed orders index.
    pub fn file() -> Self {
        Self::with_index(TestIndex::file(orders_definition()))
    }

    fn with_index(index: TestIndex) -> Self {
        Self {
            index,
            live: BTreeMap::new(),
        }
    }

    /// Applies one batch. The model only changes if the batch commits.
    pub fn apply(&mut self, batch: &[IndexOperation]) -> CoreResult<BatchResult> {
        let result = self.index.apply(batch.iter().map(IndexOperation::to_item))?;
        for op in batch {
            match op {
                IndexOperation::Put { key, data } => {
                    self.live.insert(key.clone(), data.clone());
                }
                IndexOperation::Delete { key } => {
                    self.live.remove(key);
                }
            }
        }
        Ok(result)
    }

    /// Closes and reopens the index from storage.
    pub fn reopen(self) -> Self {
        Self {
            index: self.index.reopen(),
            live: self.live,
        }
    }

    /// Number of documents the model says are live.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Checks the index against the model, panicking on the first mismatch.
    pub fn verify(&self) {
        assert_eq!(
            self.index.map_entry_count(),
            self.live.len(),
            "one map entry per live document"
        );

        let mut expected: HashMap<ReduceKeyHash, (i64, i64)> = HashMap::new();
        for (key, data) in &self.live {
            let entries = self
                .index
                .entries_for_document(&DocumentKey::from(key.as_str()))
                .expect("Failed to read entries");
            assert_eq!(entries.len(), 1, "document {key} must have one entry");

            let (_, hash) = self.index.reduce_key_for(data).expect("Failed to hash");
            assert_eq!(entries[0].reduce_key_hash, hash, "document {key} in wrong bucket");

            let blobs = self.index.bucket_entries(hash).expect("Failed to read bucket");
            assert!(
                blobs.iter().any(|(etag, _)| *etag == entries[0].etag),
                "bucket blob missing for document {key}"
            );

            let price = data.get("Price").and_then(Value::as_integer).unwrap_or(0);
            let group = expected.entry(hash).or_default();
            group.0 += price;
            group.1 += 1;
        }

        let mut hashes = self.index.reduce_key_hashes().expect("Failed to list hashes");
        hashes.sort();
        let mut expected_hashes: Vec<_> = expected.keys().copied().collect();
        expected_hashes.sort();
        assert_eq!(hashes, expected_hashes, "live buckets");

        for (hash, (price, count)) in &expected {
            assert_eq!(
                self.index.bucket_entries(*hash).expect("Failed to read bucket").len() as i64,
                *count,
                "bucket {hash} holds one blob per document"
            );
            let reduced = self
                .index
                .results
                .get(*hash)
                .unwrap_or_else(|| panic!("no reduced output for bucket {hash}"));
            assert_eq!(reduced.get("Price"), Some(&Value::from(*price)));
            assert_eq!(reduced.get("Count"), Some(&Value::from(*count)));
        }
        assert_eq!(self.index.results.len(), expected.len(), "stale reduced output");
    }
}
