//! Test fixtures and index helpers.
//!
//! Provides ready-made definitions, document builders, a recording result
//! writer, and indexes backed by memory or a temporary directory that can be
//! closed and reopened.

use autoreduce_codec::Value;
use autoreduce_core::{
    AutoMapReduceIndex, AutoMapReduceIndexDefinition, BatchResult, CoreResult, Document,
    IndexConfig, IndexField, IndexItem, InMemoryResultStore, ReduceKeyHash, ResultWriter,
    Tombstone,
};
use autoreduce_storage::{Environment, InMemoryBackend};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Name of the index built by [`orders_definition`].
pub const ORDERS_INDEX: &str = "orders_by_category";

/// Group by `Category`, sum `Price`, count documents.
pub fn orders_definition() -> AutoMapReduceIndexDefinition {
    AutoMapReduceIndexDefinition::new(ORDERS_INDEX, "Orders")
        .with_map_field(IndexField::sum("Price").expect("valid path"))
        .with_map_field(IndexField::count("Count").expect("valid path"))
        .with_group_by(IndexField::group_by("Category").expect("valid path"))
}

/// An order document.
pub fn order(category: &str, price: i64) -> Value {
    Value::object([
        ("Category", Value::from(category)),
        ("Price", Value::from(price)),
    ])
}

/// A put item.
pub fn put(key: &str, data: Value) -> IndexItem {
    IndexItem::Put(Document::new(key, data))
}

/// A delete item.
pub fn delete(key: &str) -> IndexItem {
    IndexItem::Delete(Tombstone::new(key))
}

/// One call received by a [`RecordingWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCall {
    /// `retract(hash)`
    Retract(ReduceKeyHash),
    /// `write(hash, result)`
    Write(ReduceKeyHash, Value),
}

/// Result writer that remembers every call, in order.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    /// Calls received so far.
    pub calls: Vec<WriterCall>,
}

impl RecordingWriter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes passed to `retract`, in call order.
    pub fn retracted(&self) -> Vec<ReduceKeyHash> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WriterCall::Retract(hash) => Some(*hash),
                WriterCall::Write(..) => None,
            })
            .collect()
    }

    /// Drops recorded calls.
    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl ResultWriter for RecordingWriter {
    fn retract(&mut self, hash: ReduceKeyHash) -> CoreResult<()> {
        self.calls.push(WriterCall::Retract(hash));
        Ok(())
    }

    fn write(&mut self, hash: ReduceKeyHash, result: &Value) -> CoreResult<()> {
        self.calls.push(WriterCall::Write(hash, result.clone()));
        Ok(())
    }
}

enum Location {
    Memory(InMemoryBackend),
    Dir(TempDir),
}

/// An index with its result store, reopenable from the same storage.
pub struct TestIndex {
    /// The index instance.
    pub index: AutoMapReduceIndex,
    /// Results written by batches run through [`TestIndex::apply`].
    pub results: InMemoryResultStore,
    location: Location,
}

impl TestIndex {
    /// Creates an index over an in-memory commit log.
    pub fn memory(definition: AutoMapReduceIndexDefinition) -> Self {
        let backend = InMemoryBackend::new();
        let env = Environment::open(Box::new(backend.clone())).expect("Failed to open environment");
        Self::create(env, definition, Location::Memory(backend))
    }

    /// Creates an index in a temporary directory.
    pub fn file(definition: AutoMapReduceIndexDefinition) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let env = Environment::open_dir(temp_dir.path()).expect("Failed to open environment");
        Self::create(env, definition, Location::Dir(temp_dir))
    }

    fn create(env: Environment, definition: AutoMapReduceIndexDefinition, location: Location) -> Self {
        let index = AutoMapReduceIndex::create_new(Arc::new(env), definition, test_config())
            .expect("Failed to create index");
        Self {
            index,
            results: InMemoryResultStore::new(),
            location,
        }
    }

    /// Directory holding the environment, if file-based.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Memory(_) => None,
            Location::Dir(dir) => Some(dir.path()),
        }
    }

    /// Runs one batch, collecting results into [`TestIndex::results`].
    pub fn apply(&mut self, items: impl IntoIterator<Item = IndexItem>) -> CoreResult<BatchResult> {
        self.index.execute_batch(items, &mut self.results)
    }

    /// Closes the index and environment and opens them again from storage.
    ///
    /// The result store survives; the index statistics start over.
    pub fn reopen(self) -> Self {
        let Self {
            index,
            results,
            location,
        } = self;
        let name = index.name().to_string();
        drop(index);

        let env = match &location {
            Location::Memory(backend) => Environment::open(Box::new(backend.clone())),
            Location::Dir(dir) => Environment::open_dir(dir.path()),
        }
        .expect("Failed to reopen environment");
        let index = AutoMapReduceIndex::open(Arc::new(env), &name, test_config())
            .expect("Failed to reopen index");
        Self {
            index,
            results,
            location,
        }
    }
}

impl std::ops::Deref for TestIndex {
    type Target = AutoMapReduceIndex;

    fn deref(&self) -> &Self::Target {
        &self.index
    }
}

/// Configuration used by fixtures: no fsync, reduce after every batch.
pub fn test_config() -> IndexConfig {
    IndexConfig::default().sync_on_commit(false)
}

/// Runs a test with a fresh in-memory orders index.
pub fn with_orders_index<F, R>(f: F) -> R
where
    F: FnOnce(&mut TestIndex) -> R,
{
    let mut index = TestIndex::memory(orders_definition());
    f(&mut index)
}
