//! # autoreduce core
//!
//! Automatic map-reduce indexes. An index is declared with group-by fields
//! and aggregation fields; documents are mapped into per-group buckets and
//! every contribution is recorded so that a later update or delete can
//! retract exactly what the document added.
//!
//! This crate provides:
//! - [`AutoMapReduceIndexDefinition`] - declarative index fields
//! - [`AutoMapReduceIndex`] - map and delete executors, batch runner, reload
//! - [`MapEntryTable`] - document to bucket links, indexed both ways
//! - [`ReduceKeyBucket`] - mapped blobs of one group, ordered by etag
//! - [`IndexingContext`] - per-transaction bucket cache
//! - [`ResultWriter`] - downstream sink for reduced output
//!
//! Storage lives in an [`autoreduce_storage::Environment`]. For index
//! `name` the layout is:
//!
//! | tree | content |
//! |---|---|
//! | `name/meta` | definition and last etag |
//! | `name/MapResults` | map entry rows, plus its two index trees |
//! | `name/ReduceKeys` | group-by projection per hash |
//! | `name/reduce/{hash:016x}` | one bucket per hash |

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod context;
mod definition;
mod error;
mod index;
pub mod keys;
mod map_entries;
mod reduce;
mod stats;
mod types;
mod writer;

pub use bucket::ReduceKeyBucket;
pub use config::IndexConfig;
pub use context::{ContextSummary, IndexingContext};
pub use definition::{AutoMapReduceIndexDefinition, FieldOperation, IndexField};
pub use error::{CoreError, CoreResult};
pub use index::{AutoMapReduceIndex, BatchResult};
pub use map_entries::{MapEntryTable, DOCUMENT_KEYS_INDEX, REDUCE_KEY_HASHES_INDEX};
pub use reduce::reduce_bucket;
pub use stats::{IndexStats, IndexStatsSnapshot};
pub use types::{Document, DocumentKey, Etag, IndexItem, MapEntry, ReduceKeyHash, Tombstone};
pub use writer::{InMemoryResultStore, ResultWriter};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
