//! CLI command implementations.

pub mod create;
pub mod delete;
pub mod inspect;
pub mod map;
pub mod results;

use autoreduce_core::{AutoMapReduceIndex, IndexConfig};
use autoreduce_storage::Environment;
use std::path::Path;
use std::sync::Arc;

/// Result type shared by commands.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens the index `name` stored in the environment at `path`.
pub fn open_index(path: &Path, name: &str) -> CommandResult<AutoMapReduceIndex> {
    let env = Environment::open_dir(path)?;
    Ok(AutoMapReduceIndex::open(Arc::new(env), name, IndexConfig::default())?)
}

/// Largest batch `index` accepts for a requested size, never below one item.
pub fn batch_limit(index: &AutoMapReduceIndex, requested: usize) -> usize {
    requested.clamp(1, index.config().max_batch_size.max(1))
}
