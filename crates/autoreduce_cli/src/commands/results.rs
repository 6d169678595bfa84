//! Results command implementation.

use super::{open_index, CommandResult};
use crate::json;
use autoreduce_core::InMemoryResultStore;
use std::path::Path;

/// Runs the results command: reduces every bucket and prints one JSON
/// object per group.
pub fn run(path: &Path, name: &str, pretty: bool) -> CommandResult {
    let index = open_index(path, name)?;
    let mut results = InMemoryResultStore::new();
    index.reduce_all(&mut results)?;

    for (_, result) in results.iter() {
        let json = json::from_value(result);
        if pretty {
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            println!("{json}");
        }
    }
    Ok(())
}
