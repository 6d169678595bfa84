//! Map command implementation.

use super::{batch_limit, open_index, CommandResult};
use crate::json;
use autoreduce_core::{AutoMapReduceIndex, Document, IndexItem, InMemoryResultStore, Tombstone};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// One input line. A line without `doc`, or with `"doc": null`, deletes
/// the document.
#[derive(Debug, Deserialize)]
struct InputLine {
    key: String,
    #[serde(default)]
    doc: Option<serde_json::Value>,
}

/// Parses one JSON line into a batch item.
pub fn parse_line(line: &str) -> CommandResult<IndexItem> {
    let input: InputLine = serde_json::from_str(line)?;
    Ok(match input.doc {
        Some(doc) => IndexItem::Put(Document::new(input.key, json::to_value(&doc)?)),
        None => IndexItem::Delete(Tombstone::new(input.key)),
    })
}

/// Runs the map command: reads JSON lines from `input` and applies them in
/// batches of `batch_size`.
pub fn run(path: &Path, name: &str, input: &Path, batch_size: usize) -> CommandResult {
    let index = open_index(path, name)?;
    let reader = BufReader::new(File::open(input)?);
    let mut results = InMemoryResultStore::new();
    let mapped = apply_lines(&index, reader, batch_size, &mut results)?;

    info!(index = name, mapped, last_etag = index.last_etag().as_u64(), "input applied");
    println!(
        "mapped {mapped} documents into '{name}', {} groups changed, last etag {}",
        results.len(),
        index.last_etag().as_u64()
    );
    Ok(())
}

/// Applies JSON lines to `index` in batches, returning the number of
/// documents mapped. The batch size is clamped to what the index accepts.
pub fn apply_lines(
    index: &AutoMapReduceIndex,
    reader: impl BufRead,
    batch_size: usize,
    results: &mut InMemoryResultStore,
) -> CommandResult<usize> {
    let limit = batch_limit(index, batch_size);
    if limit != batch_size {
        warn!(requested = batch_size, batch_size = limit, "batch size clamped");
    }
    let mut batch = Vec::with_capacity(limit);
    let mut mapped = 0;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = parse_line(&line).map_err(|e| format!("line {}: {e}", number + 1))?;
        batch.push(item);
        if batch.len() >= limit {
            mapped += index.execute_batch(batch.drain(..), results)?.documents_mapped;
        }
    }
    if !batch.is_empty() {
        mapped += index.execute_batch(batch, results)?.documents_mapped;
    }
    Ok(mapped)
}
