//! Inspect command implementation.

use super::{open_index, CommandResult};
use crate::json;
use autoreduce_core::AutoMapReduceIndex;
use autoreduce_storage::{Environment, ReadView};
use serde::Serialize;
use std::path::Path;

/// Index inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Index name.
    pub name: String,
    /// Source collection.
    pub collection: String,
    /// Group-by fields as `name <- path`.
    pub group_by: Vec<String>,
    /// Aggregation fields as `name <- op(path)`.
    pub map: Vec<String>,
    /// Highest etag allocated.
    pub last_etag: u64,
    /// Number of map entries.
    pub map_entries: usize,
    /// Number of bucket trees, including emptied ones.
    pub buckets: usize,
    /// Bucket details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_details: Option<Vec<BucketInfo>>,
}

/// Contents of one non-empty bucket.
#[derive(Debug, Serialize)]
pub struct BucketInfo {
    /// Reduce key hash, hex.
    pub hash: String,
    /// Group-by projection.
    pub key: serde_json::Value,
    /// Mapped blobs as `(etag, blob)`.
    pub blobs: Vec<(u64, serde_json::Value)>,
}

/// Collects inspection data for an open index.
pub fn inspect(index: &AutoMapReduceIndex, with_buckets: bool) -> CommandResult<InspectResult> {
    let definition = index.definition();
    let bucket_details = if with_buckets {
        let mut details = Vec::new();
        for hash in index.reduce_key_hashes()? {
            details.push(BucketInfo {
                hash: hash.to_string(),
                key: index
                    .reduce_key(hash)?
                    .map_or(serde_json::Value::Null, |key| json::from_value(&key)),
                blobs: index
                    .bucket_entries(hash)?
                    .iter()
                    .map(|(etag, blob)| (etag.as_u64(), json::from_value(blob)))
                    .collect(),
            });
        }
        Some(details)
    } else {
        None
    };

    Ok(InspectResult {
        name: definition.name().to_string(),
        collection: definition.collection().to_string(),
        group_by: definition
            .group_by_fields()
            .iter()
            .map(|field| format!("{} <- {}", field.name(), field.path()))
            .collect(),
        map: definition
            .map_fields()
            .iter()
            .map(|field| format!("{} <- {}({})", field.name(), field.operation(), field.path()))
            .collect(),
        last_etag: index.last_etag().as_u64(),
        map_entries: index.map_entry_count(),
        buckets: index.bucket_count(),
        bucket_details,
    })
}

/// Names of every index stored in the environment at `path`.
pub fn list_indexes(path: &Path) -> CommandResult<Vec<String>> {
    let env = Environment::open_dir(path)?;
    Ok(env
        .read()
        .tree_names_with_prefix("")
        .into_iter()
        .filter_map(|tree| tree.strip_suffix("/meta").map(str::to_string))
        .collect())
}

/// Runs the inspect command. Without a name, lists the stored indexes.
pub fn run(path: &Path, name: Option<&str>, with_buckets: bool, format: &str) -> CommandResult {
    let Some(name) = name else {
        for index in list_indexes(path)? {
            println!("{index}");
        }
        return Ok(());
    };

    let index = open_index(path, name)?;
    let result = inspect(&index, with_buckets)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Index:       {}", result.name);
    println!("Collection:  {}", result.collection);
    println!("Group by:    {}", result.group_by.join(", "));
    println!("Map:         {}", result.map.join(", "));
    println!("Last etag:   {}", result.last_etag);
    println!("Map entries: {}", result.map_entries);
    println!("Buckets:     {}", result.buckets);

    if let Some(details) = &result.bucket_details {
        for bucket in details {
            println!();
            println!("  bucket {} {}", bucket.hash, bucket.key);
            for (etag, blob) in &bucket.blobs {
                println!("    {etag:>8}  {blob}");
            }
        }
    }
}
