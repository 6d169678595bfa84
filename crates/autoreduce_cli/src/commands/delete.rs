//! Delete command implementation.

use super::{batch_limit, open_index, CommandResult};
use autoreduce_core::{AutoMapReduceIndex, IndexItem, InMemoryResultStore, Tombstone};
use std::path::Path;

/// Runs the delete command, splitting the keys into batches the index
/// accepts.
pub fn run(path: &Path, name: &str, keys: &[String]) -> CommandResult {
    let index = open_index(path, name)?;
    let mut results = InMemoryResultStore::new();
    let (deleted, retracted) = delete_keys(&index, keys, &mut results)?;
    println!("deleted {deleted} documents from '{name}', {retracted} entries retracted");
    Ok(())
}

/// Deletes `keys` from `index`, returning the documents deleted and the
/// entries retracted.
pub fn delete_keys(
    index: &AutoMapReduceIndex,
    keys: &[String],
    results: &mut InMemoryResultStore,
) -> CommandResult<(usize, usize)> {
    let mut deleted = 0;
    let mut retracted = 0;
    for chunk in keys.chunks(batch_limit(index, keys.len())) {
        let outcome = index.execute_batch(
            chunk.iter().map(|key| IndexItem::Delete(Tombstone::new(key.as_str()))),
            results,
        )?;
        deleted += outcome.documents_deleted;
        retracted += outcome.entries_retracted;
    }
    Ok((deleted, retracted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::map::tests::small_batch_index;
    use autoreduce_codec::Value;
    use autoreduce_core::Document;

    #[test]
    fn keys_beyond_the_batch_limit_are_chunked() {
        let index = small_batch_index();
        let mut results = InMemoryResultStore::new();
        for n in 0..3 {
            let doc = Value::object([("Category", Value::from("A")), ("Price", Value::from(n))]);
            index
                .execute_batch([IndexItem::Put(Document::new(format!("orders/{n}"), doc))], &mut results)
                .unwrap();
        }

        let keys: Vec<String> = (0..5).map(|n| format!("orders/{n}")).collect();
        assert_eq!(delete_keys(&index, &keys, &mut results).unwrap(), (5, 3));
        assert_eq!(index.map_entry_count(), 0);
        assert!(results.is_empty());
        assert_eq!(delete_keys(&index, &[], &mut results).unwrap(), (0, 0));
    }
}
