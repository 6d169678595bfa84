//! Map entry table.
//!
//! One row per document contribution to a bucket:
//!
//! | column | content | index |
//! |---|---|---|
//! | 0 | etag, big-endian | primary key |
//! | 1 | document key | `DocumentKeys` |
//! | 2 | reduce key hash, big-endian | `ReduceKeyHashes` (fixed 8 bytes) |

use crate::error::{CoreError, CoreResult};
use crate::keys::{self, KEY_WIDTH};
use crate::types::{DocumentKey, Etag, MapEntry, ReduceKeyHash};
use autoreduce_storage::{ReadView, TableRow, TableSchema, WriteTransaction};

const ETAG_COLUMN: usize = 0;
const DOCUMENT_KEY_COLUMN: usize = 1;
const HASH_COLUMN: usize = 2;

/// Secondary index over document keys.
pub const DOCUMENT_KEYS_INDEX: &str = "DocumentKeys";

/// Secondary index over reduce key hashes.
pub const REDUCE_KEY_HASHES_INDEX: &str = "ReduceKeyHashes";

/// The map entry table of one index.
#[derive(Debug, Clone)]
pub struct MapEntryTable {
    schema: TableSchema,
}

impl MapEntryTable {
    /// Table layout for the named index.
    pub fn new(index: &str) -> Self {
        Self {
            schema: TableSchema::new(keys::map_entries_table(index), ETAG_COLUMN)
                .with_index(DOCUMENT_KEYS_INDEX, DOCUMENT_KEY_COLUMN)
                .with_fixed_size_index(REDUCE_KEY_HASHES_INDEX, HASH_COLUMN, KEY_WIDTH),
        }
    }

    /// Create the table's trees.
    pub fn create(&self, txn: &mut WriteTransaction<'_>) {
        self.schema.create(txn);
    }

    /// Insert a row. Both secondary indexes are updated in the same call.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the etag is already present.
    pub fn insert(&self, txn: &mut WriteTransaction<'_>, entry: &MapEntry) -> CoreResult<()> {
        let etag = keys::encode_etag(entry.etag);
        let hash = keys::encode_hash(entry.reduce_key_hash);
        self.schema
            .insert(txn, &[&etag, entry.document_key.as_bytes(), &hash])?;
        Ok(())
    }

    /// All entries of one document, in etag order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or a row is malformed.
    pub fn entries_for_document(
        &self,
        view: &(impl ReadView + ?Sized),
        key: &DocumentKey,
    ) -> CoreResult<Vec<MapEntry>> {
        self.schema
            .seek_by_index(view, DOCUMENT_KEYS_INDEX, key.as_bytes())?
            .iter()
            .map(decode_row)
            .collect()
    }

    /// All entries contributing to one bucket, in etag order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or a row is malformed.
    pub fn entries_for_hash(
        &self,
        view: &(impl ReadView + ?Sized),
        hash: ReduceKeyHash,
    ) -> CoreResult<Vec<MapEntry>> {
        self.schema
            .seek_by_index(view, REDUCE_KEY_HASHES_INDEX, &keys::encode_hash(hash))?
            .iter()
            .map(decode_row)
            .collect()
    }

    /// Remove the row for `etag`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the table is missing.
    pub fn delete(&self, txn: &mut WriteTransaction<'_>, etag: Etag) -> CoreResult<bool> {
        Ok(self.schema.delete_by_key(txn, &keys::encode_etag(etag))?)
    }

    /// Highest etag present in the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or the key is malformed.
    pub fn last_etag(&self, view: &(impl ReadView + ?Sized)) -> CoreResult<Option<Etag>> {
        self.schema
            .last_primary_key(view)?
            .map(|pk| keys::decode_etag(&pk))
            .transpose()
    }

    /// Distinct reduce key hashes with at least one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is missing or a hash is malformed.
    pub fn reduce_key_hashes(&self, view: &(impl ReadView + ?Sized)) -> CoreResult<Vec<ReduceKeyHash>> {
        self.schema
            .scan_index(view, REDUCE_KEY_HASHES_INDEX)?
            .iter()
            .map(|bytes| keys::decode_hash(bytes))
            .collect()
    }

    /// Number of rows.
    pub fn len(&self, view: &(impl ReadView + ?Sized)) -> usize {
        self.schema.len(view)
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self, view: &(impl ReadView + ?Sized)) -> bool {
        self.schema.is_empty(view)
    }
}

fn decode_row(row: &TableRow) -> CoreResult<MapEntry> {
    if row.columns().len() != 3 {
        return Err(CoreError::invalid_format(format!(
            "map entry row has {} columns",
            row.columns().len()
        )));
    }
    Ok(MapEntry {
        etag: keys::decode_etag(row.column(ETAG_COLUMN))?,
        document_key: DocumentKey::new(row.column(DOCUMENT_KEY_COLUMN)),
        reduce_key_hash: keys::decode_hash(row.column(HASH_COLUMN))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoreduce_storage::Environment;

    fn entry(etag: u64, doc: &str, hash: u64) -> MapEntry {
        MapEntry {
            etag: Etag::new(etag),
            document_key: DocumentKey::from(doc),
            reduce_key_hash: ReduceKeyHash::new(hash),
        }
    }

    #[test]
    fn lookups_by_document_and_hash() {
        let env = Environment::in_memory();
        let table = MapEntryTable::new("idx");
        let mut txn = env.write();
        table.create(&mut txn);

        table.insert(&mut txn, &entry(1, "orders/1", 7)).unwrap();
        table.insert(&mut txn, &entry(2, "orders/10", 7)).unwrap();
        table.insert(&mut txn, &entry(3, "orders/1", 9)).unwrap();

        assert_eq!(
            table.entries_for_document(&txn, &"orders/1".into()).unwrap(),
            vec![entry(1, "orders/1", 7), entry(3, "orders/1", 9)]
        );
        assert_eq!(
            table.entries_for_hash(&txn, ReduceKeyHash::new(7)).unwrap().len(),
            2
        );
        assert_eq!(
            table.reduce_key_hashes(&txn).unwrap(),
            vec![ReduceKeyHash::new(7), ReduceKeyHash::new(9)]
        );
        assert_eq!(table.last_etag(&txn).unwrap(), Some(Etag::new(3)));
    }

    #[test]
    fn delete_removes_from_both_indexes() {
        let env = Environment::in_memory();
        let table = MapEntryTable::new("idx");
        let mut txn = env.write();
        table.create(&mut txn);
        table.insert(&mut txn, &entry(1, "orders/1", 7)).unwrap();

        assert!(table.delete(&mut txn, Etag::new(1)).unwrap());
        assert!(table.entries_for_document(&txn, &"orders/1".into()).unwrap().is_empty());
        assert!(table.reduce_key_hashes(&txn).unwrap().is_empty());
        assert!(table.is_empty(&txn));
        assert_eq!(table.last_etag(&txn).unwrap(), None);
    }

    #[test]
    fn etag_order_is_numeric() {
        let env = Environment::in_memory();
        let table = MapEntryTable::new("idx");
        let mut txn = env.write();
        table.create(&mut txn);
        for etag in [256, 2, 65_536] {
            table.insert(&mut txn, &entry(etag, "doc", 1)).unwrap();
        }
        let etags: Vec<_> = table
            .entries_for_document(&txn, &"doc".into())
            .unwrap()
            .into_iter()
            .map(|e| e.etag.as_u64())
            .collect();
        assert_eq!(etags, vec![2, 256, 65_536]);
    }
}
