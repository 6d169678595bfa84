//! Tables with secondary indexes.
//!
//! A table is a set of trees:
//!
//! - `{table}` maps primary key to the encoded row
//! - `{table}/{index}` maps `index value ++ primary key` to the primary key
//!
//! Variable-size index values are stored behind a big-endian `u32` length,
//! so no value's entries share a prefix with a longer value. Index entries
//! for one value are therefore contiguous and ordered by primary key, and a
//! seek starts at the value and stops at the first entry that no longer
//! carries it as a prefix.

use crate::env::WriteTransaction;
use crate::error::{StorageError, StorageResult};
use crate::tree::ReadView;
use std::collections::BTreeSet;

/// How an index column is sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Values of any length.
    Variable,
    /// Every value is exactly this many bytes.
    Fixed(usize),
}

/// A secondary index over one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    name: String,
    column: usize,
    kind: IndexKind,
}

impl IndexDef {
    /// Key prefix shared by every entry for `value`.
    fn prefix(&self, value: &[u8]) -> StorageResult<Vec<u8>> {
        match self.kind {
            IndexKind::Fixed(_) => Ok(value.to_vec()),
            IndexKind::Variable => {
                let len = u32::try_from(value.len())
                    .map_err(|_| StorageError::corrupted("index value too large"))?;
                Ok([len.to_be_bytes().as_slice(), value].concat())
            }
        }
    }

    fn entry(&self, value: &[u8], pk: &[u8]) -> StorageResult<Vec<u8>> {
        let mut entry = self.prefix(value)?;
        entry.extend_from_slice(pk);
        Ok(entry)
    }

    /// The indexed value carried by an entry.
    fn value<'e>(&self, entry: &'e [u8]) -> Option<&'e [u8]> {
        match self.kind {
            IndexKind::Fixed(size) => entry.get(..size),
            IndexKind::Variable => {
                let len = u32::from_be_bytes(entry.get(..4)?.try_into().ok()?) as usize;
                entry.get(4..4 + len)
            }
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexed column.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Column sizing.
    pub fn kind(&self) -> IndexKind {
        self.kind
    }
}

/// Layout of a table: its primary key column and secondary indexes.
///
/// ```
/// use autoreduce_storage::{Environment, TableSchema};
///
/// let schema = TableSchema::new("people", 0).with_index("by_city", 1);
/// let env = Environment::in_memory();
/// let mut txn = env.write();
/// schema.create(&mut txn);
/// schema.insert(&mut txn, &[b"1", b"Oslo"]).unwrap();
/// schema.insert(&mut txn, &[b"2", b"Oslo"]).unwrap();
/// assert_eq!(schema.seek_by_index(&txn, "by_city", b"Oslo").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    primary_key: usize,
    indexes: Vec<IndexDef>,
}

/// One decoded row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    columns: Vec<Vec<u8>>,
}

impl TableRow {
    /// Column bytes, or an empty slice for a column past the end.
    pub fn column(&self, index: usize) -> &[u8] {
        self.columns.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All columns.
    pub fn columns(&self) -> &[Vec<u8>] {
        &self.columns
    }

    fn encode(columns: &[&[u8]]) -> StorageResult<Vec<u8>> {
        let mut out = Vec::new();
        push_len(&mut out, columns.len())?;
        for column in columns {
            push_len(&mut out, column.len())?;
            out.extend_from_slice(column);
        }
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> StorageResult<Self> {
        let mut pos = 0;
        let count = read_len(bytes, &mut pos)?;
        let mut columns = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let len = read_len(bytes, &mut pos)?;
            let column = bytes
                .get(pos..pos + len)
                .ok_or_else(|| StorageError::corrupted("row column truncated"))?;
            columns.push(column.to_vec());
            pos += len;
        }
        Ok(Self { columns })
    }
}

fn push_len(out: &mut Vec<u8>, len: usize) -> StorageResult<()> {
    let len = u32::try_from(len).map_err(|_| StorageError::corrupted("row too large"))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn read_len(bytes: &[u8], pos: &mut usize) -> StorageResult<usize> {
    let b = bytes
        .get(*pos..*pos + 4)
        .ok_or_else(|| StorageError::corrupted("row header truncated"))?;
    *pos += 4;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
}

impl TableSchema {
    /// Start a schema whose primary key is `primary_key_column`.
    pub fn new(name: impl Into<String>, primary_key_column: usize) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key_column,
            indexes: Vec::new(),
        }
    }

    /// Add a secondary index over a variable-size column.
    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>, column: usize) -> Self {
        self.indexes.push(IndexDef {
            name: name.into(),
            column,
            kind: IndexKind::Variable,
        });
        self
    }

    /// Add a secondary index over a column of exactly `size` bytes.
    #[must_use]
    pub fn with_fixed_size_index(mut self, name: impl Into<String>, column: usize, size: usize) -> Self {
        self.indexes.push(IndexDef {
            name: name.into(),
            column,
            kind: IndexKind::Fixed(size),
        });
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Secondary indexes.
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    fn index_tree(&self, index: &IndexDef) -> String {
        format!("{}/{}", self.name, index.name)
    }

    fn index(&self, name: &str) -> StorageResult<&IndexDef> {
        self.indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| StorageError::IndexNotFound {
                table: self.name.clone(),
                index: name.to_string(),
            })
    }

    /// Create the table's trees. Idempotent.
    pub fn create(&self, txn: &mut WriteTransaction<'_>) {
        txn.create_tree(&self.name);
        for index in &self.indexes {
            txn.create_tree(&self.index_tree(index));
        }
    }

    /// Returns `true` if the table has been created.
    pub fn exists(&self, view: &(impl ReadView + ?Sized)) -> bool {
        view.tree_exists(&self.name)
    }

    /// Insert a row, updating every secondary index.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidRow`] if a referenced column is missing
    /// or a fixed-size column has the wrong length, and
    /// [`StorageError::DuplicateKey`] if the primary key is taken.
    pub fn insert(&self, txn: &mut WriteTransaction<'_>, row: &[&[u8]]) -> StorageResult<()> {
        let pk = *row.get(self.primary_key).ok_or_else(|| {
            StorageError::invalid_row(&self.name, "missing primary key column")
        })?;

        for index in &self.indexes {
            let value = row.get(index.column).ok_or_else(|| {
                StorageError::invalid_row(&self.name, format!("missing column for index '{}'", index.name))
            })?;
            if let IndexKind::Fixed(size) = index.kind {
                if value.len() != size {
                    return Err(StorageError::invalid_row(
                        &self.name,
                        format!(
                            "index '{}' expects {size} bytes, got {}",
                            index.name,
                            value.len()
                        ),
                    ));
                }
            }
        }

        if txn.get(&self.name, pk)?.is_some() {
            return Err(StorageError::DuplicateKey {
                table: self.name.clone(),
            });
        }

        txn.put(&self.name, pk, &TableRow::encode(row)?)?;
        for index in &self.indexes {
            let entry = index.entry(row[index.column], pk)?;
            txn.put(&self.index_tree(index), &entry, pk)?;
        }
        Ok(())
    }

    /// Load a row by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the row is corrupted.
    pub fn get(&self, view: &(impl ReadView + ?Sized), pk: &[u8]) -> StorageResult<Option<TableRow>> {
        view.get(&self.name, pk)?.map(TableRow::decode).transpose()
    }

    /// All rows whose indexed column equals `key`, in primary key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unknown or a referenced row is
    /// missing.
    pub fn seek_by_index(
        &self,
        view: &(impl ReadView + ?Sized),
        index: &str,
        key: &[u8],
    ) -> StorageResult<Vec<TableRow>> {
        let index = self.index(index)?;
        let prefix = index.prefix(key)?;
        let mut rows = Vec::new();

        for (entry, pk) in view.iter_from(&self.index_tree(index), &prefix)? {
            if !entry.starts_with(&prefix) {
                break;
            }
            let row = self.get(view, pk)?.ok_or_else(|| {
                StorageError::corrupted(format!(
                    "index '{}' of table '{}' points at a missing row",
                    index.name, self.name
                ))
            })?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Delete a row and its index entries. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist or the row is corrupted.
    pub fn delete_by_key(&self, txn: &mut WriteTransaction<'_>, pk: &[u8]) -> StorageResult<bool> {
        let Some(row) = self.get(&*txn, pk)? else {
            return Ok(false);
        };
        for index in &self.indexes {
            let entry = index.entry(row.column(index.column), pk)?;
            txn.delete(&self.index_tree(index), &entry)?;
        }
        txn.delete(&self.name, pk)
    }

    /// The greatest primary key in the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn last_primary_key(&self, view: &(impl ReadView + ?Sized)) -> StorageResult<Option<Vec<u8>>> {
        Ok(view.last(&self.name)?.map(|(pk, _)| pk.to_vec()))
    }

    /// Distinct values present in an index, in byte order.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is unknown.
    pub fn scan_index(&self, view: &(impl ReadView + ?Sized), index: &str) -> StorageResult<Vec<Vec<u8>>> {
        let index = self.index(index)?;
        let values: BTreeSet<Vec<u8>> = view
            .iter_from(&self.index_tree(index), &[])?
            .filter_map(|(entry, _)| index.value(entry))
            .map(<[u8]>::to_vec)
            .collect();
        Ok(values.into_iter().collect())
    }

    /// Number of rows.
    pub fn len(&self, view: &(impl ReadView + ?Sized)) -> usize {
        view.tree_len(&self.name)
    }

    /// Returns `true` if the table has no rows.
    pub fn is_empty(&self, view: &(impl ReadView + ?Sized)) -> bool {
        self.len(view) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use proptest::prelude::*;

    fn schema() -> TableSchema {
        TableSchema::new("rows", 0)
            .with_index("by_doc", 1)
            .with_fixed_size_index("by_hash", 2, 2)
    }

    fn pk(n: u64) -> [u8; 8] {
        n.to_be_bytes()
    }

    #[test]
    fn insert_and_seek() {
        let env = Environment::in_memory();
        let table = schema();
        let mut txn = env.write();
        table.create(&mut txn);

        table.insert(&mut txn, &[&pk(1), b"doc/a", b"h1"]).unwrap();
        table.insert(&mut txn, &[&pk(2), b"doc/ab", b"h1"]).unwrap();
        table.insert(&mut txn, &[&pk(3), b"doc/a", b"h2"]).unwrap();

        let rows = table.seek_by_index(&txn, "by_doc", b"doc/a").unwrap();
        let pks: Vec<_> = rows.iter().map(|r| r.column(0).to_vec()).collect();
        assert_eq!(pks, vec![pk(1).to_vec(), pk(3).to_vec()]);

        assert_eq!(table.seek_by_index(&txn, "by_hash", b"h1").unwrap().len(), 2);
        assert!(table.seek_by_index(&txn, "by_doc", b"doc/z").unwrap().is_empty());
        assert_eq!(table.len(&txn), 3);
    }

    #[test]
    fn seek_never_walks_longer_values() {
        let env = Environment::in_memory();
        let table = schema();
        let mut txn = env.write();
        table.create(&mut txn);
        for (n, doc) in [b"orders/1".as_slice(), b"orders/10", b"orders/1", b"orders/19", b"orders/2"]
            .into_iter()
            .enumerate()
        {
            table.insert(&mut txn, &[&pk(n as u64), doc, b"hh"]).unwrap();
        }

        let by_doc = &table.indexes()[0];
        let prefix = by_doc.prefix(b"orders/1").unwrap();
        let run: Vec<Vec<u8>> = txn
            .iter_from("rows/by_doc", &prefix)
            .unwrap()
            .take_while(|(entry, _)| entry.starts_with(&prefix))
            .map(|(_, pk)| pk.clone())
            .collect();
        assert_eq!(run, vec![pk(0).to_vec(), pk(2).to_vec()]);

        // The entry right after the run belongs to a different value.
        let (next, _) = txn.iter_from("rows/by_doc", &prefix).unwrap().nth(2).unwrap();
        assert_ne!(by_doc.value(next), Some(b"orders/1".as_slice()));
        assert_eq!(
            table.scan_index(&txn, "by_doc").unwrap(),
            vec![
                b"orders/1".to_vec(),
                b"orders/10".to_vec(),
                b"orders/19".to_vec(),
                b"orders/2".to_vec(),
            ]
        );
    }

    #[test]
    fn delete_removes_index_entries() {
        let env = Environment::in_memory();
        let table = schema();
        let mut txn = env.write();
        table.create(&mut txn);
        table.insert(&mut txn, &[&pk(1), b"doc", b"h1"]).unwrap();

        assert!(table.delete_by_key(&mut txn, &pk(1)).unwrap());
        assert!(!table.delete_by_key(&mut txn, &pk(1)).unwrap());
        assert!(table.seek_by_index(&txn, "by_doc", b"doc").unwrap().is_empty());
        assert!(table.scan_index(&txn, "by_hash").unwrap().is_empty());
        assert!(table.is_empty(&txn));
    }

    #[test]
    fn fixed_size_index_is_enforced() {
        let env = Environment::in_memory();
        let table = schema();
        let mut txn = env.write();
        table.create(&mut txn);

        assert!(matches!(
            table.insert(&mut txn, &[&pk(1), b"doc", b"toolong"]),
            Err(StorageError::InvalidRow { .. })
        ));
        assert!(matches!(
            table.insert(&mut txn, &[&pk(1), b"doc"]),
            Err(StorageError::InvalidRow { .. })
        ));
        assert!(table.is_empty(&txn));
    }

    #[test]
    fn duplicate_primary_key_is_rejected() {
        let env = Environment::in_memory();
        let table = schema();
        let mut txn = env.write();
        table.create(&mut txn);
        table.insert(&mut txn, &[&pk(1), b"doc", b"h1"]).unwrap();
        assert!(matches!(
            table.insert(&mut txn, &[&pk(1), b"other", b"h2"]),
            Err(StorageError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn scan_and_last_key() {
        let env = Environment::in_memory();
        let table = schema();
        let mut txn = env.write();
        table.create(&mut txn);
        assert_eq!(table.last_primary_key(&txn).unwrap(), None);

        for (n, hash) in [(5, b"h2"), (9, b"h1"), (7, b"h2")] {
            table.insert(&mut txn, &[&pk(n), b"doc", hash]).unwrap();
        }
        assert_eq!(table.last_primary_key(&txn).unwrap(), Some(pk(9).to_vec()));
        assert_eq!(
            table.scan_index(&txn, "by_hash").unwrap(),
            vec![b"h1".to_vec(), b"h2".to_vec()]
        );
        assert!(matches!(
            table.scan_index(&txn, "nope"),
            Err(StorageError::IndexNotFound { .. })
        ));
    }

    proptest! {
        #[test]
        fn seek_finds_exactly_matching_rows(docs in proptest::collection::vec("[ab]{1,3}", 1..24)) {
            let env = Environment::in_memory();
            let table = schema();
            let mut txn = env.write();
            table.create(&mut txn);
            for (n, doc) in docs.iter().enumerate() {
                table.insert(&mut txn, &[&pk(n as u64), doc.as_bytes(), b"hh"]).unwrap();
            }

            for doc in &docs {
                let expected: Vec<Vec<u8>> = docs
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| *d == doc)
                    .map(|(n, _)| pk(n as u64).to_vec())
                    .collect();
                let found: Vec<Vec<u8>> = table
                    .seek_by_index(&txn, "by_doc", doc.as_bytes())
                    .unwrap()
                    .iter()
                    .map(|r| r.column(0).to_vec())
                    .collect();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
