//! Auto map-reduce index: map and delete executors, batch runner, reload.

use crate::bucket::ReduceKeyBucket;
use crate::config::IndexConfig;
use crate::context::{ContextSummary, IndexingContext};
use crate::definition::{AutoMapReduceIndexDefinition, FieldOperation, IndexField};
use crate::error::{CoreError, CoreResult};
use crate::keys;
use crate::map_entries::MapEntryTable;
use crate::reduce::reduce_bucket;
use crate::stats::IndexStats;
use crate::types::{Document, DocumentKey, Etag, IndexItem, MapEntry, ReduceKeyHash};
use crate::writer::ResultWriter;
use autoreduce_codec::{from_cbor, to_canonical_cbor, Value};
use autoreduce_storage::{Environment, ReadView, WriteTransaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const META_DEFINITION: &[u8] = b"definition";
const META_LAST_ETAG: &[u8] = b"last_etag";

/// Outcome of one committed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Documents mapped.
    pub documents_mapped: usize,
    /// Tombstones processed.
    pub documents_deleted: usize,
    /// Map entries removed by deletes and replacements.
    pub entries_retracted: usize,
    /// Buckets reduced after the batch.
    pub buckets_reduced: usize,
    /// Etags allocated, in item order.
    pub etags: Vec<Etag>,
}

struct PendingBatch {
    result: BatchResult,
    summary: ContextSummary,
    reduced: Vec<(ReduceKeyHash, Option<Value>)>,
}

/// An automatic map-reduce index over one environment.
///
/// Writes go through [`execute_batch`](Self::execute_batch): one write
/// transaction per batch, items applied in order, everything rolled back if
/// any item fails. Readers see the last committed batch.
///
/// ```
/// use std::sync::Arc;
/// use autoreduce_codec::Value;
/// use autoreduce_core::{
///     AutoMapReduceIndex, AutoMapReduceIndexDefinition, Document, IndexConfig, IndexField,
///     IndexItem, InMemoryResultStore,
/// };
/// use autoreduce_storage::Environment;
///
/// let definition = AutoMapReduceIndexDefinition::new("orders_by_category", "Orders")
///     .with_map_field(IndexField::sum("Price").unwrap())
///     .with_group_by(IndexField::group_by("Category").unwrap());
/// let index = AutoMapReduceIndex::create_new(
///     Arc::new(Environment::in_memory()),
///     definition,
///     IndexConfig::default(),
/// )
/// .unwrap();
///
/// let doc = Value::object([("Category", Value::from("A")), ("Price", Value::from(10))]);
/// let mut results = InMemoryResultStore::new();
/// index
///     .execute_batch([IndexItem::Put(Document::new("orders/1", doc))], &mut results)
///     .unwrap();
/// assert_eq!(results.len(), 1);
/// ```
#[derive(Debug)]
pub struct AutoMapReduceIndex {
    env: Arc<Environment>,
    definition: AutoMapReduceIndexDefinition,
    config: IndexConfig,
    map_entries: MapEntryTable,
    last_etag: AtomicU64,
    stats: IndexStats,
}

impl AutoMapReduceIndex {
    /// Creates a new, empty index and persists its definition.
    ///
    /// # Errors
    ///
    /// Returns a definition error if the definition does not validate,
    /// [`CoreError::IndexAlreadyExists`] if the name is taken, or a storage
    /// error if the commit fails.
    pub fn create_new(
        env: Arc<Environment>,
        definition: AutoMapReduceIndexDefinition,
        config: IndexConfig,
    ) -> CoreResult<Self> {
        definition.validate()?;
        let name = definition.name().to_string();
        let meta = keys::meta_tree(&name);
        let map_entries = MapEntryTable::new(&name);

        let mut txn = env.write();
        if txn.tree_exists(&meta) {
            return Err(CoreError::IndexAlreadyExists { name });
        }
        txn.create_tree(&meta);
        txn.put(&meta, META_DEFINITION, &to_canonical_cbor(&definition.to_value())?)?;
        txn.put(&meta, META_LAST_ETAG, &keys::encode_etag(Etag::default()))?;
        txn.create_tree(&keys::reduce_keys_tree(&name));
        map_entries.create(&mut txn);
        commit(txn, config.sync_on_commit)?;

        info!(index = %name, collection = definition.collection(), "created index");

        Ok(Self {
            env,
            definition,
            config,
            map_entries,
            last_etag: AtomicU64::new(0),
            stats: IndexStats::new(),
        })
    }

    /// Opens an existing index, reloading its definition and last etag.
    ///
    /// The etag counter resumes from the larger of the persisted counter and
    /// the highest etag still present in the map entry table, so etags are
    /// never reused across restarts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexNotFound`] if no index has this name, or a
    /// format error if the stored definition is unreadable.
    pub fn open(env: Arc<Environment>, name: &str, config: IndexConfig) -> CoreResult<Self> {
        let view = env.read();
        let meta = keys::meta_tree(name);
        if !view.tree_exists(&meta) {
            return Err(CoreError::IndexNotFound {
                name: name.to_string(),
            });
        }

        let stored = view
            .get(&meta, META_DEFINITION)?
            .ok_or_else(|| CoreError::invalid_format(format!("index '{name}' has no definition")))?;
        let definition = AutoMapReduceIndexDefinition::from_value(&from_cbor(stored)?)?;
        if definition.name() != name {
            return Err(CoreError::invalid_format(format!(
                "index '{name}' stores definition for '{}'",
                definition.name()
            )));
        }

        let map_entries = MapEntryTable::new(name);
        let persisted = view
            .get(&meta, META_LAST_ETAG)?
            .map(keys::decode_etag)
            .transpose()?
            .unwrap_or_default();
        let last_etag = map_entries
            .last_etag(&view)?
            .map_or(persisted, |etag| etag.max(persisted));
        let buckets = view
            .tree_names_with_prefix(&keys::bucket_tree_prefix(name))
            .len();
        drop(view);

        info!(
            index = name,
            last_etag = last_etag.as_u64(),
            buckets,
            "opened index"
        );

        Ok(Self {
            env,
            definition,
            config,
            map_entries,
            last_etag: AtomicU64::new(last_etag.as_u64()),
            stats: IndexStats::new(),
        })
    }

    /// Index name.
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Index definition.
    pub fn definition(&self) -> &AutoMapReduceIndexDefinition {
        &self.definition
    }

    /// Index configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Counters for committed work.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// The environment the index lives in.
    pub fn env(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Highest etag allocated so far. `Etag(0)` for a fresh index.
    pub fn last_etag(&self) -> Etag {
        Etag::new(self.last_etag.load(Ordering::Acquire))
    }

    /// The group-by projection of `data` and its hash.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the projection cannot be encoded.
    pub fn reduce_key_for(&self, data: &Value) -> CoreResult<(Value, ReduceKeyHash)> {
        let projection = Value::object(
            self.definition
                .group_by_fields()
                .iter()
                .map(|field| (field.name(), read_or_null(data, field))),
        );
        let hash = keys::hash_reduce_key(&projection)?;
        Ok((projection, hash))
    }

    /// Maps one document into its bucket and records the map entry.
    ///
    /// Does not retract earlier entries for the same key; a replacement must
    /// call [`handle_delete`](Self::handle_delete) first. All writes go into
    /// the context's transaction, including the new last etag, so a
    /// committed context never leaves an etag that a reopen could hand out
    /// again.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a projection cannot be encoded,
    /// [`CoreError::EtagOverflow`] if etags are exhausted, or a storage error.
    pub fn handle_map(&self, document: &Document, ctx: &mut IndexingContext<'_, '_>) -> CoreResult<Etag> {
        let mapped = Value::object(self.definition.map_fields().iter().map(|field| {
            let value = match field.operation() {
                FieldOperation::Count => Value::Integer(1),
                FieldOperation::Sum | FieldOperation::None => read_or_null(&document.data, field),
            };
            (field.name(), value)
        }));
        let (projection, hash) = self.reduce_key_for(&document.data)?;
        let blob = to_canonical_cbor(&mapped)?;

        let etag = self.next_etag()?;
        ctx.put_mapped(hash, etag, &blob)?;
        ctx.txn()
            .put(&keys::meta_tree(self.name()), META_LAST_ETAG, &keys::encode_etag(etag))?;

        let reduce_keys = keys::reduce_keys_tree(self.name());
        let hash_key = keys::encode_hash(hash);
        if ctx.view().get(&reduce_keys, &hash_key)?.is_none() {
            ctx.txn()
                .put(&reduce_keys, &hash_key, &to_canonical_cbor(&projection)?)?;
        }

        self.map_entries.insert(
            ctx.txn(),
            &MapEntry {
                etag,
                document_key: document.key.clone(),
                reduce_key_hash: hash,
            },
        )?;

        trace!(
            index = self.name(),
            document = %document.key,
            etag = etag.as_u64(),
            hash = %hash,
            "mapped document"
        );
        Ok(etag)
    }

    /// Removes every contribution of `key`: bucket blobs first, then the map
    /// entry rows. Each affected hash is marked for retraction, and a bucket
    /// left empty loses its recorded group-by projection.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error or a format error for a malformed row.
    pub fn handle_delete(&self, key: &DocumentKey, ctx: &mut IndexingContext<'_, '_>) -> CoreResult<usize> {
        let entries = self.map_entries.entries_for_document(ctx.view(), key)?;
        for entry in &entries {
            ctx.delete_mapped(entry.reduce_key_hash, entry.etag)?;
            ctx.retract(entry.reduce_key_hash);
            if ctx.bucket_is_empty(entry.reduce_key_hash) {
                ctx.txn().delete(
                    &keys::reduce_keys_tree(self.name()),
                    &keys::encode_hash(entry.reduce_key_hash),
                )?;
            }
            self.map_entries.delete(ctx.txn(), entry.etag)?;
            trace!(
                index = self.name(),
                document = %key,
                etag = entry.etag.as_u64(),
                hash = %entry.reduce_key_hash,
                "retracted entry"
            );
        }
        Ok(entries.len())
    }

    /// Applies a batch of puts and deletes in one transaction.
    ///
    /// A put first retracts the document's previous entries, then maps it.
    /// After the commit, retractions and (when `reduce_after_batch` is set)
    /// reduced results for every touched bucket are sent to `writer`.
    ///
    /// On failure nothing is committed, the etag counter is restored and the
    /// writer is not called.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for an oversized batch,
    /// [`CoreError::DocumentFailed`] naming the first item that failed, or
    /// the error of the reduce step, commit, or writer.
    pub fn execute_batch<I>(&self, items: I, writer: &mut dyn ResultWriter) -> CoreResult<BatchResult>
    where
        I: IntoIterator<Item = IndexItem>,
    {
        let items: Vec<IndexItem> = items.into_iter().collect();
        if items.len() > self.config.max_batch_size {
            return Err(CoreError::invalid_operation(format!(
                "batch of {} items exceeds max_batch_size {}",
                items.len(),
                self.config.max_batch_size
            )));
        }

        let mut txn = self.env.write();
        let start = self.last_etag();
        let pending = match self.run_batch(&mut txn, &items) {
            Ok(pending) => pending,
            Err(error) => return Err(self.abandon(txn, start, error)),
        };
        // Etags handed out by a failed commit stay burned; the writer lock is
        // gone by then and another batch may already have moved the counter.
        if let Err(error) = commit(txn, self.config.sync_on_commit) {
            self.stats.record_batch_failed();
            warn!(index = self.name(), error = %error, "batch commit failed");
            return Err(error);
        }

        let PendingBatch {
            mut result,
            summary,
            reduced,
        } = pending;
        result.buckets_reduced = reduced.len();
        self.record_committed(&result);

        debug!(
            index = self.name(),
            items = items.len(),
            first_etag = result.etags.first().map(|etag| etag.as_u64()),
            last_etag = result.etags.last().map(|etag| etag.as_u64()),
            retracted = summary.retracted.len(),
            reduced = reduced.len(),
            "batch committed"
        );

        for hash in &summary.retracted {
            writer.retract(*hash)?;
        }
        for (hash, output) in &reduced {
            match output {
                Some(value) => writer.write(*hash, value)?,
                None if !summary.retracted.contains(hash) => writer.retract(*hash)?,
                None => {}
            }
        }
        Ok(result)
    }

    /// Reduces every non-empty bucket and writes the results.
    ///
    /// Returns the number of buckets written.
    ///
    /// # Errors
    ///
    /// Returns a storage, format, or aggregation error, or the writer's error.
    pub fn reduce_all(&self, writer: &mut dyn ResultWriter) -> CoreResult<usize> {
        let view = self.env.read();
        let mut written = 0;
        for hash in self.map_entries.reduce_key_hashes(&view)? {
            if let Some(output) = self.reduce_hash(&view, hash)? {
                writer.write(hash, &output)?;
                written += 1;
            }
        }
        self.stats.record_reduced(written as u64);
        debug!(index = self.name(), buckets = written, "reduced all buckets");
        Ok(written)
    }

    /// Committed map entries of one document, in etag order.
    ///
    /// # Errors
    ///
    /// Returns a storage or format error.
    pub fn entries_for_document(&self, key: &DocumentKey) -> CoreResult<Vec<MapEntry>> {
        self.map_entries.entries_for_document(&self.env.read(), key)
    }

    /// Committed blobs of one bucket, in etag order.
    ///
    /// # Errors
    ///
    /// Returns a storage or format error.
    pub fn bucket_entries(&self, hash: ReduceKeyHash) -> CoreResult<Vec<(Etag, Value)>> {
        ReduceKeyBucket::new(self.name(), hash).entries(&self.env.read())
    }

    /// Group-by projection recorded for `hash`.
    ///
    /// # Errors
    ///
    /// Returns a storage or codec error.
    pub fn reduce_key(&self, hash: ReduceKeyHash) -> CoreResult<Option<Value>> {
        self.group_key(&self.env.read(), hash)
    }

    /// Distinct hashes that currently have map entries.
    ///
    /// # Errors
    ///
    /// Returns a storage or format error.
    pub fn reduce_key_hashes(&self) -> CoreResult<Vec<ReduceKeyHash>> {
        self.map_entries.reduce_key_hashes(&self.env.read())
    }

    /// Number of bucket trees, including emptied ones.
    pub fn bucket_count(&self) -> usize {
        self.env
            .read()
            .tree_names_with_prefix(&keys::bucket_tree_prefix(self.name()))
            .len()
    }

    /// Number of committed map entries.
    pub fn map_entry_count(&self) -> usize {
        self.map_entries.len(&self.env.read())
    }

    fn next_etag(&self) -> CoreResult<Etag> {
        let next = self.last_etag().next().ok_or(CoreError::EtagOverflow)?;
        self.last_etag.store(next.as_u64(), Ordering::Release);
        Ok(next)
    }

    fn run_batch(&self, txn: &mut WriteTransaction<'_>, items: &[IndexItem]) -> CoreResult<PendingBatch> {
        let mut result = BatchResult::default();
        let mut ctx = IndexingContext::new(txn, self.name());

        for item in items {
            self.apply_item(item, &mut ctx, &mut result)
                .map_err(|source| CoreError::DocumentFailed {
                    index: self.name().to_string(),
                    document_key: item.key().to_string(),
                    source: Box::new(source),
                })?;
        }

        let mut reduced = Vec::new();
        if self.config.reduce_after_batch {
            for hash in ctx.touched() {
                reduced.push((*hash, self.reduce_hash(ctx.view(), *hash)?));
            }
        }
        let summary = ctx.finish();

        Ok(PendingBatch {
            result,
            summary,
            reduced,
        })
    }

    fn apply_item(
        &self,
        item: &IndexItem,
        ctx: &mut IndexingContext<'_, '_>,
        result: &mut BatchResult,
    ) -> CoreResult<()> {
        match item {
            IndexItem::Put(document) => {
                result.entries_retracted += self.handle_delete(&document.key, ctx)?;
                result.etags.push(self.handle_map(document, ctx)?);
                result.documents_mapped += 1;
            }
            IndexItem::Delete(tombstone) => {
                result.entries_retracted += self.handle_delete(&tombstone.key, ctx)?;
                result.documents_deleted += 1;
            }
        }
        Ok(())
    }

    fn reduce_hash(&self, view: &(impl ReadView + ?Sized), hash: ReduceKeyHash) -> CoreResult<Option<Value>> {
        let blobs = ReduceKeyBucket::new(self.name(), hash).entries(view)?;
        let group_key = self.group_key(view, hash)?;
        reduce_bucket(
            &self.definition,
            group_key.as_ref(),
            blobs.iter().map(|(_, blob)| blob),
        )
    }

    fn group_key(&self, view: &(impl ReadView + ?Sized), hash: ReduceKeyHash) -> CoreResult<Option<Value>> {
        let stored = view.get(&keys::reduce_keys_tree(self.name()), &keys::encode_hash(hash))?;
        Ok(stored.map(from_cbor).transpose()?)
    }

    fn abandon(&self, txn: WriteTransaction<'_>, start: Etag, error: CoreError) -> CoreError {
        self.last_etag.store(start.as_u64(), Ordering::Release);
        drop(txn);
        self.stats.record_batch_failed();

        match &error {
            CoreError::DocumentFailed {
                document_key,
                source,
                ..
            } => warn!(
                index = self.name(),
                document = %document_key,
                error = %source,
                "document failed, batch rolled back"
            ),
            other => warn!(index = self.name(), error = %other, "batch rolled back"),
        }
        error
    }

    fn record_committed(&self, result: &BatchResult) {
        self.stats.record_batch_committed();
        self.stats.record_mapped(result.documents_mapped as u64);
        self.stats.record_deleted(result.documents_deleted as u64);
        self.stats.record_retracted(result.entries_retracted as u64);
        self.stats.record_reduced(result.buckets_reduced as u64);
    }
}

fn read_or_null(data: &Value, field: &IndexField) -> Value {
    field
        .path()
        .read(data)
        .map_or(Value::Null, |found| found.to_value())
}

fn commit(txn: WriteTransaction<'_>, sync: bool) -> CoreResult<()> {
    if sync {
        txn.commit_and_sync()?;
    } else {
        txn.commit()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::InMemoryResultStore;

    fn definition() -> AutoMapReduceIndexDefinition {
        AutoMapReduceIndexDefinition::new("orders", "Orders")
            .with_map_field(IndexField::sum("Price").unwrap())
            .with_map_field(IndexField::count("Count").unwrap())
            .with_group_by(IndexField::group_by("Category").unwrap())
    }

    fn order(key: &str, category: &str, price: i64) -> IndexItem {
        IndexItem::Put(Document::new(
            key,
            Value::object([("Category", Value::from(category)), ("Price", Value::from(price))]),
        ))
    }

    fn index() -> AutoMapReduceIndex {
        AutoMapReduceIndex::create_new(
            Arc::new(Environment::in_memory()),
            definition(),
            IndexConfig::default().sync_on_commit(false),
        )
        .unwrap()
    }

    #[test]
    fn create_twice_fails() {
        let env = Arc::new(Environment::in_memory());
        AutoMapReduceIndex::create_new(Arc::clone(&env), definition(), IndexConfig::default()).unwrap();
        assert!(matches!(
            AutoMapReduceIndex::create_new(env, definition(), IndexConfig::default()),
            Err(CoreError::IndexAlreadyExists { .. })
        ));
    }

    #[test]
    fn open_missing_index_fails() {
        assert!(matches!(
            AutoMapReduceIndex::open(Arc::new(Environment::in_memory()), "nope", IndexConfig::default()),
            Err(CoreError::IndexNotFound { name }) if name == "nope"
        ));
    }

    #[test]
    fn mapped_blob_has_every_aggregation_field() {
        let index = index();
        let mut results = InMemoryResultStore::new();
        let item = IndexItem::Put(Document::new(
            "orders/1",
            Value::object([("Category", Value::from("A"))]),
        ));
        index.execute_batch([item], &mut results).unwrap();

        let hash = index.reduce_key_hashes().unwrap()[0];
        let entries = index.bucket_entries(hash).unwrap();
        let (_, blob) = &entries[0];
        assert_eq!(blob.get("Price"), Some(&Value::Null));
        assert_eq!(blob.get("Count"), Some(&Value::from(1)));
        assert_eq!(blob.get("Category"), None);
    }

    #[test]
    fn batch_reduces_touched_buckets() {
        let index = index();
        let mut results = InMemoryResultStore::new();
        let outcome = index
            .execute_batch(
                [order("orders/1", "A", 10), order("orders/2", "A", 5), order("orders/3", "B", 1)],
                &mut results,
            )
            .unwrap();
        assert_eq!(outcome.documents_mapped, 3);
        assert_eq!(outcome.buckets_reduced, 2);
        assert_eq!(outcome.etags, vec![Etag::new(1), Etag::new(2), Etag::new(3)]);

        let (_, hash_a) = index
            .reduce_key_for(&Value::object([("Category", Value::from("A"))]))
            .unwrap();
        let reduced = results.get(hash_a).unwrap();
        assert_eq!(reduced.get("Category"), Some(&Value::from("A")));
        assert_eq!(reduced.get("Price"), Some(&Value::from(15)));
        assert_eq!(reduced.get("Count"), Some(&Value::from(2)));
    }

    #[test]
    fn emptied_bucket_is_retracted() {
        let index = index();
        let mut results = InMemoryResultStore::new();
        index.execute_batch([order("orders/1", "A", 10)], &mut results).unwrap();
        assert_eq!(results.len(), 1);

        index
            .execute_batch([IndexItem::Delete(crate::types::Tombstone::new("orders/1"))], &mut results)
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(index.map_entry_count(), 0);
        assert_eq!(index.bucket_count(), 1);
    }

    #[test]
    fn emptied_bucket_forgets_its_reduce_key_without_reducing() {
        let index = AutoMapReduceIndex::create_new(
            Arc::new(Environment::in_memory()),
            definition(),
            IndexConfig::default().sync_on_commit(false).reduce_after_batch(false),
        )
        .unwrap();
        let mut results = InMemoryResultStore::new();
        index
            .execute_batch([order("orders/1", "A", 10), order("orders/2", "B", 3)], &mut results)
            .unwrap();
        let (_, hash_a) = index
            .reduce_key_for(&Value::object([("Category", Value::from("A"))]))
            .unwrap();
        assert!(index.reduce_key(hash_a).unwrap().is_some());

        index
            .execute_batch([IndexItem::Delete(crate::types::Tombstone::new("orders/1"))], &mut results)
            .unwrap();
        assert_eq!(index.reduce_key(hash_a).unwrap(), None);
        assert_eq!(index.env().read().tree_len(&keys::reduce_keys_tree("orders")), 1);

        // Refilled within one batch: the projection is recorded again.
        index
            .execute_batch(
                [
                    order("orders/3", "A", 4),
                    IndexItem::Delete(crate::types::Tombstone::new("orders/2")),
                ],
                &mut results,
            )
            .unwrap();
        assert_eq!(
            index.reduce_key(hash_a).unwrap(),
            Some(Value::object([("Category", Value::from("A"))]))
        );
        assert_eq!(index.env().read().tree_len(&keys::reduce_keys_tree("orders")), 1);
        assert!(results.is_empty());
    }

    #[test]
    fn manually_driven_context_persists_the_last_etag() {
        let backend = autoreduce_storage::InMemoryBackend::new();
        let env = Arc::new(Environment::open(Box::new(backend.clone())).unwrap());
        let index = AutoMapReduceIndex::create_new(env, definition(), IndexConfig::default()).unwrap();

        let document = Document::new(
            "orders/1",
            Value::object([("Category", Value::from("A")), ("Price", Value::from(10))]),
        );
        let mut txn = index.env().write();
        let mut ctx = IndexingContext::new(&mut txn, index.name());
        assert_eq!(index.handle_map(&document, &mut ctx).unwrap(), Etag::new(1));
        assert_eq!(index.handle_delete(&document.key, &mut ctx).unwrap(), 1);
        drop(ctx);
        txn.commit().unwrap();
        drop(index);

        let env = Arc::new(Environment::open(Box::new(backend)).unwrap());
        let index = AutoMapReduceIndex::open(env, "orders", IndexConfig::default()).unwrap();
        assert_eq!(index.last_etag(), Etag::new(1));

        let mut results = InMemoryResultStore::new();
        let outcome = index.execute_batch([order("orders/2", "A", 5)], &mut results).unwrap();
        assert_eq!(outcome.etags, vec![Etag::new(2)]);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let index = AutoMapReduceIndex::create_new(
            Arc::new(Environment::in_memory()),
            definition(),
            IndexConfig::default().max_batch_size(1),
        )
        .unwrap();
        let mut results = InMemoryResultStore::new();
        assert!(matches!(
            index.execute_batch([order("a", "A", 1), order("b", "A", 1)], &mut results),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert_eq!(index.last_etag(), Etag::new(0));
    }

    #[test]
    fn stats_count_committed_work_only() {
        let index = index();
        let mut results = InMemoryResultStore::new();
        index
            .execute_batch([order("orders/1", "A", 10), order("orders/1", "B", 10)], &mut results)
            .unwrap();
        index
            .execute_batch(
                [
                    IndexItem::Delete(crate::types::Tombstone::new("orders/1")),
                    IndexItem::Delete(crate::types::Tombstone::new("orders/9")),
                ],
                &mut results,
            )
            .unwrap();

        let stats = index.stats().snapshot();
        assert_eq!(stats.documents_mapped, 2);
        assert_eq!(stats.documents_deleted, 2);
        assert_eq!(stats.entries_retracted, 2);
        assert_eq!(stats.batches_committed, 2);
        assert_eq!(stats.batches_failed, 0);
    }
}
