//! Behavioural properties of the map and delete executors.

use autoreduce_codec::Value;
use autoreduce_core::{
    AutoMapReduceIndexDefinition, Etag, FieldOperation, IndexField, ReduceKeyHash,
};
use autoreduce_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn hash_of(index: &TestIndex, category: &str) -> ReduceKeyHash {
    index
        .reduce_key_for(&Value::object([("Category", Value::from(category))]))
        .unwrap()
        .1
}

fn bucket_state(index: &TestIndex) -> BTreeMap<ReduceKeyHash, Vec<(Etag, Value)>> {
    index
        .reduce_key_hashes()
        .unwrap()
        .into_iter()
        .map(|hash| (hash, index.bucket_entries(hash).unwrap()))
        .collect()
}

#[test]
fn category_price_scenario() {
    let mut index = TestIndex::memory(
        AutoMapReduceIndexDefinition::new("by_category", "Orders")
            .with_map_field(IndexField::sum("Price").unwrap())
            .with_group_by(IndexField::group_by("Category").unwrap()),
    );
    index
        .apply([
            put("orders/1", order("A", 10)),
            put("orders/2", order("A", 5)),
        ])
        .unwrap();

    let hash = hash_of(&index, "A");
    let blobs = index.bucket_entries(hash).unwrap();
    assert_eq!(blobs.len(), 2);
    assert_ne!(blobs[0].0, blobs[1].0);
    assert_eq!(blobs[0].1, Value::object([("Price", Value::from(10))]));
    assert_eq!(blobs[1].1, Value::object([("Price", Value::from(5))]));

    index.apply([delete("orders/1")]).unwrap();

    let blobs = index.bucket_entries(hash).unwrap();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].1, Value::object([("Price", Value::from(5))]));
    assert_eq!(index.map_entry_count(), 1);
    assert_eq!(index.reduce_key_hashes().unwrap(), vec![hash]);
    assert_eq!(
        index.results.get(hash).unwrap().get("Price"),
        Some(&Value::from(5))
    );
}

#[test]
fn nested_paths_feed_the_map_step() {
    let definition = AutoMapReduceIndexDefinition::new("by_city", "People")
        .with_map_field(IndexField::new("Friends", "Friends,Name", FieldOperation::None).unwrap())
        .with_map_field(IndexField::sum("Groups,,N").unwrap())
        .with_group_by(IndexField::group_by("Address.City").unwrap());
    let mut index = TestIndex::memory(definition);

    let doc = Value::object([
        ("Address", Value::object([("City", Value::from("X"))])),
        (
            "Friends",
            Value::Array(vec![
                Value::object([("Name", Value::from("Joe"))]),
                Value::object([("Name", Value::from("John"))]),
            ]),
        ),
        (
            "Groups",
            Value::Array(vec![
                Value::Array(vec![
                    Value::object([("N", Value::from(1))]),
                    Value::object([("N", Value::from(2))]),
                ]),
                Value::Array(vec![Value::object([("N", Value::from(3))])]),
            ]),
        ),
    ]);
    index.apply([put("people/1", doc)]).unwrap();

    let (projection, hash) = index
        .reduce_key_for(&Value::object([(
            "Address",
            Value::object([("City", Value::from("X"))]),
        )]))
        .unwrap();
    assert_eq!(projection.get("Address.City"), Some(&Value::from("X")));

    let blobs = index.bucket_entries(hash).unwrap();
    assert_eq!(
        blobs[0].1.get("Friends"),
        Some(&Value::Array(vec![Value::from("Joe"), Value::from("John")]))
    );
    assert_eq!(
        blobs[0].1.get("Groups,,N"),
        Some(&Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)]))
    );
    let reduced = index.results.get(hash).unwrap();
    assert_eq!(reduced.get("Groups,,N"), Some(&Value::from(6)));
    assert_eq!(reduced.get("Address.City"), Some(&Value::from("X")));
}

#[test]
fn count_and_sum_fields_are_always_present() {
    let mut index = TestIndex::memory(orders_definition());
    index
        .apply([
            put("orders/1", Value::object([("Category", Value::from("A"))])),
            put("orders/2", Value::object([("Other", Value::from(true))])),
        ])
        .unwrap();

    for hash in index.reduce_key_hashes().unwrap() {
        for (_, blob) in index.bucket_entries(hash).unwrap() {
            assert_eq!(blob.get("Count"), Some(&Value::from(1)));
            assert_eq!(blob.get("Price"), Some(&Value::Null));
        }
    }
    // the document without a category groups under a null projection
    let (projection, _) = index
        .reduce_key_for(&Value::object([("Other", Value::from(true))]))
        .unwrap();
    assert_eq!(projection.get("Category"), Some(&Value::Null));
    assert_eq!(index.reduce_key_hashes().unwrap().len(), 2);
}

#[test]
fn replacing_a_document_moves_it_between_buckets() {
    let mut index = TestIndex::memory(orders_definition());
    index.apply([put("orders/1", order("A", 10))]).unwrap();
    let first = index.entries_for_document(&"orders/1".into()).unwrap();

    let mut writer = RecordingWriter::new();
    index
        .index
        .execute_batch([put("orders/1", order("B", 20))], &mut writer)
        .unwrap();

    let after = index.entries_for_document(&"orders/1".into()).unwrap();
    assert_eq!(after.len(), 1);
    assert!(after[0].etag > first[0].etag);
    assert_eq!(after[0].reduce_key_hash, hash_of(&index, "B"));
    assert!(index.bucket_entries(hash_of(&index, "A")).unwrap().is_empty());
    assert_eq!(writer.retracted(), vec![hash_of(&index, "A")]);
}

#[test]
fn replacing_within_one_bucket_keeps_one_blob() {
    let mut index = TestIndex::memory(orders_definition());
    index.apply([put("orders/1", order("A", 10))]).unwrap();
    index.apply([put("orders/1", order("A", 25))]).unwrap();

    let hash = hash_of(&index, "A");
    let blobs = index.bucket_entries(hash).unwrap();
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].0, Etag::new(2));
    assert_eq!(
        index.results.get(hash).unwrap().get("Price"),
        Some(&Value::from(25))
    );
}

#[test]
fn deleting_an_unknown_document_is_a_no_op() {
    let mut index = TestIndex::memory(orders_definition());
    let result = index.apply([delete("orders/404")]).unwrap();
    assert_eq!(result.entries_retracted, 0);
    assert_eq!(result.documents_deleted, 1);
    assert!(index.results.is_empty());
}

#[test]
fn readers_keep_the_previous_snapshot() {
    let mut index = TestIndex::memory(orders_definition());
    let before = index.env().read();
    index.apply([put("orders/1", order("A", 10))]).unwrap();

    let table = autoreduce_core::MapEntryTable::new(index.name());
    assert_eq!(table.len(&before), 0);
    assert_eq!(table.len(&index.env().read()), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn map_then_delete_restores_state(
        existing in batch_strategy(12),
        doc in order_strategy(),
    ) {
        let mut index = TestIndex::memory(orders_definition());
        index.apply(existing.iter().map(IndexOperation::to_item)).unwrap();
        let entries_before = index.map_entry_count();
        let buckets_before = bucket_state(&index);

        index.apply([put("fresh/1", doc)]).unwrap();
        index.apply([delete("fresh/1")]).unwrap();

        prop_assert_eq!(index.map_entry_count(), entries_before);
        prop_assert!(index.entries_for_document(&"fresh/1".into()).unwrap().is_empty());
        prop_assert_eq!(bucket_state(&index), buckets_before);
    }

    #[test]
    fn etags_strictly_increase(batches in batches_strategy(6, 8)) {
        let mut index = TestIndex::memory(orders_definition());
        let mut etags = Vec::new();
        for batch in &batches {
            etags.extend(index.apply(batch.iter().map(IndexOperation::to_item)).unwrap().etags);
        }
        prop_assert!(etags.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(etags.last().copied().unwrap_or_default(), index.last_etag());
    }

    #[test]
    fn index_matches_model(batches in batches_strategy(5, 10)) {
        let mut harness = IndexHarness::memory();
        for batch in &batches {
            harness.apply(batch).unwrap();
            harness.verify();
        }
    }
}
