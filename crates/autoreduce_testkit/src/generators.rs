//! Property-based test generators using proptest.
//!
//! Provides strategies for documents and batches shaped like the orders
//! fixture, plus arbitrary nested values for codec and traversal tests.

use crate::fixtures::{delete, put};
use autoreduce_codec::Value;
use autoreduce_core::IndexItem;
use proptest::prelude::*;

/// Strategy for a small set of category names, so groups collide often.
pub fn category_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-D]").expect("Invalid regex")
}

/// Strategy for document keys drawn from a small key space.
pub fn document_key_strategy() -> impl Strategy<Value = String> {
    (0u8..16).prop_map(|n| format!("orders/{n}"))
}

/// Strategy for order documents. `Price` is sometimes missing, and
/// `Category` is sometimes missing so that the null group is exercised.
pub fn order_strategy() -> impl Strategy<Value = Value> {
    (
        prop::option::weighted(0.9, category_strategy()),
        prop::option::weighted(0.8, -1_000i64..1_000),
    )
        .prop_map(|(category, price)| {
            let mut fields = Vec::new();
            if let Some(category) = category {
                fields.push(("Category", Value::from(category)));
            }
            if let Some(price) = price {
                fields.push(("Price", Value::from(price)));
            }
            Value::object(fields)
        })
}

/// One change applied to the index.
#[derive(Debug, Clone)]
pub enum IndexOperation {
    /// Insert or replace a document.
    Put {
        /// Document key
        key: String,
        /// Document body
        data: Value,
    },
    /// Delete a document.
    Delete {
        /// Document key
        key: String,
    },
}

impl IndexOperation {
    /// Key of the document this operation touches.
    pub fn key(&self) -> &str {
        match self {
            IndexOperation::Put { key, .. } | IndexOperation::Delete { key } => key,
        }
    }

    /// The batch item for this operation.
    pub fn to_item(&self) -> IndexItem {
        match self {
            IndexOperation::Put { key, data } => put(key, data.clone()),
            IndexOperation::Delete { key } => delete(key),
        }
    }
}

/// Strategy for a single operation; puts are three times as likely as deletes.
pub fn operation_strategy() -> impl Strategy<Value = IndexOperation> {
    prop_oneof![
        3 => (document_key_strategy(), order_strategy())
            .prop_map(|(key, data)| IndexOperation::Put { key, data }),
        1 => document_key_strategy().prop_map(|key| IndexOperation::Delete { key }),
    ]
}

/// Strategy for a batch of up to `max_len` operations.
pub fn batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<IndexOperation>> {
    prop::collection::vec(operation_strategy(), 1..=max_len)
}

/// Strategy for a sequence of batches.
pub fn batches_strategy(max_batches: usize, max_len: usize) -> impl Strategy<Value = Vec<Vec<IndexOperation>>> {
    prop::collection::vec(batch_strategy(max_len), 1..=max_batches)
}

/// Strategy for arbitrary nested values without floats.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        "[a-z]{0,8}".prop_map(Value::Text),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(|fields| {
                let mut fields = fields;
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                fields.dedup_by(|a, b| a.0 == b.0);
                Value::object(fields)
            }),
        ]
    })
}
