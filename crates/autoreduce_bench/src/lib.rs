//! Benchmark utilities.

use autoreduce_codec::Value;
use autoreduce_core::{
    AutoMapReduceIndexDefinition, Document, IndexField, IndexItem,
};
use rand::Rng;

const CATEGORIES: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

/// Group by `Category`, sum `Price` and `Lines,Quantity`, count documents.
pub fn orders_definition() -> AutoMapReduceIndexDefinition {
    AutoMapReduceIndexDefinition::new("bench_orders", "Orders")
        .with_map_field(IndexField::sum("Price").expect("valid path"))
        .with_map_field(IndexField::sum("Lines,Quantity").expect("valid path"))
        .with_map_field(IndexField::count("Count").expect("valid path"))
        .with_group_by(IndexField::group_by("Category").expect("valid path"))
}

/// A random order with `lines` order lines.
pub fn random_order(rng: &mut impl Rng, lines: usize) -> Value {
    let lines: Vec<Value> = (0..lines)
        .map(|_| {
            Value::object([
                ("Product", Value::from(format!("products/{}", rng.gen_range(0..1_000)))),
                ("Quantity", Value::from(rng.gen_range(1i64..10))),
            ])
        })
        .collect();
    Value::object([
        ("Category", Value::from(CATEGORIES[rng.gen_range(0..CATEGORIES.len())])),
        ("Price", Value::from(rng.gen_range(1i64..10_000))),
        ("Lines", Value::Array(lines)),
    ])
}

/// `count` random orders keyed `orders/{offset + i}`.
pub fn generate_orders(count: usize, offset: usize, lines: usize) -> Vec<IndexItem> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            IndexItem::Put(Document::new(
                format!("orders/{}", offset + i),
                random_order(&mut rng, lines),
            ))
        })
        .collect()
}
