//! Field path traversal benchmarks.

use autoreduce_bench::random_order;
use autoreduce_codec::{read, to_canonical_cbor, FieldPath, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Benchmark reading scalar and flattened paths.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let mut rng = rand::thread_rng();
    let doc = random_order(&mut rng, 16);

    let scalar = FieldPath::parse("Category").unwrap();
    group.bench_function("scalar", |b| {
        b.iter(|| black_box(read(black_box(&doc), &scalar)).is_some());
    });

    let missing = FieldPath::parse("Customer.Address.City").unwrap();
    group.bench_function("missing", |b| {
        b.iter(|| black_box(read(black_box(&doc), &missing)).is_none());
    });

    let lines = FieldPath::parse("Lines,Quantity").unwrap();
    group.bench_function("flatten_lines_16", |b| {
        b.iter(|| {
            let count = read(black_box(&doc), &lines)
                .map(|found| found.to_value())
                .and_then(|value| value.as_array().map(<[Value]>::len));
            black_box(count)
        });
    });

    group.finish();
}

/// Benchmark flattening across growing arrays of arrays.
fn bench_double_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("double_flatten");
    let path = FieldPath::parse("Groups,,N").unwrap();

    for width in [4usize, 16, 64] {
        let groups: Vec<Value> = (0..width)
            .map(|i| {
                Value::Array(
                    (0..width)
                        .map(|j| Value::object([("N", Value::from((i * width + j) as i64))]))
                        .collect(),
                )
            })
            .collect();
        let doc = Value::object([("Groups", Value::Array(groups))]);

        group.throughput(Throughput::Elements((width * width) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &doc, |b, doc| {
            b.iter(|| black_box(read(doc, &path).map(|found| found.to_value())));
        });
    }

    group.finish();
}

/// Benchmark encoding a group-by projection, the input to hashing.
fn bench_projection_encode(c: &mut Criterion) {
    let projection = Value::object([
        ("Category", Value::from("Electronics")),
        ("Region", Value::from("EU")),
    ]);
    c.bench_function("encode_projection", |b| {
        b.iter(|| black_box(to_canonical_cbor(black_box(&projection)).unwrap()));
    });
}

criterion_group!(benches, bench_read, bench_double_flatten, bench_projection_encode);
criterion_main!(benches);
