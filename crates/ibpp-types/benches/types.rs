//! Benchmarks for cell encoding and decoding.

#![allow(clippy::unwrap_used, missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use ibpp_protocol::SqlType;
use ibpp_types::{NativeType, Timestamp, TypeInfo, Value, decode_value, encode_value};
use std::hint::black_box;

/// Benchmark NUMERIC encoding (double scaled into a 64-bit cell).
fn bench_numeric_encode(c: &mut Criterion) {
    let info = TypeInfo::column(SqlType::Int64, 8, -4);
    let mut cell = info.blank();
    let value = Value::Double(12_345.678_9);

    c.bench_function("numeric_encode", |b| {
        b.iter(|| {
            encode_value(&info, black_box(&value), &mut cell).unwrap();
            black_box(&cell);
        })
    });
}

/// Benchmark NUMERIC decoding back to a double.
fn bench_numeric_decode(c: &mut Criterion) {
    let info = TypeInfo::column(SqlType::Int64, 8, -4);
    let cell = 123_456_789i64.to_le_bytes();

    c.bench_function("numeric_decode", |b| {
        b.iter(|| black_box(decode_value(&info, black_box(&cell), NativeType::Double).unwrap()))
    });
}

/// Benchmark text encoding into fixed and variable width cells.
fn bench_text_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_encode");
    let value = Value::String("This is a typical database column value".into());

    let fixed = TypeInfo::column(SqlType::Text, 64, 0);
    let mut fixed_cell = fixed.blank();
    group.bench_function("char", |b| {
        b.iter(|| encode_value(&fixed, black_box(&value), &mut fixed_cell).unwrap())
    });

    let varying = TypeInfo::column(SqlType::Varying, 64, 0);
    let mut varying_cell = varying.blank();
    group.bench_function("varchar", |b| {
        b.iter(|| encode_value(&varying, black_box(&value), &mut varying_cell).unwrap())
    });

    group.finish();
}

/// Benchmark timestamp decoding.
fn bench_timestamp_decode(c: &mut Criterion) {
    let info = TypeInfo::column(SqlType::Timestamp, 8, 0);
    let ts = Timestamp::from_parts(2024, 6, 30, 12, 0, 0, 0).unwrap();
    let mut cell = info.blank();
    encode_value(&info, &Value::Timestamp(ts), &mut cell).unwrap();

    c.bench_function("timestamp_decode", |b| {
        b.iter(|| black_box(decode_value(&info, black_box(&cell), NativeType::Timestamp).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_numeric_encode,
    bench_numeric_decode,
    bench_text_encode,
    bench_timestamp_decode
);
criterion_main!(benches);
