//! Benchmarks for parameter and result block handling.

#![allow(clippy::unwrap_used, missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use ibpp_protocol::info::db;
use ibpp_protocol::tags::{dpb, tpb};
use ibpp_protocol::{Dpb, ParamBlock, ResultBlock, Tpb};

/// Benchmark building a typical attach block.
fn bench_dpb_build(c: &mut Criterion) {
    c.bench_function("dpb_build", |b| {
        b.iter(|| {
            let mut block = ParamBlock::<Dpb>::new();
            block.insert_str(dpb::USER_NAME, "SYSDBA").unwrap();
            block.insert_str(dpb::PASSWORD, "masterkey").unwrap();
            block.insert_str(dpb::SQL_ROLE_NAME, "RDB$ADMIN").unwrap();
            block.insert_str(dpb::LC_CTYPE, "UTF8").unwrap();
            black_box(block)
        })
    });
}

/// Benchmark building a transaction block with reservations.
fn bench_tpb_build(c: &mut Criterion) {
    c.bench_function("tpb_build", |b| {
        b.iter(|| {
            let mut block = ParamBlock::<Tpb>::new();
            block.insert(tpb::WRITE);
            block.insert(tpb::CONCURRENCY);
            block.insert(tpb::WAIT);
            for table in ["CUSTOMERS", "ORDERS", "ITEMS"] {
                block.insert(tpb::LOCK_WRITE);
                block.insert_str(table).unwrap();
                block.insert(tpb::PROTECTED);
            }
            black_box(block)
        })
    });
}

/// Benchmark looking up the last field of a database info answer.
fn bench_result_block_lookup(c: &mut Criterion) {
    let block = ResultBlock::builder()
        .int(db::ODS_VERSION, 11)
        .int(db::ODS_MINOR_VERSION, 2)
        .int(db::PAGE_SIZE, 8192)
        .int(db::ALLOCATION, 1200)
        .int(db::NUM_BUFFERS, 2048)
        .int(db::SWEEP_INTERVAL, 20000)
        .counts(db::INSERT_COUNT, &[(128, 3), (129, 44), (130, 7)])
        .int(db::SQL_DIALECT, 3)
        .build();

    c.bench_function("result_block_lookup", |b| {
        b.iter(|| black_box(block.get_value(db::SQL_DIALECT).unwrap()))
    });

    c.bench_function("result_block_count_value", |b| {
        b.iter(|| black_box(block.get_count_value(db::INSERT_COUNT).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_dpb_build,
    bench_tpb_build,
    bench_result_block_lookup
);
criterion_main!(benches);
