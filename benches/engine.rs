//! Sequential insert throughput on the clustered index, end to end
//! through `StorageEngine`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kvrelay::engine::StorageEngine;
use kvrelay::types::{Column, ColumnType, Row, Value};
use tempfile::tempdir;

fn setup_engine() -> (StorageEngine, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let mut engine = StorageEngine::open(dir.path()).unwrap();
    engine
        .create_table(
            "bench",
            vec![
                Column::new("id", ColumnType::Int, 0, false).unwrap(),
                Column::new("payload", ColumnType::Varchar, 64, false).unwrap(),
            ],
        )
        .unwrap();
    (engine, dir)
}

fn sequential_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_insert");

    for row_count in [100usize, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(row_count), &row_count, |b, &row_count| {
            b.iter_batched(
                setup_engine,
                |(engine, _dir)| {
                    let table = engine.get_table("bench").unwrap();
                    for i in 0..row_count as i32 {
                        table
                            .insert_row(&Row::new(vec![Value::Int(i), Value::Varchar("x".repeat(32))]))
                            .unwrap();
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, sequential_insert);
criterion_main!(benches);
