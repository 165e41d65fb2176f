//! R-tree benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sosi::common::GroupRef;
use sosi_spatial::{BoundingBox, SpatialIndex};
use std::hint::black_box;

fn grid_box(i: i64) -> BoundingBox {
    let x = (i % 100) as f64;
    let y = (i / 100) as f64;
    BoundingBox::new(x, y, x + 1.0, y + 1.0)
}

fn bench_rtree_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("SpatialIndex Insert");

    for fan_out in [3usize, 8, 16] {
        for size in [1000i64, 10000] {
            group.bench_with_input(
                BenchmarkId::new(format!("fan_out_{}", fan_out), size),
                &size,
                |b, &size| {
                    b.iter(|| {
                        let mut index = SpatialIndex::with_fan_out(fan_out).unwrap();
                        for i in 0..size {
                            index.insert(GroupRef::new(1, i), grid_box(i));
                        }
                        black_box(index.len())
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_rtree_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("SpatialIndex Query");

    let mut index = SpatialIndex::new();
    for i in 0..10000 {
        index.insert(GroupRef::new(1, i), grid_box(i));
    }

    group.bench_function("window_10k", |b| {
        b.iter(|| {
            let query = BoundingBox::new(25.0, 25.0, 75.0, 75.0);
            black_box(index.query(&query).count())
        });
    });

    group.bench_function("point_10k", |b| {
        b.iter(|| {
            let query = BoundingBox::new(42.5, 42.5, 42.5, 42.5);
            black_box(index.query(&query).count())
        });
    });

    group.finish();
}

fn bench_rtree_update(c: &mut Criterion) {
    let mut index = SpatialIndex::new();
    for i in 0..10000 {
        index.insert(GroupRef::new(1, i), grid_box(i));
    }

    c.bench_function("SpatialIndex Update 10k", |b| {
        let mut i = 0i64;
        b.iter(|| {
            let group = GroupRef::new(1, i % 10000);
            let bbox = grid_box((i * 7919) % 10000);
            black_box(index.index_group(group, Some(bbox)));
            i += 1;
        });
    });
}

criterion_group!(benches, bench_rtree_insert, bench_rtree_query, bench_rtree_update);
criterion_main!(benches);
