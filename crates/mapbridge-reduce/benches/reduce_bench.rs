//! Performance benchmarks for position reduction
//!
//! Run with: cargo bench --package mapbridge-reduce

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mapbridge_core::config::ReducerConfig;
use mapbridge_core::types::{BoundingBox, Position, RouteCharacteristics};
use mapbridge_reduce::{filter_every_nth, filter_in_area, significant_indices, PositionReducer, ViewportSource};
use std::sync::Arc;

struct StaticViewport(u32);

impl ViewportSource for StaticViewport {
    fn zoom(&self) -> u32 {
        self.0
    }

    fn viewport(&self) -> Option<BoundingBox> {
        BoundingBox::new(47.5, 11.5, 47.0, 11.0)
    }
}

/// Wandering track around Munich
fn create_track(count: usize) -> Vec<Position> {
    (0..count)
        .map(|i| {
            let t = i as f64 / 50.0;
            Position::new(11.0 + t * 0.002 + t.sin() * 0.01, 47.0 + t * 0.001 + t.cos() * 0.01)
        })
        .collect()
}

fn bench_significance(c: &mut Criterion) {
    let mut group = c.benchmark_group("significance");

    for count in [1_000usize, 10_000, 50_000] {
        let track = create_track(count);
        group.bench_with_input(BenchmarkId::new("douglas_peucker", count), &track, |b, track| {
            b.iter(|| black_box(significant_indices(black_box(track), 10.0)));
        });
    }

    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    let track = create_track(50_000);
    let area = BoundingBox::new(47.3, 11.3, 47.1, 11.1).unwrap();

    group.bench_function("every_nth", |b| {
        b.iter(|| black_box(filter_every_nth(black_box(&track), 1750)));
    });

    group.bench_function("in_area", |b| {
        b.iter(|| black_box(filter_in_area(black_box(&track), &area, false)));
    });

    group.finish();
}

fn bench_reducer(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    let track = create_track(20_000);

    for zoom in [5u32, 12, 17] {
        group.bench_with_input(BenchmarkId::new("track_uncached", zoom), &zoom, |b, &zoom| {
            let reducer = PositionReducer::new(ReducerConfig::default(), Arc::new(StaticViewport(zoom)));
            b.iter(|| {
                reducer.clear_cache();
                black_box(reducer.reduce_for_render(&track, RouteCharacteristics::Track, false))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_significance, bench_sampling, bench_reducer);
criterion_main!(benches);
