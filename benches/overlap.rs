//! Performance benchmarks for route overlap truncation.
//!
//! Run with: `cargo bench --bench overlap`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use tripmatch::{find_crossings, truncate_overlapping_segments, GeoPoint, OverlapConfig, TripId, TripSegment};

/// A shared trunk road sampled every ~10m.
fn trunk(len: usize) -> Vec<GeoPoint> {
    (0..len)
        .map(|i| GeoPoint::new(44.90 + i as f64 * 0.0001, 2.44))
        .collect()
}

/// Routes joining the trunk at a random point, following it for a while and
/// leaving on their own branch.
fn synthetic_routes(count: usize, trunk_len: usize) -> Vec<TripSegment> {
    let road = trunk(trunk_len);
    let mut rng = rand::thread_rng();

    (0..count)
        .map(|i| {
            let start = rng.gen_range(0..trunk_len / 2);
            let end = rng.gen_range(start + 1..trunk_len);
            let branch_lng = 2.44 + (i + 1) as f64 * 0.0003;

            let mut coordinates: Vec<GeoPoint> = road[start..end].to_vec();
            let last = road[end - 1];
            coordinates.extend((1..50).map(|k| GeoPoint::new(last.lat, branch_lng + k as f64 * 0.0001)));

            TripSegment::new(TripId::new(format!("t{}", i)), coordinates)
        })
        .collect()
}

fn bench_truncate(c: &mut Criterion) {
    let config = OverlapConfig::default();
    let mut group = c.benchmark_group("truncate_overlapping_segments");

    for count in [10, 50, 200] {
        let routes = synthetic_routes(count, 2_000);
        group.bench_with_input(BenchmarkId::from_parameter(count), &routes, |b, routes| {
            b.iter(|| truncate_overlapping_segments(black_box(routes), &config))
        });
    }

    group.finish();
}

fn bench_crossings(c: &mut Criterion) {
    let config = OverlapConfig::default();
    let merged = truncate_overlapping_segments(&synthetic_routes(50, 2_000), &config);

    c.bench_function("find_crossings_50_routes", |b| {
        b.iter(|| find_crossings(black_box(&merged)))
    });
}

criterion_group!(benches, bench_truncate, bench_crossings);
criterion_main!(benches);
