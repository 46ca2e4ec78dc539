//! Performance benchmarks for intent grouping.
//!
//! Run with: `cargo bench --bench grouping`
//!
//! Rallying points are laid out along a few radial corridors around a town,
//! and intents pick random origin/destination pairs on them, so many intents
//! share pass-through points.

use std::sync::Arc;

use chrono::NaiveTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use tripmatch::{
    group_intents, GeoPoint, GroupingConfig, InMemoryCatalogue, IntentId, InterpolatingOracle,
    NoopProgress, RallyingPoint, RallyingPointRef, StraightLineRoutes, TravelIntent, UserId,
};

#[cfg(feature = "parallel")]
use tripmatch::group_intents_parallel;

const CORRIDORS: usize = 6;
const POINTS_PER_CORRIDOR: usize = 8;

/// Rallying points every ~2km along radial corridors.
fn corridor_points() -> Vec<RallyingPoint> {
    let center = GeoPoint::new(44.9285, 2.4433);
    let mut points = vec![RallyingPoint::new("c", "Center", center)];
    for c in 0..CORRIDORS {
        let bearing = (c as f64 * 360.0 / CORRIDORS as f64).to_radians();
        for k in 1..=POINTS_PER_CORRIDOR {
            let km = k as f64 * 2.0;
            let lat = center.lat + km / 111.0 * bearing.cos();
            let lng = center.lng + km / (111.0 * center.lat.to_radians().cos()) * bearing.sin();
            points.push(RallyingPoint::new(
                format!("r{}k{}", c, k),
                format!("Corridor {} km {}", c, km),
                GeoPoint::new(lat, lng),
            ));
        }
    }
    points
}

fn random_intents(points: &[RallyingPoint], count: usize) -> Vec<TravelIntent> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let from = rng.gen_range(0..points.len());
            let mut to = rng.gen_range(0..points.len());
            if to == from {
                to = (to + 1) % points.len();
            }
            TravelIntent {
                id: IntentId::new(format!("i{:05}", i)),
                user: UserId::new(format!("u{:05}", i)),
                from: RallyingPointRef::clone(&points[from].id),
                to: RallyingPointRef::clone(&points[to].id),
                earliest_departure: NaiveTime::from_hms_opt(7 + rng.gen_range(0..3), rng.gen_range(0..60), 0)
                    .unwrap_or_default(),
                latest_return: None,
            }
        })
        .collect()
}

fn bench_group_intents(c: &mut Criterion) {
    let points = corridor_points();
    let catalogue = Arc::new(InMemoryCatalogue::new(points.clone()));
    let oracle = InterpolatingOracle::new(StraightLineRoutes::default(), Arc::clone(&catalogue));
    let config = GroupingConfig::default();

    let mut group = c.benchmark_group("group_intents");
    group.sample_size(20);

    for count in [50, 200, 500] {
        let intents = random_intents(&points, count);

        group.bench_with_input(BenchmarkId::new("sequential", count), &intents, |b, intents| {
            b.iter(|| {
                group_intents(
                    black_box(intents),
                    catalogue.as_ref(),
                    &oracle,
                    &config,
                    &NoopProgress,
                )
            })
        });

        #[cfg(feature = "parallel")]
        group.bench_with_input(BenchmarkId::new("parallel", count), &intents, |b, intents| {
            b.iter(|| {
                group_intents_parallel(
                    black_box(intents),
                    catalogue.as_ref(),
                    &oracle,
                    &config,
                    &NoopProgress,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_group_intents);
criterion_main!(benches);
