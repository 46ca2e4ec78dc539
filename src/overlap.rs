//! Route overlap truncation for rendering.
//!
//! Trips sharing a road share its sampled coordinates, so overlap is detected
//! by coordinate equality (quantized by [`OverlapConfig::coordinate_precision`]),
//! not geometric proximity.
//!
//! Truncation runs in two passes over the input, in order:
//! 1. Collect the owning trips of every coordinate
//! 2. Walk each input polyline, emitting every coordinate the first time it is
//!    seen; a run is cut where a coordinate was already emitted and split
//!    where its owner set changes
//!
//! Every output segment is a contiguous subrange of exactly one input
//! polyline, and every (coordinate, trip) pair of the input is carried by
//! exactly one output segment.

use std::collections::{BTreeSet, HashMap, HashSet};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::geo_utils::{bounds_overlap, compute_bounds, segments_intersect};
use crate::{Bounds, GeoPoint, TripId};

/// Configuration for overlap truncation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapConfig {
    /// Coordinates closer than this on both axes are the same point (degrees).
    /// Default: 1e-7 (about 1 cm)
    pub coordinate_precision: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            coordinate_precision: 1e-7,
        }
    }
}

/// A polyline and the trips whose route passes through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSegment {
    pub trip_ids: BTreeSet<TripId>,
    pub coordinates: Vec<GeoPoint>,
}

impl TripSegment {
    /// A full trip route owned by a single trip.
    pub fn new(trip: TripId, coordinates: Vec<GeoPoint>) -> Self {
        Self {
            trip_ids: BTreeSet::from([trip]),
            coordinates,
        }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.coordinates)
    }

    /// Coordinates weighted by owning trips.
    pub fn weighted_len(&self) -> usize {
        self.coordinates.len() * self.trip_ids.len()
    }
}

type CoordKey = (i64, i64);

fn coord_key(point: &GeoPoint, precision: f64) -> CoordKey {
    (
        (point.lat / precision).round() as i64,
        (point.lng / precision).round() as i64,
    )
}

/// Merge overlapping trip routes so each shared stretch is drawn once.
///
/// Overlapping runs carry the union of the contributing trip ids; non
/// overlapping remainders keep their own trip ids. Output segments are in
/// order of first appearance in the input.
pub fn truncate_overlapping_segments(
    segments: &[TripSegment],
    config: &OverlapConfig,
) -> Vec<TripSegment> {
    let precision = config.coordinate_precision;

    let mut owners: HashMap<CoordKey, BTreeSet<TripId>> = HashMap::new();
    for segment in segments {
        for point in &segment.coordinates {
            owners
                .entry(coord_key(point, precision))
                .or_default()
                .extend(segment.trip_ids.iter().cloned());
        }
    }

    let mut emitted: HashSet<CoordKey> = HashSet::with_capacity(owners.len());
    let mut output: Vec<TripSegment> = Vec::new();

    for segment in segments {
        let mut run: Option<TripSegment> = None;

        for point in &segment.coordinates {
            let key = coord_key(point, precision);
            if !emitted.insert(key) {
                // Already drawn by an earlier run
                output.extend(run.take());
                continue;
            }

            let Some(trip_ids) = owners.get(&key) else {
                continue;
            };
            match run.as_mut() {
                Some(current) if &current.trip_ids == trip_ids => {
                    current.coordinates.push(*point);
                }
                _ => {
                    output.extend(run.replace(TripSegment {
                        trip_ids: trip_ids.clone(),
                        coordinates: vec![*point],
                    }));
                }
            }
        }

        output.extend(run);
    }

    let shared = output.iter().filter(|s| s.trip_ids.len() > 1).count();
    info!(
        "[Overlap] {} input segments -> {} output segments ({} shared)",
        segments.len(),
        output.len(),
        shared
    );

    output
}

/// Ownership-weighted coordinate count: distinct (coordinate, trip) pairs.
///
/// Unchanged by [`truncate_overlapping_segments`].
pub fn weighted_coordinate_count(segments: &[TripSegment], config: &OverlapConfig) -> usize {
    let mut pairs: HashSet<(CoordKey, &TripId)> = HashSet::new();
    for segment in segments {
        for point in &segment.coordinates {
            let key = coord_key(point, config.coordinate_precision);
            for trip in &segment.trip_ids {
                pairs.insert((key, trip));
            }
        }
    }
    pairs.len()
}

/// A point where routes of different trips cross.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crossing {
    /// Index of the first segment in the input
    pub first: usize,
    /// Index of the second segment in the input (always > `first`)
    pub second: usize,
    pub point: GeoPoint,
}

/// Find where segments owned by disjoint trip sets cross each other.
pub fn find_crossings(segments: &[TripSegment]) -> Vec<Crossing> {
    let bounds: Vec<Option<Bounds>> = segments.iter().map(TripSegment::bounds).collect();
    let mut crossings = Vec::new();

    for (i, a) in segments.iter().enumerate() {
        let Some(bounds_a) = bounds[i] else { continue };

        for (j, b) in segments.iter().enumerate().skip(i + 1) {
            if !a.trip_ids.is_disjoint(&b.trip_ids) {
                continue;
            }
            let Some(bounds_b) = bounds[j] else { continue };
            if !bounds_overlap(&bounds_a, &bounds_b, 0.0, bounds_a.center().lat) {
                continue;
            }

            let mut seen: Vec<GeoPoint> = Vec::new();
            for ea in a.coordinates.windows(2) {
                let edge_bounds = compute_bounds(ea);
                if !bounds_overlap(&edge_bounds, &bounds_b, 0.0, edge_bounds.min_lat) {
                    continue;
                }
                for eb in b.coordinates.windows(2) {
                    let hit = segments_intersect(&ea[0], &ea[1], &eb[0], &eb[1]);
                    if let (true, Some(point)) = hit {
                        // Adjacent edges report a shared vertex twice
                        if !seen.contains(&point) {
                            seen.push(point);
                            crossings.push(Crossing {
                                first: i,
                                second: j,
                                point,
                            });
                        }
                    }
                }
            }
        }
    }

    debug!(
        "[Overlap] {} crossings among {} segments",
        crossings.len(),
        segments.len()
    );

    crossings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(trip: &str, points: &[(f64, f64)]) -> TripSegment {
        TripSegment::new(
            TripId::from(trip),
            points.iter().map(|&(lat, lng)| GeoPoint::new(lat, lng)).collect(),
        )
    }

    #[test]
    fn test_disjoint_routes_untouched() {
        let input = vec![
            line("a", &[(45.0, 2.0), (45.0, 2.1)]),
            line("b", &[(46.0, 2.0), (46.0, 2.1)]),
        ];
        let output = truncate_overlapping_segments(&input, &OverlapConfig::default());
        assert_eq!(output, input);
    }

    #[test]
    fn test_identical_routes_merge() {
        let pts = [(45.0, 2.0), (45.0, 2.1), (45.0, 2.2)];
        let input = vec![line("a", &pts), line("b", &pts)];
        let output = truncate_overlapping_segments(&input, &OverlapConfig::default());

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].trip_ids.len(), 2);
        assert_eq!(output[0].len(), 3);
    }

    #[test]
    fn test_precision_merges_near_equal_coordinates() {
        let input = vec![
            line("a", &[(45.0, 2.0), (45.0, 2.1)]),
            line("b", &[(45.000_000_01, 2.0), (45.0, 2.100_000_01)]),
        ];
        let output = truncate_overlapping_segments(&input, &OverlapConfig::default());
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_crossing_found() {
        let input = vec![
            line("a", &[(45.0, 2.0), (45.0, 2.2)]),
            line("b", &[(44.9, 2.1), (45.1, 2.1)]),
        ];
        let crossings = find_crossings(&input);
        assert_eq!(crossings.len(), 1);
        assert!((crossings[0].point.lat - 45.0).abs() < 1e-9);
        assert!((crossings[0].point.lng - 2.1).abs() < 1e-9);
    }
}
