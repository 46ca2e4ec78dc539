//! Geographic primitives.
//!
//! Distances are great-circle meters. Segment intersection treats lat/lng as a
//! plane, which holds for the short segments of a sampled road polyline.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};

use crate::{Bounds, GeoPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Meters per degree of latitude.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in meters.
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * h.sqrt().asin()
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

fn to_coord(p: &GeoPoint) -> Coord {
    Coord { x: p.lng, y: p.lat }
}

/// Test whether segment `a1-a2` meets segment `b1-b2`.
///
/// Returns the meeting point when the segments cross or one touches an
/// endpoint of the other. Collinear overlapping segments report the first of
/// `a1, a2, b1, b2` lying on the shared stretch.
pub fn segments_intersect(
    a1: &GeoPoint,
    a2: &GeoPoint,
    b1: &GeoPoint,
    b2: &GeoPoint,
) -> (bool, Option<GeoPoint>) {
    let a = Line::new(to_coord(a1), to_coord(a2));
    let b = Line::new(to_coord(b1), to_coord(b2));

    match line_intersection(a, b) {
        Some(LineIntersection::SinglePoint { intersection, .. }) => {
            (true, Some(GeoPoint::new(intersection.y, intersection.x)))
        }
        Some(LineIntersection::Collinear { intersection }) => {
            let shared = [a1, a2, b1, b2]
                .into_iter()
                .find(|p| {
                    let c = to_coord(p);
                    c == intersection.start || c == intersection.end
                })
                .copied()
                .unwrap_or_else(|| GeoPoint::new(intersection.start.y, intersection.start.x));
            (true, Some(shared))
        }
        None => (false, None),
    }
}

/// Compute the bounding box of a polyline.
///
/// An empty slice yields a zero-sized box at the origin.
pub fn compute_bounds(points: &[GeoPoint]) -> Bounds {
    Bounds::from_points(points).unwrap_or(Bounds {
        min_lat: 0.0,
        max_lat: 0.0,
        min_lng: 0.0,
        max_lng: 0.0,
    })
}

/// Convert a distance in meters to degrees of longitude at a latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    meters / (METERS_PER_DEGREE * latitude.to_radians().cos().max(0.01))
}

/// Check whether two bounding boxes overlap, optionally with a buffer in meters.
pub fn bounds_overlap(a: &Bounds, b: &Bounds, buffer: f64, reference_lat: f64) -> bool {
    let lat_buffer = buffer / METERS_PER_DEGREE;
    let lng_buffer = meters_to_degrees(buffer, reference_lat);

    a.min_lat - lat_buffer <= b.max_lat
        && a.max_lat + lat_buffer >= b.min_lat
        && a.min_lng - lng_buffer <= b.max_lng
        && a.max_lng + lng_buffer >= b.min_lng
}
