//! In-memory rallying point catalogue with an R-tree over active points.

use std::collections::HashMap;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::RallyingPointCatalogue;
use crate::error::{OptionExt, Result};
use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::{GeoPoint, RallyingPoint, RallyingPointRef};

/// A rallying point location with its index for R-tree queries
#[derive(Debug, Clone, Copy)]
struct IndexedRallyingPoint {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedRallyingPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lat, self.lng])
    }
}

impl PointDistance for IndexedRallyingPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.lat - point[0];
        let dlng = self.lng - point[1];
        dlat * dlat + dlng * dlng
    }
}

/// Catalogue backed by a vector of points, indexed by id and location.
#[derive(Debug, Default)]
pub struct InMemoryCatalogue {
    points: Vec<RallyingPoint>,
    by_id: HashMap<RallyingPointRef, usize>,
    tree: RTree<IndexedRallyingPoint>,
}

impl InMemoryCatalogue {
    /// Build the catalogue. A later point with a duplicate id replaces the earlier one.
    pub fn new(points: Vec<RallyingPoint>) -> Self {
        let mut deduped: Vec<RallyingPoint> = Vec::with_capacity(points.len());
        let mut by_id = HashMap::with_capacity(points.len());
        for point in points {
            match by_id.get(&point.id) {
                Some(&idx) => deduped[idx] = point,
                None => {
                    by_id.insert(point.id.clone(), deduped.len());
                    deduped.push(point);
                }
            }
        }

        let indexed: Vec<IndexedRallyingPoint> = deduped
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_active && p.location.is_valid())
            .map(|(idx, p)| IndexedRallyingPoint {
                idx,
                lat: p.location.lat,
                lng: p.location.lng,
            })
            .collect();

        Self {
            points: deduped,
            by_id,
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, id: &RallyingPointRef) -> Option<&RallyingPoint> {
        self.by_id.get(id).map(|&idx| &self.points[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RallyingPoint> {
        self.points.iter()
    }
}

impl RallyingPointCatalogue for InMemoryCatalogue {
    fn resolve(&self, id: &RallyingPointRef) -> Result<RallyingPoint> {
        self.get(id).cloned().ok_or_rallying_point_not_found(id)
    }

    fn nearest(&self, location: &GeoPoint, radius: f64) -> Option<(RallyingPoint, f64)> {
        // Longitude degrees are the widest at any latitude, so this radius covers
        // the metric circle in both axes.
        let radius_deg = meters_to_degrees(radius, location.lat);
        let query = [location.lat, location.lng];

        self.tree
            .locate_within_distance(query, radius_deg * radius_deg)
            .map(|indexed| {
                let point = &self.points[indexed.idx];
                (point, haversine_distance(location, &point.location))
            })
            .filter(|(_, d)| *d <= radius)
            .min_by(|(pa, da), (pb, db)| da.total_cmp(db).then_with(|| pa.id.cmp(&pb.id)))
            .map(|(point, d)| (point.clone(), d))
    }
}
