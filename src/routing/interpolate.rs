//! Path expansion by interpolating catalogue rallying points along a polyline.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{RallyingPointCatalogue, Route, RouteProvider, RoutingOracle};
use crate::error::OracleError;
use crate::geo_utils::haversine_distance;
use crate::{GeoPoint, RallyingPoint, WayPoint};

/// Configuration for mapping a road polyline onto rallying points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationConfig {
    /// Maximum distance between the polyline and a rallying point for the
    /// point to count as passed by (meters).
    /// Default: 2000.0
    pub interpolation_radius: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            interpolation_radius: 2_000.0,
        }
    }
}

/// Routing oracle attaching catalogue rallying points to provider polylines.
pub struct InterpolatingOracle<P, C> {
    provider: P,
    catalogue: C,
    config: InterpolationConfig,
}

impl<P: RouteProvider, C: RallyingPointCatalogue> InterpolatingOracle<P, C> {
    pub fn new(provider: P, catalogue: C) -> Self {
        Self::with_config(provider, catalogue, InterpolationConfig::default())
    }

    pub fn with_config(provider: P, catalogue: C, config: InterpolationConfig) -> Self {
        Self {
            provider,
            catalogue,
            config,
        }
    }

    pub fn catalogue(&self) -> &C {
        &self.catalogue
    }
}

/// Cumulative polyline distance at every coordinate.
fn cumulative_distances(coordinates: &[GeoPoint]) -> Vec<f64> {
    let mut total = 0.0;
    let mut cumulative = Vec::with_capacity(coordinates.len());
    for (i, c) in coordinates.iter().enumerate() {
        if i > 0 {
            total += haversine_distance(&coordinates[i - 1], c);
        }
        cumulative.push(total);
    }
    cumulative
}

impl<P: RouteProvider, C: RallyingPointCatalogue> RoutingOracle for InterpolatingOracle<P, C> {
    fn expand_path(
        &self,
        origin: &RallyingPoint,
        destination: &RallyingPoint,
    ) -> Result<Vec<WayPoint>, OracleError> {
        let route = self
            .provider
            .route(&[origin.location, destination.location])?;
        if route.coordinates.is_empty() {
            return Err(OracleError::RouteUnavailable {
                origin: origin.id.to_string(),
                destination: destination.id.to_string(),
                reason: "empty geometry".to_string(),
            });
        }

        let cumulative = cumulative_distances(&route.coordinates);
        let polyline_length = cumulative.last().copied().unwrap_or(0.0);

        let mut passed = vec![(origin.id.clone(), 0.0)];
        let mut seen: HashSet<_> = [origin.id.clone(), destination.id.clone()].into();

        // A rallying point is attached at the first coordinate that comes within range
        for (coordinate, along) in route.coordinates.iter().zip(&cumulative) {
            if let Some((point, _)) = self
                .catalogue
                .nearest(coordinate, self.config.interpolation_radius)
            {
                if seen.insert(point.id.clone()) {
                    passed.push((point.id, *along));
                }
            }
        }
        passed.push((destination.id.clone(), polyline_length));

        debug!(
            "[Interpolate] {} -> {}: {} waypoints over {:.0}m",
            origin.id,
            destination.id,
            passed.len(),
            route.distance
        );

        Ok(passed
            .into_iter()
            .enumerate()
            .map(|(order, (id, along))| {
                let fraction = if polyline_length > 0.0 {
                    along / polyline_length
                } else {
                    0.0
                };
                WayPoint::new(id, order, route.duration * fraction, route.distance * fraction)
            })
            .collect())
    }

    fn snap_to_nearest_remaining(
        &self,
        coordinate: &GeoPoint,
        candidates: &[WayPoint],
    ) -> Result<usize, OracleError> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, waypoint) in candidates.iter().enumerate() {
            let point = self
                .catalogue
                .resolve(&waypoint.rallying_point)
                .map_err(|e| OracleError::SnapFailed {
                    reason: e.to_string(),
                })?;
            let d = haversine_distance(coordinate, &point.location);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((idx, d));
            }
        }

        best.map(|(idx, _)| idx).ok_or_else(|| OracleError::SnapFailed {
            reason: "no remaining waypoint".to_string(),
        })
    }
}

/// Configuration for [`StraightLineRoutes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StraightLineConfig {
    /// Spacing of sampled coordinates (meters). Default: 250.0
    pub step_meters: f64,
    /// Assumed average speed (km/h). Default: 50.0
    pub speed_kmh: f64,
}

impl Default for StraightLineConfig {
    fn default() -> Self {
        Self {
            step_meters: 250.0,
            speed_kmh: 50.0,
        }
    }
}

/// Offline route provider drawing straight lines between the requested points.
///
/// Useful when no road router is reachable: rallying points near the direct
/// line are still picked up by interpolation.
#[derive(Debug, Clone, Default)]
pub struct StraightLineRoutes {
    config: StraightLineConfig,
}

impl StraightLineRoutes {
    pub fn new(config: StraightLineConfig) -> Self {
        Self { config }
    }
}

impl RouteProvider for StraightLineRoutes {
    fn route(&self, points: &[GeoPoint]) -> Result<Route, OracleError> {
        if points.len() < 2 {
            return Err(OracleError::RouteUnavailable {
                origin: format!("{:?}", points.first()),
                destination: format!("{:?}", points.last()),
                reason: "at least two points are required".to_string(),
            });
        }

        let mut coordinates = vec![points[0]];
        let mut distance = 0.0;
        for pair in points.windows(2) {
            let leg = haversine_distance(&pair[0], &pair[1]);
            let steps = (leg / self.config.step_meters.max(1.0)).ceil().max(1.0) as usize;
            for s in 1..=steps {
                let t = s as f64 / steps as f64;
                coordinates.push(GeoPoint::new(
                    pair[0].lat + (pair[1].lat - pair[0].lat) * t,
                    pair[0].lng + (pair[1].lng - pair[0].lng) * t,
                ));
            }
            distance += leg;
        }

        let speed_ms = self.config.speed_kmh / 3.6;
        Ok(Route {
            coordinates,
            duration: if speed_ms > 0.0 { distance / speed_ms } else { 0.0 },
            distance,
        })
    }
}
