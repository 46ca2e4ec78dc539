//! Routing oracle and rallying point catalogue contracts.
//!
//! Road routing is delegated to an external service. The engine only needs:
//! - `RoutingOracle::expand_path` - ordered waypoints between two rallying points
//! - `RoutingOracle::snap_to_nearest_remaining` - nearest remaining waypoint for a ping
//! - `RallyingPointCatalogue::resolve` - reference data lookup
//!
//! [`InterpolatingOracle`] builds the oracle on top of any [`RouteProvider`]
//! (a polyline source such as OSRM) by attaching catalogue rallying points that
//! lie along the returned polyline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OracleError, Result};
use crate::{GeoPoint, RallyingPoint, RallyingPointRef, WayPoint};

pub mod catalogue;
pub mod interpolate;
#[cfg(feature = "osrm")]
pub mod osrm;

pub use catalogue::InMemoryCatalogue;
pub use interpolate::{
    InterpolatingOracle, InterpolationConfig, StraightLineConfig, StraightLineRoutes,
};
#[cfg(feature = "osrm")]
pub use osrm::OsrmRoutes;

/// A polyline between two or more points with its travel cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub coordinates: Vec<GeoPoint>,
    /// Travel time in seconds
    pub duration: f64,
    /// Road distance in meters
    pub distance: f64,
}

/// Source of road polylines. Implementations must be `Send + Sync` so a
/// single provider can serve parallel path expansion.
pub trait RouteProvider: Send + Sync {
    /// Route through `points` in order.
    fn route(&self, points: &[GeoPoint]) -> std::result::Result<Route, OracleError>;
}

/// Path expansion and snapping, the only I/O boundary of the engine.
pub trait RoutingOracle: Send + Sync {
    /// Ordered waypoints from `origin` to `destination`, through every known
    /// rallying point the path passes by. The first waypoint is the origin and
    /// the last the destination.
    fn expand_path(
        &self,
        origin: &RallyingPoint,
        destination: &RallyingPoint,
    ) -> std::result::Result<Vec<WayPoint>, OracleError>;

    /// Index into `candidates` of the waypoint nearest to `coordinate`.
    fn snap_to_nearest_remaining(
        &self,
        coordinate: &GeoPoint,
        candidates: &[WayPoint],
    ) -> std::result::Result<usize, OracleError>;
}

/// Read access to the rallying point reference data.
pub trait RallyingPointCatalogue: Send + Sync {
    fn resolve(&self, id: &RallyingPointRef) -> Result<RallyingPoint>;

    /// Nearest active rallying point within `radius` meters, with its distance.
    fn nearest(&self, location: &GeoPoint, radius: f64) -> Option<(RallyingPoint, f64)>;
}

impl<T: RoutingOracle + ?Sized> RoutingOracle for Arc<T> {
    fn expand_path(
        &self,
        origin: &RallyingPoint,
        destination: &RallyingPoint,
    ) -> std::result::Result<Vec<WayPoint>, OracleError> {
        (**self).expand_path(origin, destination)
    }

    fn snap_to_nearest_remaining(
        &self,
        coordinate: &GeoPoint,
        candidates: &[WayPoint],
    ) -> std::result::Result<usize, OracleError> {
        (**self).snap_to_nearest_remaining(coordinate, candidates)
    }
}

impl<T: RallyingPointCatalogue + ?Sized> RallyingPointCatalogue for Arc<T> {
    fn resolve(&self, id: &RallyingPointRef) -> Result<RallyingPoint> {
        (**self).resolve(id)
    }

    fn nearest(&self, location: &GeoPoint, radius: f64) -> Option<(RallyingPoint, f64)> {
        (**self).nearest(location, radius)
    }
}

impl<T: RouteProvider + ?Sized> RouteProvider for Arc<T> {
    fn route(&self, points: &[GeoPoint]) -> std::result::Result<Route, OracleError> {
        (**self).route(points)
    }
}
