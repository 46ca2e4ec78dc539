//! # Trip Match
//!
//! Trip matching, grouping and live tracking engine for a carpooling platform.
//!
//! This library provides:
//! - Grouping of travel intents sharing a common pass-through segment
//! - Per-user match ranking over those groups
//! - Overlap merging of trip route polylines for display
//! - Live tracking of a started trip's members against its waypoints
//!
//! Road routing, rallying point storage and trip persistence are external
//! collaborators reached through the traits in [`routing`] and [`tracking`].
//!
//! ## Features
//!
//! - **`parallel`** - Expand intent paths in parallel with rayon
//! - **`osrm`** - Route provider backed by an OSRM HTTP endpoint
//! - **`cli`** - Debug command line tool
//!
//! ## Quick Start
//!
//! ```rust
//! use tripmatch::{GeoPoint, geo_utils::haversine_distance};
//!
//! let aurillac = GeoPoint::new(44.9285441, 2.4433101);
//! let arpajon = GeoPoint::new(44.9034428, 2.4570176);
//!
//! let meters = haversine_distance(&aurillac, &arpajon);
//! assert!(meters > 2_000.0 && meters < 4_000.0);
//! ```

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, OracleError, Result, TripMatchError};

// Geographic primitives (distance, segment intersection, bounds)
pub mod geo_utils;
pub use geo_utils::{haversine_distance, segments_intersect};

// Routing oracle and rallying point catalogue contracts
pub mod routing;
pub use routing::{
    InMemoryCatalogue, InterpolatingOracle, RallyingPointCatalogue, RouteProvider, RoutingOracle,
    StraightLineRoutes,
};

// Grouping progress and cooperative cancellation
pub mod progress;
pub use progress::{CancellationFlag, GroupingPhase, GroupingProgress, NoopProgress};

// Intent grouping by shared pass-through pair
pub mod grouping;
#[cfg(feature = "parallel")]
pub use grouping::group_intents_parallel;
pub use grouping::{
    group_intents, GroupKey, GroupMember, GroupingConfig, GroupingResult, MatchedGroup,
};

// Per-user match ranking
pub mod matching;
pub use matching::{
    best_match_order, find_matches, match_for_user, Match, MatchKind, Score, TripIntentMatch,
};

// Stateful intent pool with cached grouping
pub mod engine;
pub use engine::{IntentStore, MatchingEngine};

// Route overlap truncation for rendering
pub mod overlap;
pub use overlap::{
    find_crossings, truncate_overlapping_segments, weighted_coordinate_count, Crossing,
    OverlapConfig, TripSegment,
};

// Live trip tracking
pub mod tracking;
pub use tracking::{
    InMemoryTripRepository, MemberTracking, PingOutcome, PositionPing, TrackerConfig,
    TrackerRegistry, TrackingInfo, Trip, TripMember, TripRepository, TripStatus, TripTracker,
};

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Reference to a rallying point owned by the external catalogue.
    RallyingPointRef
);
string_id!(
    /// Identifier of a travel intent.
    IntentId
);
string_id!(UserId);
string_id!(TripId);

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate in degrees.
///
/// # Example
/// ```
/// use tripmatch::GeoPoint;
/// let vic = GeoPoint::new(44.9802528, 2.6244222);
/// assert!(vic.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = Self {
            min_lat: first.lat,
            max_lat: first.lat,
            min_lng: first.lng,
            max_lng: first.lng,
        };
        for p in &points[1..] {
            bounds.min_lat = bounds.min_lat.min(p.lat);
            bounds.max_lat = bounds.max_lat.max(p.lat);
            bounds.min_lng = bounds.min_lng.min(p.lng);
            bounds.max_lng = bounds.max_lng.max(p.lng);
        }
        Some(bounds)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// A named pickup/drop location from the reference catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RallyingPoint {
    pub id: RallyingPointRef,
    pub label: String,
    pub location: GeoPoint,
    pub is_active: bool,
}

impl RallyingPoint {
    pub fn new(id: impl Into<String>, label: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: RallyingPointRef::new(id),
            label: label.into(),
            location,
            is_active: true,
        }
    }
}

/// A user's declared need to travel between two rallying points.
///
/// Intents are never edited once matched; a change is a new intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelIntent {
    pub id: IntentId,
    pub user: UserId,
    pub from: RallyingPointRef,
    pub to: RallyingPointRef,
    pub earliest_departure: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_return: Option<NaiveTime>,
}

/// A rallying point on an expanded path with cumulative cost from the path origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WayPoint {
    pub rallying_point: RallyingPointRef,
    /// Position in the path (0 = origin)
    pub order: usize,
    /// Cumulative duration from the origin in seconds
    pub duration: f64,
    /// Cumulative distance from the origin in meters
    pub distance: f64,
}

impl WayPoint {
    pub fn new(
        rallying_point: RallyingPointRef,
        order: usize,
        duration: f64,
        distance: f64,
    ) -> Self {
        Self {
            rallying_point,
            order,
            duration,
            distance,
        }
    }
}

/// Check that waypoints are ordered by cumulative duration.
pub fn is_ordered_by_duration(waypoints: &[WayPoint]) -> bool {
    waypoints.windows(2).all(|w| w[0].duration <= w[1].duration)
}
