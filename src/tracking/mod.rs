//! # Live Trip Tracking
//!
//! Follows the members of a started trip against its fixed waypoint plan.
//!
//! - [`Trip`] - accepted carpool: waypoints, members, driver, lifecycle status
//! - [`TripTracker`] - per-trip progress, delay and arrival state
//! - [`TrackerRegistry`] - explicit map of live trackers, loaded through a
//!   [`TripRepository`]
//!
//! Lifecycle: `NotStarted -> Started -> Finished`, with `Canceled` reachable
//! before the trip ends. Pings are only processed while `Started`.

mod motion;
mod registry;
mod tracker;

pub use motion::{is_moving, PingBuffer};
pub use registry::{InMemoryTripRepository, TrackerRegistry, TripRepository};
pub use tracker::{MemberTracking, PingOutcome, TrackingInfo, TripTracker};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GeoPoint, RallyingPointRef, TripId, UserId, WayPoint};

/// Lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TripStatus {
    NotStarted,
    Started,
    Finished,
    Canceled,
}

impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Finished | TripStatus::Canceled)
    }

    /// Check if the state machine allows going from `self` to `to`.
    pub fn can_transition_to(&self, to: TripStatus) -> bool {
        matches!(
            (self, to),
            (TripStatus::NotStarted, TripStatus::Started)
                | (TripStatus::NotStarted, TripStatus::Canceled)
                | (TripStatus::Started, TripStatus::Finished)
                | (TripStatus::Started, TripStatus::Canceled)
        )
    }
}

/// A trip member and the waypoints they board and leave at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripMember {
    pub user: UserId,
    pub from: RallyingPointRef,
    pub to: RallyingPointRef,
}

impl TripMember {
    pub fn new(
        user: impl Into<UserId>,
        from: impl Into<RallyingPointRef>,
        to: impl Into<RallyingPointRef>,
    ) -> Self {
        Self {
            user: user.into(),
            from: from.into(),
            to: to.into(),
        }
    }
}

/// An accepted, scheduled carpool.
///
/// Waypoints are ordered by cumulative duration and fixed once started.
/// The driver is one of the members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub waypoints: Vec<WayPoint>,
    pub members: Vec<TripMember>,
    pub driver: UserId,
    pub departure_time: DateTime<Utc>,
    pub status: TripStatus,
}

impl Trip {
    pub fn member(&self, user: &UserId) -> Option<&TripMember> {
        self.members.iter().find(|m| &m.user == user)
    }

    /// Index of the waypoint at `rallying_point`.
    pub fn waypoint_index(&self, rallying_point: &RallyingPointRef) -> Option<usize> {
        self.waypoints
            .iter()
            .position(|w| &w.rallying_point == rallying_point)
    }

    /// Planned arrival time at waypoint `index`.
    pub fn planned_arrival(&self, index: usize) -> Option<DateTime<Utc>> {
        let waypoint = self.waypoints.get(index)?;
        let offset = chrono::Duration::milliseconds((waypoint.duration * 1000.0).round() as i64);
        Some(self.departure_time + offset)
    }
}

/// A timestamped position report from a trip member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPing {
    pub user: UserId,
    pub at: DateTime<Utc>,
    pub coordinate: GeoPoint,
    /// Reported speed (m/s)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Reported accuracy radius (meters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl PositionPing {
    pub fn new(user: impl Into<UserId>, at: DateTime<Utc>, coordinate: GeoPoint) -> Self {
        Self {
            user: user.into(),
            at,
            coordinate,
            speed: None,
            accuracy: None,
        }
    }
}

/// Configuration for trip tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// A member within this distance of a waypoint is at it (meters).
    /// Default: 100
    pub near_point_distance: f64,
    /// Displacement below which buffered pings count as stationary (meters).
    /// Default: 1
    pub motion_threshold: f64,
    /// Pings kept per member for motion detection.
    /// Default: 3
    pub ping_buffer: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            near_point_distance: 100.0,
            motion_threshold: 1.0,
            ping_buffer: 3,
        }
    }
}
