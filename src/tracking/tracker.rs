//! Per-trip member progress, delay and arrival.
//!
//! Each member has its own lock; a position update holds only that lock and
//! never while the routing oracle is called. The current waypoint index of a
//! member never decreases: a snapped ping behind it is ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, OracleError, Result, TripMatchError};
use crate::geo_utils::haversine_distance;
use crate::routing::{RallyingPointCatalogue, RoutingOracle};
use crate::{is_ordered_by_duration, GeoPoint, RallyingPointRef, TripId, UserId};

use super::motion::{is_moving, PingBuffer};
use super::{PositionPing, TrackerConfig, Trip, TripMember, TripStatus};

/// What a position update did.
#[derive(Debug, Clone, PartialEq)]
pub enum PingOutcome {
    /// The member's current waypoint moved forward.
    Advanced { from: usize, to: usize },
    /// Recorded; the snapped waypoint was not ahead of the current one.
    Unchanged { index: usize },
    /// The oracle failed or timed out; nothing was recorded.
    Deferred { error: OracleError },
}

/// Tracking snapshot of one member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTracking {
    pub user: UserId,
    pub current_index: usize,
    pub next_point: RallyingPointRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ping_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<GeoPoint>,
    /// Last computed delay (seconds, positive = late)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
    pub is_moving: bool,
    pub has_arrived: bool,
}

/// Tracking snapshot of a whole trip, members ordered by user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub trip: TripId,
    pub status: TripStatus,
    pub destination_reached: bool,
    pub members: Vec<MemberTracking>,
}

#[derive(Debug)]
struct MemberState {
    current_index: usize,
    /// Distance from the latest ping to the current waypoint (meters)
    point_distance: Option<f64>,
    pings: PingBuffer,
    last_delay: Option<i64>,
}

#[derive(Debug)]
struct MemberSlot {
    member: TripMember,
    pickup: usize,
    drop: usize,
    state: Mutex<MemberState>,
}

impl MemberSlot {
    fn lock(&self) -> MutexGuard<'_, MemberState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Live tracker of one trip.
pub struct TripTracker {
    trip: Trip,
    locations: Vec<GeoPoint>,
    status: RwLock<TripStatus>,
    members: HashMap<UserId, MemberSlot>,
    oracle: Arc<dyn RoutingOracle>,
    config: TrackerConfig,
}

impl std::fmt::Debug for TripTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripTracker")
            .field("trip", &self.trip)
            .field("locations", &self.locations)
            .field("status", &self.status)
            .field("members", &self.members)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TripTracker {
    /// Build a tracker for `trip`, resolving every waypoint location.
    ///
    /// Fails if a waypoint or a member's pickup/drop point cannot be resolved,
    /// or if the driver is not a member.
    pub fn new(
        trip: Trip,
        oracle: Arc<dyn RoutingOracle>,
        catalogue: &dyn RallyingPointCatalogue,
        config: TrackerConfig,
    ) -> Result<Self> {
        if !is_ordered_by_duration(&trip.waypoints) {
            warn!(
                "[TripTracker] Trip {} waypoints are not ordered by duration",
                trip.id
            );
        }

        let locations = trip
            .waypoints
            .iter()
            .map(|w| catalogue.resolve(&w.rallying_point).map(|p| p.location))
            .collect::<Result<Vec<_>>>()?;

        trip.member(&trip.driver)
            .ok_or_member_not_found(&trip.id, &trip.driver)?;

        let mut members = HashMap::with_capacity(trip.members.len());
        for member in &trip.members {
            let pickup = trip
                .waypoint_index(&member.from)
                .ok_or_rallying_point_not_found(&member.from)?;
            let drop = trip
                .waypoint_index(&member.to)
                .ok_or_rallying_point_not_found(&member.to)?;
            members.insert(
                member.user.clone(),
                MemberSlot {
                    member: member.clone(),
                    pickup,
                    drop,
                    state: Mutex::new(MemberState {
                        current_index: pickup,
                        point_distance: None,
                        pings: PingBuffer::new(config.ping_buffer),
                        last_delay: None,
                    }),
                },
            );
        }

        Ok(Self {
            status: RwLock::new(trip.status),
            trip,
            locations,
            members,
            oracle,
            config,
        })
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn id(&self) -> &TripId {
        &self.trip.id
    }

    pub fn status(&self) -> TripStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn transition(&self, to: TripStatus) -> Result<()> {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if !status.can_transition_to(to) {
            return Err(TripMatchError::InvalidTransition {
                trip: self.trip.id.clone(),
                from: *status,
                to,
            });
        }
        info!(
            "[TripTracker] Trip {}: {:?} -> {:?}",
            self.trip.id, *status, to
        );
        *status = to;
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.transition(TripStatus::Started)
    }

    pub fn finish(&self) -> Result<()> {
        self.transition(TripStatus::Finished)
    }

    pub fn cancel(&self) -> Result<()> {
        self.transition(TripStatus::Canceled)
    }

    fn ensure_live(&self) -> Result<()> {
        let status = self.status();
        if status != TripStatus::Started {
            return Err(TripMatchError::TripNotLive {
                trip: self.trip.id.clone(),
                status,
            });
        }
        Ok(())
    }

    fn slot(&self, user: &UserId) -> Result<&MemberSlot> {
        self.members
            .get(user)
            .ok_or_member_not_found(&self.trip.id, user)
    }

    // ========================================================================
    // Plan lookups
    // ========================================================================

    /// Index of the first waypoint at which `user` is in the vehicle.
    ///
    /// For the driver this is the first passenger pickup (the origin if there
    /// are no passengers); for a passenger, their own pickup.
    pub fn get_first_waypoint(&self, user: &UserId) -> Result<usize> {
        let slot = self.slot(user)?;
        if user != &self.trip.driver {
            return Ok(slot.pickup);
        }

        Ok(self
            .members
            .values()
            .filter(|s| s.member.user != self.trip.driver)
            .map(|s| s.pickup)
            .min()
            .unwrap_or(0))
    }

    /// Current waypoint index of `user`.
    pub fn current_index(&self, user: &UserId) -> Result<usize> {
        Ok(self.slot(user)?.lock().current_index)
    }

    // ========================================================================
    // Position updates
    // ========================================================================

    /// Snap a ping of `ping.user` to the nearest remaining waypoint and
    /// advance that member.
    ///
    /// Rejected with [`TripMatchError::TripNotLive`] unless the trip is
    /// started. An oracle failure or timeout defers the ping without recording
    /// it; a snapped waypoint behind the current one leaves the index as is.
    /// A ping older than the member's latest one only feeds motion detection.
    pub fn update_position(&self, ping: PositionPing) -> Result<PingOutcome> {
        self.ensure_live()?;
        let user = ping.user.clone();
        let slot = self.slot(&user)?;

        let current = slot.lock().current_index;
        let remaining = &self.trip.waypoints[current..];

        let snapped = match self
            .oracle
            .snap_to_nearest_remaining(&ping.coordinate, remaining)
        {
            Ok(offset) if offset < remaining.len() => current + offset,
            Ok(offset) => {
                let error = OracleError::SnapFailed {
                    reason: format!(
                        "index {} out of {} remaining waypoints",
                        offset,
                        remaining.len()
                    ),
                };
                warn!("[TripTracker] Deferring ping of {} on {}: {}", user, self.trip.id, error);
                return Ok(PingOutcome::Deferred { error });
            }
            Err(error) => {
                warn!("[TripTracker] Deferring ping of {} on {}: {}", user, self.trip.id, error);
                return Ok(PingOutcome::Deferred { error });
            }
        };

        let mut state = slot.lock();
        // The trip may have ended while the oracle was running
        self.ensure_live()?;

        let from = state.current_index;
        let to = from.max(snapped);
        if snapped < from {
            debug!(
                "[TripTracker] Ignoring backward ping of {} on {} ({} < {})",
                user, self.trip.id, snapped, from
            );
        }

        let coordinate = ping.coordinate;
        let at = ping.at;
        let late = state.pings.latest().is_some_and(|latest| at < latest.at);
        if !state.pings.push(ping) {
            debug!("[TripTracker] Dropping stale ping of {} at {}", user, at);
            return Ok(PingOutcome::Unchanged { index: from });
        }
        if late {
            debug!("[TripTracker] Late ping of {} at {} kept for motion only", user, at);
            return Ok(PingOutcome::Unchanged { index: from });
        }
        state.current_index = to;
        state.point_distance = Some(haversine_distance(&coordinate, &self.locations[to]));

        if is_moving(&state.pings, self.config.motion_threshold) {
            state.last_delay = self.delay_at(to, at);
        }

        if to > from {
            Ok(PingOutcome::Advanced { from, to })
        } else {
            Ok(PingOutcome::Unchanged { index: from })
        }
    }

    fn delay_at(&self, index: usize, now: DateTime<Utc>) -> Option<i64> {
        self.trip
            .planned_arrival(index)
            .map(|planned| (now - planned).num_seconds())
    }

    /// Delay of `user` against the plan in seconds (positive = late).
    ///
    /// While the member moves the delay is recomputed from `now`; while they
    /// are stationary the last computed value is returned unchanged.
    pub fn compute_delay(&self, user: &UserId, now: DateTime<Utc>) -> Result<i64> {
        let slot = self.slot(user)?;
        let mut state = slot.lock();

        let moving = is_moving(&state.pings, self.config.motion_threshold);
        if let (false, Some(frozen)) = (moving, state.last_delay) {
            return Ok(frozen);
        }

        let delay = self.delay_at(state.current_index, now).unwrap_or(0);
        state.last_delay = Some(delay);
        Ok(delay)
    }

    pub fn is_moving(&self, user: &UserId) -> Result<bool> {
        let slot = self.slot(user)?;
        let state = slot.lock();
        Ok(is_moving(&state.pings, self.config.motion_threshold))
    }

    fn is_near(&self, state: &MemberState) -> bool {
        state
            .point_distance
            .is_some_and(|d| d < self.config.near_point_distance)
    }

    /// Check if `user` reached their drop point.
    ///
    /// True when the member is near their drop waypoint, or when the driver
    /// has moved past it (or is near it).
    pub fn member_has_arrived(&self, user: &UserId) -> Result<bool> {
        let slot = self.slot(user)?;
        {
            let state = slot.lock();
            if state.current_index == slot.drop && self.is_near(&state) {
                return Ok(true);
            }
        }

        if user == &self.trip.driver {
            return Ok(false);
        }
        let driver = self.slot(&self.trip.driver)?;
        let state = driver.lock();
        Ok(slot.drop < state.current_index
            || (slot.drop == state.current_index && self.is_near(&state)))
    }

    /// Check if the driver is at the last waypoint.
    pub fn destination_reached(&self) -> bool {
        let Some(last) = self.trip.waypoints.len().checked_sub(1) else {
            return false;
        };
        self.members.get(&self.trip.driver).is_some_and(|slot| {
            let state = slot.lock();
            state.current_index == last && self.is_near(&state)
        })
    }

    /// Snapshot of every member's tracking state.
    pub fn tracking_info(&self) -> TrackingInfo {
        let mut users: Vec<&UserId> = self.members.keys().collect();
        users.sort();

        let members = users
            .into_iter()
            .filter_map(|user| {
                let has_arrived = self.member_has_arrived(user).unwrap_or(false);
                let slot = self.members.get(user)?;
                let state = slot.lock();
                let latest = state.pings.latest();
                Some(MemberTracking {
                    user: user.clone(),
                    current_index: state.current_index,
                    next_point: self.trip.waypoints[state.current_index]
                        .rallying_point
                        .clone(),
                    last_ping_at: latest.map(|p| p.at),
                    coordinate: latest.map(|p| p.coordinate),
                    delay: state.last_delay,
                    is_moving: is_moving(&state.pings, self.config.motion_threshold),
                    has_arrived,
                })
            })
            .collect();

        TrackingInfo {
            trip: self.trip.id.clone(),
            status: self.status(),
            destination_reached: self.destination_reached(),
            members,
        }
    }
}
