//! Trip plans and the set of live trackers.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::info;

use crate::error::{Result, TripMatchError};
use crate::routing::{RallyingPointCatalogue, RoutingOracle};
use crate::TripId;

use super::{PingOutcome, PositionPing, TrackerConfig, Trip, TripStatus, TripTracker};

/// Read access to trip plans, owned by the surrounding trip service.
pub trait TripRepository: Send + Sync {
    /// Current plan and member list of a trip.
    fn get(&self, id: &TripId) -> Result<Trip>;
}

impl<T: TripRepository + ?Sized> TripRepository for Arc<T> {
    fn get(&self, id: &TripId) -> Result<Trip> {
        (**self).get(id)
    }
}

/// Trip plans held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTripRepository {
    trips: RwLock<HashMap<TripId, Trip>>,
}

impl InMemoryTripRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a trip plan.
    pub fn insert(&self, trip: Trip) {
        self.trips
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(trip.id.clone(), trip);
    }

    pub fn len(&self) -> usize {
        self.trips.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TripRepository for InMemoryTripRepository {
    fn get(&self, id: &TripId) -> Result<Trip> {
        self.trips
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| TripMatchError::TripNotFound { id: id.clone() })
    }
}

/// Live trackers by trip id.
///
/// Each tracker is independent; looking one up never blocks updates on another.
pub struct TrackerRegistry {
    repository: Arc<dyn TripRepository>,
    oracle: Arc<dyn RoutingOracle>,
    catalogue: Arc<dyn RallyingPointCatalogue>,
    config: TrackerConfig,
    trackers: RwLock<HashMap<TripId, Arc<TripTracker>>>,
}

impl TrackerRegistry {
    pub fn new(
        repository: Arc<dyn TripRepository>,
        oracle: Arc<dyn RoutingOracle>,
        catalogue: Arc<dyn RallyingPointCatalogue>,
    ) -> Self {
        Self::with_config(repository, oracle, catalogue, TrackerConfig::default())
    }

    pub fn with_config(
        repository: Arc<dyn TripRepository>,
        oracle: Arc<dyn RoutingOracle>,
        catalogue: Arc<dyn RallyingPointCatalogue>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            repository,
            oracle,
            catalogue,
            config,
            trackers: RwLock::new(HashMap::new()),
        }
    }

    /// Start tracking a trip, loading its plan from the repository.
    ///
    /// A trip not yet started is moved to `Started`. Returns the existing
    /// tracker if the trip is already tracked.
    pub fn start(&self, id: &TripId) -> Result<Arc<TripTracker>> {
        if let Some(tracker) = self.get(id) {
            return Ok(tracker);
        }

        let trip = self.repository.get(id)?;
        let tracker = TripTracker::new(
            trip,
            Arc::clone(&self.oracle),
            self.catalogue.as_ref(),
            self.config.clone(),
        )?;
        if tracker.status() == TripStatus::NotStarted {
            tracker.start()?;
        }

        let mut trackers = self.trackers.write().unwrap_or_else(PoisonError::into_inner);
        let tracker = Arc::clone(trackers.entry(id.clone()).or_insert_with(|| Arc::new(tracker)));
        info!("[TrackerRegistry] Tracking trip {} ({} live)", id, trackers.len());
        Ok(tracker)
    }

    pub fn get(&self, id: &TripId) -> Option<Arc<TripTracker>> {
        self.trackers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Apply a position ping to a tracked trip.
    ///
    /// A driver ping that reaches the last waypoint finishes the trip and
    /// stops tracking it.
    pub fn push_ping(&self, id: &TripId, ping: PositionPing) -> Result<PingOutcome> {
        let tracker = self
            .get(id)
            .ok_or_else(|| TripMatchError::TripNotFound { id: id.clone() })?;
        let from_driver = ping.user == tracker.trip().driver;

        let outcome = tracker.update_position(ping)?;
        // A concurrent ping may already have finished it
        if from_driver && tracker.destination_reached() && tracker.finish().is_ok() {
            info!("[TrackerRegistry] Trip {} reached its destination", id);
            self.remove(id);
        }
        Ok(outcome)
    }

    /// Finish a trip and stop tracking it.
    pub fn finish(&self, id: &TripId) -> Result<()> {
        let tracker = self
            .get(id)
            .ok_or_else(|| TripMatchError::TripNotFound { id: id.clone() })?;
        tracker.finish()?;
        self.remove(id);
        Ok(())
    }

    /// Cancel a trip and stop tracking it.
    pub fn cancel(&self, id: &TripId) -> Result<()> {
        let tracker = self
            .get(id)
            .ok_or_else(|| TripMatchError::TripNotFound { id: id.clone() })?;
        tracker.cancel()?;
        self.remove(id);
        Ok(())
    }

    pub fn remove(&self, id: &TripId) -> Option<Arc<TripTracker>> {
        self.trackers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.trackers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
