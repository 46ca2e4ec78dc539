//! # Matching Engine
//!
//! Stateful front for intent matching: owns the intent pool and caches the
//! last grouping pass.
//!
//! - `IntentStore` - intent add/withdraw
//! - grouping cache - marked dirty on every pool change, recomputed on the
//!   next query
//!
//! Each grouping pass works on a snapshot, so a recomputation never observes a
//! half-updated pool.

pub mod intent_store;

pub use intent_store::IntentStore;

use std::sync::Arc;

use log::info;

use crate::error::Result;
use crate::grouping::{GroupingConfig, MatchedGroup, SkippedIntent};
use crate::matching::{match_for_user, TripIntentMatch};
use crate::progress::{GroupingProgress, NoopProgress};
use crate::routing::{RallyingPointCatalogue, RoutingOracle};
use crate::{IntentId, TravelIntent, UserId};

#[cfg(not(feature = "parallel"))]
use crate::grouping::group_intents;
#[cfg(feature = "parallel")]
use crate::grouping::group_intents_parallel;

/// Intent pool with cached grouping.
pub struct MatchingEngine {
    pub intents: IntentStore,

    catalogue: Arc<dyn RallyingPointCatalogue>,
    oracle: Arc<dyn RoutingOracle>,
    config: GroupingConfig,

    groups: Vec<MatchedGroup>,
    skipped: Vec<SkippedIntent>,
    dirty: bool,
}

impl MatchingEngine {
    pub fn new(catalogue: Arc<dyn RallyingPointCatalogue>, oracle: Arc<dyn RoutingOracle>) -> Self {
        Self::with_config(catalogue, oracle, GroupingConfig::default())
    }

    pub fn with_config(
        catalogue: Arc<dyn RallyingPointCatalogue>,
        oracle: Arc<dyn RoutingOracle>,
        config: GroupingConfig,
    ) -> Self {
        Self {
            intents: IntentStore::new(),
            catalogue,
            oracle,
            config,
            groups: Vec::new(),
            skipped: Vec::new(),
            dirty: false,
        }
    }

    // ========================================================================
    // Intent pool
    // ========================================================================

    pub fn add_intent(&mut self, intent: TravelIntent) -> Result<()> {
        self.intents.add(intent)?;
        self.dirty = true;
        Ok(())
    }

    pub fn add_intents(&mut self, intents: impl IntoIterator<Item = TravelIntent>) -> Result<()> {
        for intent in intents {
            self.add_intent(intent)?;
        }
        Ok(())
    }

    pub fn remove_intent(&mut self, id: &IntentId) -> Option<TravelIntent> {
        let removed = self.intents.remove(id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ========================================================================
    // Grouping and matching
    // ========================================================================

    /// Recompute groups if the pool changed since the last pass.
    pub fn ensure_computed(&mut self, progress: &dyn GroupingProgress) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let snapshot = self.intents.snapshot();

        #[cfg(feature = "parallel")]
        let result = group_intents_parallel(
            &snapshot,
            self.catalogue.as_ref(),
            self.oracle.as_ref(),
            &self.config,
            progress,
        )?;

        #[cfg(not(feature = "parallel"))]
        let result = group_intents(
            &snapshot,
            self.catalogue.as_ref(),
            self.oracle.as_ref(),
            &self.config,
            progress,
        )?;

        info!(
            "[MatchingEngine] Recomputed {} groups from {} intents ({} skipped)",
            result.groups.len(),
            snapshot.len(),
            result.skipped.len()
        );

        self.groups = result.groups;
        self.skipped = result.skipped;
        self.dirty = false;
        Ok(())
    }

    /// Current groups, recomputing if needed.
    pub fn groups(&mut self) -> Result<&[MatchedGroup]> {
        self.ensure_computed(&NoopProgress)?;
        Ok(&self.groups)
    }

    /// Intents left out of the last grouping pass.
    pub fn skipped(&self) -> &[SkippedIntent] {
        &self.skipped
    }

    /// Ranked matches for `user`.
    pub fn matches_for(&mut self, user: &UserId) -> Result<Vec<TripIntentMatch>> {
        self.ensure_computed(&NoopProgress)?;
        Ok(match_for_user(user, &self.groups))
    }
}
