//! Travel intent grouping.
//!
//! Intents are grouped by the rallying points their paths have in common:
//! 1. Every intent is expanded into its ordered waypoint path (routing oracle)
//! 2. Every ordered pair (P1, P2) with P1 before P2 on the path is a candidate
//!    pass-through segment for that intent
//! 3. Candidates are grouped by the identity pair (P1, P2)
//! 4. Raw groups with the same member set collapse to the one whose P1-P2
//!    great-circle distance is the largest (longest shared segment)
//!
//! Direction is not filtered here: an ordered pair only groups intents that
//! traverse P1 then P2, so opposite flows land in separate groups naturally.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TripMatchError};
use crate::geo_utils::haversine_distance;
use crate::progress::{GroupingPhase, GroupingProgress};
use crate::routing::{RallyingPointCatalogue, RoutingOracle};
use crate::{GeoPoint, IntentId, RallyingPointRef, TravelIntent, UserId, WayPoint};

/// Configuration for intent grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingConfig {
    /// Minimum number of distinct users sharing a pass-through pair.
    /// Default: 2
    pub min_group_size: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self { min_group_size: 2 }
    }
}

/// Identity of a group's member set: sorted, deduplicated intent ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey(Vec<IntentId>);

impl GroupKey {
    pub fn new(ids: impl IntoIterator<Item = IntentId>) -> Self {
        let mut ids: Vec<IntentId> = ids.into_iter().collect();
        ids.sort();
        ids.dedup();
        Self(ids)
    }

    pub fn intents(&self) -> &[IntentId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One intent's participation in a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub intent: IntentId,
    pub user: UserId,
    pub departure: NaiveTime,
    /// P1 as it appears on this intent's path
    pub pickup: WayPoint,
    /// P2 as it appears on this intent's path
    pub drop: WayPoint,
    /// Length of this intent's full path (meters)
    pub path_distance: f64,
}

impl GroupMember {
    /// Distance travelled together with the group, along this member's path.
    pub fn shared_distance(&self) -> f64 {
        (self.drop.distance - self.pickup.distance).max(0.0)
    }

    /// Part of this member's path outside the shared segment.
    pub fn detour(&self) -> f64 {
        (self.path_distance - self.shared_distance()).max(0.0)
    }
}

/// Intents of distinct users sharing the pass-through pair (P1, P2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedGroup {
    pub key: GroupKey,
    pub p1: RallyingPointRef,
    pub p2: RallyingPointRef,
    /// Great-circle distance between P1 and P2 (meters)
    pub shared_distance: f64,
    /// Members ordered by intent id
    pub members: Vec<GroupMember>,
}

impl MatchedGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains_user(&self, user: &UserId) -> bool {
        self.members.iter().any(|m| &m.user == user)
    }

    pub fn member_for(&self, user: &UserId) -> Option<&GroupMember> {
        self.members.iter().find(|m| &m.user == user)
    }

    pub fn users(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter().map(|m| &m.user)
    }
}

/// An intent left out of this pass, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedIntent {
    pub intent: IntentId,
    pub error: TripMatchError,
}

/// Result of a grouping pass.
#[derive(Debug, Clone, Default)]
pub struct GroupingResult {
    /// Retained groups ordered by member set
    pub groups: Vec<MatchedGroup>,
    /// Intents whose path could not be expanded
    pub skipped: Vec<SkippedIntent>,
}

impl GroupingResult {
    pub fn iter(&self) -> std::slice::Iter<'_, MatchedGroup> {
        self.groups.iter()
    }
}

impl IntoIterator for GroupingResult {
    type Item = MatchedGroup;
    type IntoIter = std::vec::IntoIter<MatchedGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

/// An intent with its resolved path.
struct ExpandedIntent<'a> {
    intent: &'a TravelIntent,
    path: Vec<WayPoint>,
    locations: Vec<GeoPoint>,
}

impl ExpandedIntent<'_> {
    fn path_distance(&self) -> f64 {
        self.path.last().map_or(0.0, |w| w.distance)
    }
}

/// A pass-through pair on one intent's path (indices into its waypoints).
struct Candidate {
    expanded: usize,
    pickup: usize,
    drop: usize,
}

fn expand_intent<'a>(
    intent: &'a TravelIntent,
    catalogue: &dyn RallyingPointCatalogue,
    oracle: &dyn RoutingOracle,
) -> Result<ExpandedIntent<'a>> {
    let from = catalogue.resolve(&intent.from)?;
    let to = catalogue.resolve(&intent.to)?;
    let path = oracle.expand_path(&from, &to)?;
    let locations = path
        .iter()
        .map(|w| catalogue.resolve(&w.rallying_point).map(|p| p.location))
        .collect::<Result<Vec<_>>>()?;

    Ok(ExpandedIntent {
        intent,
        path,
        locations,
    })
}

fn sorted_by_id(intents: &[TravelIntent]) -> Vec<&TravelIntent> {
    let mut sorted: Vec<&TravelIntent> = intents.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted
}

fn record_skip(skipped: &mut Vec<SkippedIntent>, intent: &TravelIntent, error: TripMatchError) {
    warn!(
        "[Grouping] Skipping intent {} ({} -> {}): {}",
        intent.id, intent.from, intent.to, error
    );
    skipped.push(SkippedIntent {
        intent: intent.id.clone(),
        error,
    });
}

/// Group travel intents by their longest shared pass-through segment.
///
/// Intents whose path cannot be expanded are skipped and reported in
/// [`GroupingResult::skipped`]; they never abort the batch. Returns
/// [`TripMatchError::Cancelled`] if `progress` reports cancellation.
pub fn group_intents(
    intents: &[TravelIntent],
    catalogue: &dyn RallyingPointCatalogue,
    oracle: &dyn RoutingOracle,
    config: &GroupingConfig,
    progress: &dyn GroupingProgress,
) -> Result<GroupingResult> {
    let sorted = sorted_by_id(intents);
    progress.on_phase(GroupingPhase::ExpandingPaths, sorted.len() as u32);

    let mut expanded = Vec::with_capacity(sorted.len());
    let mut skipped = Vec::new();
    for intent in sorted {
        if progress.is_cancelled() {
            return Err(TripMatchError::Cancelled);
        }
        match expand_intent(intent, catalogue, oracle) {
            Ok(e) => expanded.push(e),
            Err(e) => record_skip(&mut skipped, intent, e),
        }
        progress.on_progress();
    }

    let groups = select_groups(&expanded, config, progress)?;
    Ok(GroupingResult { groups, skipped })
}

/// Group travel intents, expanding paths in parallel.
///
/// Same result as [`group_intents`]; the oracle is called from rayon threads.
#[cfg(feature = "parallel")]
pub fn group_intents_parallel(
    intents: &[TravelIntent],
    catalogue: &dyn RallyingPointCatalogue,
    oracle: &dyn RoutingOracle,
    config: &GroupingConfig,
    progress: &dyn GroupingProgress,
) -> Result<GroupingResult> {
    use rayon::prelude::*;

    let sorted = sorted_by_id(intents);
    progress.on_phase(GroupingPhase::ExpandingPaths, sorted.len() as u32);

    let results: Vec<Result<ExpandedIntent>> = sorted
        .par_iter()
        .map(|&intent| {
            if progress.is_cancelled() {
                return Err(TripMatchError::Cancelled);
            }
            let result = expand_intent(intent, catalogue, oracle);
            progress.on_progress();
            result
        })
        .collect();

    let mut expanded = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for (intent, result) in sorted.iter().zip(results) {
        match result {
            Ok(e) => expanded.push(e),
            Err(TripMatchError::Cancelled) => return Err(TripMatchError::Cancelled),
            Err(e) => record_skip(&mut skipped, intent, e),
        }
    }

    let groups = select_groups(&expanded, config, progress)?;
    Ok(GroupingResult { groups, skipped })
}

/// Enumerate pass-through pairs, group them and keep the best group per member set.
fn select_groups(
    expanded: &[ExpandedIntent],
    config: &GroupingConfig,
    progress: &dyn GroupingProgress,
) -> Result<Vec<MatchedGroup>> {
    progress.on_phase(GroupingPhase::CollectingCandidates, expanded.len() as u32);

    let mut raw: BTreeMap<(&RallyingPointRef, &RallyingPointRef), Vec<Candidate>> =
        BTreeMap::new();
    for (idx, e) in expanded.iter().enumerate() {
        if progress.is_cancelled() {
            return Err(TripMatchError::Cancelled);
        }
        let mut seen = HashSet::new();
        for (i, pickup) in e.path.iter().enumerate() {
            for (j, drop) in e.path.iter().enumerate().skip(i + 1) {
                if pickup.rallying_point == drop.rallying_point {
                    continue;
                }
                let pair = (&pickup.rallying_point, &drop.rallying_point);
                if seen.insert(pair) {
                    raw.entry(pair).or_default().push(Candidate {
                        expanded: idx,
                        pickup: i,
                        drop: j,
                    });
                }
            }
        }
        progress.on_progress();
    }

    progress.on_phase(GroupingPhase::SelectingGroups, raw.len() as u32);

    let min_size = config.min_group_size.max(2);
    let mut best: BTreeMap<GroupKey, MatchedGroup> = BTreeMap::new();
    for ((p1, p2), candidates) in raw {
        progress.on_progress();

        // One intent per user; candidates are in intent id order
        let mut users = HashSet::new();
        let members: Vec<GroupMember> = candidates
            .iter()
            .filter(|c| users.insert(&expanded[c.expanded].intent.user))
            .map(|c| {
                let e = &expanded[c.expanded];
                GroupMember {
                    intent: e.intent.id.clone(),
                    user: e.intent.user.clone(),
                    departure: e.intent.earliest_departure,
                    pickup: e.path[c.pickup].clone(),
                    drop: e.path[c.drop].clone(),
                    path_distance: e.path_distance(),
                }
            })
            .collect();

        if members.len() < min_size {
            continue;
        }

        let first = &candidates[0];
        let locations = &expanded[first.expanded].locations;
        let shared_distance = haversine_distance(&locations[first.pickup], &locations[first.drop]);

        let key = GroupKey::new(members.iter().map(|m| m.intent.clone()));
        let group = MatchedGroup {
            key: key.clone(),
            p1: p1.clone(),
            p2: p2.clone(),
            shared_distance,
            members,
        };

        match best.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(group);
            }
            Entry::Occupied(mut slot) => {
                if shared_distance > slot.get().shared_distance {
                    slot.insert(group);
                }
            }
        }
    }

    info!(
        "[Grouping] {} intents -> {} groups",
        expanded.len(),
        best.len()
    );

    Ok(best.into_values().collect())
}
