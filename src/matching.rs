//! Per-user match ranking over grouped intents.
//!
//! For a requesting user, every group containing one of their intents yields a
//! [`TripIntentMatch`] listing the other users sharing the pass-through pair.
//! Matches are ranked by [`best_match_order`]:
//! 1. Smaller departure time difference with the requester
//! 2. Larger group
//! 3. Shorter total detour
//! 4. Intent id, pass-through pair and member set, so the order is total

use std::cmp::Ordering;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grouping::{group_intents, GroupMember, GroupingConfig, MatchedGroup};
use crate::progress::GroupingProgress;
use crate::routing::{RallyingPointCatalogue, RoutingOracle};
use crate::{IntentId, RallyingPointRef, TravelIntent, UserId};

/// Another user's intent compatible with the requester's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub user: UserId,
    pub intent: IntentId,
    pub pickup: RallyingPointRef,
    pub drop: RallyingPointRef,
    pub departure: NaiveTime,
    /// Absolute departure difference with the requester (seconds)
    pub time_delta: i64,
    /// Part of this user's path outside the shared segment (meters)
    pub detour: f64,
}

/// A pairwise match or a join into an existing group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "matches")]
pub enum MatchKind {
    Single(Match),
    Group(Vec<Match>),
}

impl MatchKind {
    /// The other users, one entry each.
    pub fn others(&self) -> &[Match] {
        match self {
            MatchKind::Single(m) => std::slice::from_ref(m),
            MatchKind::Group(members) => members,
        }
    }
}

/// Ranking keys of a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Smallest departure difference among the other users (seconds)
    pub time_delta: i64,
    /// Members in the group, requester included
    pub group_size: usize,
    /// Sum of every member's detour (meters)
    pub detour: f64,
}

impl Score {
    /// `Less` means `self` ranks better.
    pub fn rank(&self, other: &Score) -> Ordering {
        self.time_delta
            .cmp(&other.time_delta)
            .then_with(|| other.group_size.cmp(&self.group_size))
            .then_with(|| self.detour.total_cmp(&other.detour))
    }
}

/// A ranked match for one of the requester's intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripIntentMatch {
    /// The requester's intent
    pub intent: IntentId,
    pub p1: RallyingPointRef,
    pub p2: RallyingPointRef,
    /// Great-circle distance between P1 and P2 (meters)
    pub shared_distance: f64,
    pub kind: MatchKind,
    pub score: Score,
}

/// Strict total order used to rank matches (best first).
pub fn best_match_order(a: &TripIntentMatch, b: &TripIntentMatch) -> Ordering {
    a.score
        .rank(&b.score)
        .then_with(|| a.intent.cmp(&b.intent))
        .then_with(|| a.p1.cmp(&b.p1))
        .then_with(|| a.p2.cmp(&b.p2))
        .then_with(|| {
            let ids_a = a.kind.others().iter().map(|m| &m.intent);
            let ids_b = b.kind.others().iter().map(|m| &m.intent);
            ids_a.cmp(ids_b)
        })
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Gap between two departure times of day, wrapping at midnight.
fn time_delta(a: NaiveTime, b: NaiveTime) -> i64 {
    let delta = (a - b).num_seconds().abs();
    delta.min(SECONDS_PER_DAY - delta)
}

fn to_match(group: &MatchedGroup, requester: &GroupMember, other: &GroupMember) -> Match {
    Match {
        user: other.user.clone(),
        intent: other.intent.clone(),
        pickup: group.p1.clone(),
        drop: group.p2.clone(),
        departure: other.departure,
        time_delta: time_delta(other.departure, requester.departure),
        detour: other.detour(),
    }
}

/// Matches for `user` among `groups`, best first.
///
/// The requester never appears among the others of a match.
pub fn match_for_user(user: &UserId, groups: &[MatchedGroup]) -> Vec<TripIntentMatch> {
    let mut matches: Vec<TripIntentMatch> = groups
        .iter()
        .filter_map(|group| {
            let requester = group.member_for(user)?;

            let mut others: Vec<Match> = group
                .members
                .iter()
                .filter(|m| &m.user != user)
                .map(|m| to_match(group, requester, m))
                .collect();
            others.sort_by(|a, b| {
                a.time_delta
                    .cmp(&b.time_delta)
                    .then_with(|| a.detour.total_cmp(&b.detour))
                    .then_with(|| a.user.cmp(&b.user))
            });

            let score = Score {
                time_delta: others.iter().map(|m| m.time_delta).min()?,
                group_size: group.len(),
                detour: group.members.iter().map(GroupMember::detour).sum(),
            };

            let kind = if others.len() == 1 {
                MatchKind::Single(others.remove(0))
            } else {
                MatchKind::Group(others)
            };

            Some(TripIntentMatch {
                intent: requester.intent.clone(),
                p1: group.p1.clone(),
                p2: group.p2.clone(),
                shared_distance: group.shared_distance,
                kind,
                score,
            })
        })
        .collect();

    matches.sort_by(best_match_order);
    matches
}

/// Group the intent pool and rank the matches of `user`.
pub fn find_matches(
    user: &UserId,
    intents: &[TravelIntent],
    catalogue: &dyn RallyingPointCatalogue,
    oracle: &dyn RoutingOracle,
    config: &GroupingConfig,
    progress: &dyn GroupingProgress,
) -> Result<Vec<TripIntentMatch>> {
    let grouping = group_intents(intents, catalogue, oracle, config, progress)?;
    Ok(match_for_user(user, &grouping.groups))
}
