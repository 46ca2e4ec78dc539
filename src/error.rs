//! Unified error handling.
//!
//! Every failure here is local to the intent, match or ping being processed;
//! nothing is fatal to the owning process.

use thiserror::Error;

use crate::tracking::TripStatus;
use crate::{IntentId, RallyingPointRef, TripId, UserId};

/// Failures reported by a routing oracle or route provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("no route between {origin} and {destination}: {reason}")]
    RouteUnavailable {
        origin: String,
        destination: String,
        reason: String,
    },

    #[error("could not snap coordinate to a remaining waypoint: {reason}")]
    SnapFailed { reason: String },

    #[error("routing call '{operation}' exceeded its deadline")]
    Timeout { operation: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TripMatchError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("rallying point '{id}' not found")]
    RallyingPointNotFound { id: RallyingPointRef },

    #[error("user '{user}' is not a member of trip '{trip}'")]
    MemberNotFound { trip: TripId, user: UserId },

    #[error("trip '{id}' not found")]
    TripNotFound { id: TripId },

    #[error("trip '{trip}' is not live (status {status:?})")]
    TripNotLive { trip: TripId, status: TripStatus },

    #[error("trip '{trip}' cannot go from {from:?} to {to:?}")]
    InvalidTransition {
        trip: TripId,
        from: TripStatus,
        to: TripStatus,
    },

    #[error("intent '{id}' already exists")]
    DuplicateIntent { id: IntentId },

    #[error("operation cancelled")]
    Cancelled,
}

impl TripMatchError {
    /// Routing failures and timeouts: skip or defer, retry later.
    pub fn is_resource_unavailable(&self) -> bool {
        matches!(self, TripMatchError::Oracle(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TripMatchError::RallyingPointNotFound { .. }
                | TripMatchError::MemberNotFound { .. }
                | TripMatchError::TripNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TripMatchError>;

/// Convert lookups returning `Option` into typed not-found errors.
pub trait OptionExt<T> {
    fn ok_or_rallying_point_not_found(self, id: &RallyingPointRef) -> Result<T>;

    fn ok_or_member_not_found(self, trip: &TripId, user: &UserId) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_rallying_point_not_found(self, id: &RallyingPointRef) -> Result<T> {
        self.ok_or_else(|| TripMatchError::RallyingPointNotFound { id: id.clone() })
    }

    fn ok_or_member_not_found(self, trip: &TripId, user: &UserId) -> Result<T> {
        self.ok_or_else(|| TripMatchError::MemberNotFound {
            trip: trip.clone(),
            user: user.clone(),
        })
    }
}
