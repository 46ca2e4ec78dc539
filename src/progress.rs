//! Progress reporting and cooperative cancellation for intent grouping.
//!
//! Grouping thousands of intents calls the routing oracle once per intent, so
//! callers can observe progress and stop a batch whose requester went away.
//! Cancellation is checked between intents.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Grouping phases, ordered by execution sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingPhase {
    /// Expanding every intent into its waypoint path (one oracle call each)
    ExpandingPaths,
    /// Enumerating pass-through pairs per intent
    CollectingCandidates,
    /// Keeping the longest shared segment per member set
    SelectingGroups,
}

impl GroupingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingPhase::ExpandingPaths => "expanding_paths",
            GroupingPhase::CollectingCandidates => "collecting_candidates",
            GroupingPhase::SelectingGroups => "selecting_groups",
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(GroupingPhase::ExpandingPaths),
            2 => Some(GroupingPhase::CollectingCandidates),
            3 => Some(GroupingPhase::SelectingGroups),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            GroupingPhase::ExpandingPaths => 1,
            GroupingPhase::CollectingCandidates => 2,
            GroupingPhase::SelectingGroups => 3,
        }
    }
}

/// Receives progress updates during grouping.
///
/// With the `parallel` feature, calls come from rayon threads.
pub trait GroupingProgress: Send + Sync {
    /// Called when entering a new phase. `total` is the number of items in this phase.
    fn on_phase(&self, phase: GroupingPhase, total: u32);
    /// Called after completing one item in the current phase.
    fn on_progress(&self);
    /// Polled between intents; returning `true` aborts the batch.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// No-op implementation.
pub struct NoopProgress;

impl GroupingProgress for NoopProgress {
    fn on_phase(&self, _phase: GroupingPhase, _total: u32) {}
    fn on_progress(&self) {}
}

/// Atomic progress tracker with a cancel switch, shareable across threads.
#[derive(Debug, Default)]
pub struct CancellationFlag {
    cancelled: AtomicBool,
    phase: AtomicU8,
    completed: AtomicU32,
    total: AtomicU32,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn phase(&self) -> Option<GroupingPhase> {
        GroupingPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// `(completed, total)` for the current phase.
    pub fn counts(&self) -> (u32, u32) {
        (
            self.completed.load(Ordering::SeqCst),
            self.total.load(Ordering::SeqCst),
        )
    }
}

impl GroupingProgress for CancellationFlag {
    fn on_phase(&self, phase: GroupingPhase, total: u32) {
        self.phase.store(phase.to_u8(), Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn on_progress(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
