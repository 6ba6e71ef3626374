//! Candidate-related type definitions
//!
//! Supporting types shared between the reconciliation service and anything
//! that consumes its events.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an attendance session candidate
///
/// `Processing` → `ReadyForReview` → `Committed` | `Discarded`.
/// `Processing` may also move straight to `Discarded`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum CandidateState {
    /// Photos submitted, awaiting aggregation
    Processing,
    /// Aggregation complete, roster populated, operator may edit
    ReadyForReview,
    /// Attendance written by the storage sink (terminal)
    Committed,
    /// Cancelled by the operator or aborted (terminal)
    Discarded,
}

impl CandidateState {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, CandidateState::Committed | CandidateState::Discarded)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Processing, ReadyForReview)
                | (Processing, Discarded)
                | (ReadyForReview, Committed)
                | (ReadyForReview, Discarded)
        )
    }
}

impl std::fmt::Display for CandidateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateState::Processing => write!(f, "Processing"),
            CandidateState::ReadyForReview => write!(f, "ReadyForReview"),
            CandidateState::Committed => write!(f, "Committed"),
            CandidateState::Discarded => write!(f, "Discarded"),
        }
    }
}

/// Headline counts of a review, carried on selection events
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewCounts {
    pub total_enrolled: usize,
    pub total_detected: usize,
    pub total_selected: usize,
}
