//! Session candidate lifecycle
//!
//! A candidate is one in-flight attendance-taking attempt:
//! PROCESSING → READY_FOR_REVIEW → COMMITTED | DISCARDED
//!
//! A candidate still in PROCESSING may also be discarded (cancel while
//! ingesting, or a batch with no photos). Terminal states never change again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SessionType;
use crate::error::ReconcileError;
use crate::reconciler::RosterReview;

pub use rollcall_common::events::CandidateState;

/// Record of one lifecycle step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub candidate_id: Uuid,
    pub old_state: CandidateState,
    pub new_state: CandidateState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory, not yet persisted attendance session
#[derive(Debug, Clone)]
pub struct SessionCandidate {
    /// Server-issued identifier, also the sink's idempotency key
    pub candidate_id: Uuid,
    pub class_id: String,
    pub subject_id: Option<String>,
    pub session_name: String,
    pub session_type: SessionType,
    /// Photos in the ingested batch (0 until ingest finishes)
    pub photo_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    state: CandidateState,
    review: Option<RosterReview>,
}

impl SessionCandidate {
    /// New candidate in PROCESSING
    pub fn new(
        class_id: impl Into<String>,
        subject_id: Option<String>,
        session_name: impl Into<String>,
        session_type: SessionType,
    ) -> Self {
        let now = Utc::now();
        Self {
            candidate_id: Uuid::new_v4(),
            class_id: class_id.into(),
            subject_id,
            session_name: session_name.into(),
            session_type,
            photo_count: 0,
            created_at: now,
            updated_at: now,
            state: CandidateState::Processing,
            review: None,
        }
    }

    pub fn state(&self) -> CandidateState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `new_state` if the lifecycle allows it
    pub fn transition_to(
        &mut self,
        new_state: CandidateState,
    ) -> Result<StateTransition, ReconcileError> {
        if !self.state.can_transition_to(new_state) {
            return Err(self.invalid_state("transition"));
        }

        let now = Utc::now();
        let transition = StateTransition {
            candidate_id: self.candidate_id,
            old_state: self.state,
            new_state,
            transitioned_at: now,
        };
        self.state = new_state;
        self.updated_at = now;

        tracing::info!(
            candidate_id = %self.candidate_id,
            old_state = %transition.old_state,
            new_state = %transition.new_state,
            "Candidate state changed"
        );

        Ok(transition)
    }

    /// Install the reconciled review and move to READY_FOR_REVIEW
    pub fn begin_review(
        &mut self,
        photo_count: u32,
        review: RosterReview,
    ) -> Result<StateTransition, ReconcileError> {
        if self.state != CandidateState::Processing {
            return Err(self.invalid_state("begin review"));
        }

        let transition = self.transition_to(CandidateState::ReadyForReview)?;
        self.photo_count = photo_count;
        self.review = Some(review);
        Ok(transition)
    }

    /// Review state, if reconciliation has run
    ///
    /// Still readable after commit or discard.
    pub fn review(&self) -> Option<&RosterReview> {
        self.review.as_ref()
    }

    /// Mutable review state; only while READY_FOR_REVIEW
    pub fn review_mut(&mut self, operation: &'static str) -> Result<&mut RosterReview, ReconcileError> {
        if self.state != CandidateState::ReadyForReview {
            return Err(self.invalid_state(operation));
        }

        self.updated_at = Utc::now();
        // READY_FOR_REVIEW is only reachable through begin_review
        let missing = self.invalid_state(operation);
        self.review.as_mut().ok_or(missing)
    }

    /// Operator cancel (or failed ingest)
    pub fn discard(&mut self) -> Result<StateTransition, ReconcileError> {
        if self.state.is_terminal() {
            return Err(self.invalid_state("discard"));
        }
        self.transition_to(CandidateState::Discarded)
    }

    pub(crate) fn invalid_state(&self, operation: &'static str) -> ReconcileError {
        ReconcileError::InvalidState {
            candidate_id: self.candidate_id,
            state: self.state,
            operation,
        }
    }
}
