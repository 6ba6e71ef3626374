//! Commit coordinator
//!
//! Turns a reviewed candidate into one atomic write:
//! 1. Reload the roster and validate the approval against both the candidate
//!    roster and the current one (stale IDs fail, nothing is written)
//! 2. Build one record per roster entry
//! 3. Honor cancellation up to dispatch
//! 4. Dispatch to the sink; after this point cancellation is ignored
//! 5. Failure leaves the candidate READY_FOR_REVIEW; success commits it

use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ReconcileError;
use crate::models::{
    Approval, CandidateState, CommitPayload, CommitReceipt, CommitRecord, RosterEntry,
    SessionCandidate, StateTransition, StudentId,
};
use crate::reconciler::{resolve_status, RosterReview};
use crate::types::{AttendanceSink, RosterProvider};

/// Successful commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub receipt: CommitReceipt,
    pub transition: StateTransition,
}

/// Validates approvals and performs the final write
#[derive(Clone)]
pub struct CommitCoordinator {
    roster: Arc<dyn RosterProvider>,
    sink: Arc<dyn AttendanceSink>,
}

impl CommitCoordinator {
    pub fn new(roster: Arc<dyn RosterProvider>, sink: Arc<dyn AttendanceSink>) -> Self {
        Self { roster, sink }
    }

    /// Commit a candidate
    ///
    /// `approval` is the operator's final selection as submitted by the
    /// client; `None` commits the candidate's own review state. A submitted
    /// approval replaces the review state only once the write succeeds.
    pub async fn commit(
        &self,
        candidate: &mut SessionCandidate,
        approval: Option<Approval>,
        cancel: &CancellationToken,
    ) -> Result<CommitOutcome, ReconcileError> {
        if candidate.state() != CandidateState::ReadyForReview {
            return Err(candidate.invalid_state("commit"));
        }

        // The roster may have changed since the candidate was previewed
        let enrolled: HashSet<StudentId> = match self
            .roster
            .enrolled_students(&candidate.class_id, candidate.subject_id.as_deref())
            .await
        {
            Ok(roster) => roster.into_iter().map(|s| s.student_id).collect(),
            Err(err) => {
                error!(
                    candidate_id = %candidate.candidate_id,
                    error = %err,
                    "Roster reload failed; candidate remains reviewable"
                );
                return Err(ReconcileError::CommitFailed {
                    reason: format!("Roster unavailable: {}", err),
                });
            }
        };

        let review = candidate
            .review()
            .ok_or_else(|| candidate.invalid_state("commit"))?;

        let client_supplied = approval.is_some();
        let approval = approval.unwrap_or_else(|| review.approval());

        if let Err(err) = validate_approval(review, &approval, &enrolled) {
            warn!(
                candidate_id = %candidate.candidate_id,
                error = %err,
                "Commit rejected: stale roster reference"
            );
            return Err(err);
        }

        let payload = build_payload(candidate, review, &approval);

        if cancel.is_cancelled() {
            warn!(candidate_id = %candidate.candidate_id, "Commit cancelled before dispatch");
            return Err(ReconcileError::CommitCancelled);
        }

        // Dispatched: run to completion regardless of cancellation
        let receipt = match self.sink.write_session(&payload).await {
            Ok(receipt) => receipt,
            Err(err) => {
                error!(
                    candidate_id = %candidate.candidate_id,
                    error = %err,
                    "Attendance sink failed; candidate remains reviewable"
                );
                return Err(ReconcileError::CommitFailed {
                    reason: err.to_string(),
                });
            }
        };

        if client_supplied {
            // Validated above against this same roster
            candidate.review_mut("commit")?.adopt(approval);
        }
        let transition = candidate.transition_to(CandidateState::Committed)?;

        info!(
            candidate_id = %candidate.candidate_id,
            session_id = %receipt.session_id,
            record_count = receipt.record_count,
            already_committed = receipt.already_committed,
            "Attendance committed"
        );

        Ok(CommitOutcome {
            receipt,
            transition,
        })
    }
}

/// Every selected or overridden ID must be on the candidate roster, and
/// every student the payload would cover must still be enrolled
pub fn validate_approval(
    review: &RosterReview,
    approval: &Approval,
    enrolled: &HashSet<StudentId>,
) -> Result<(), ReconcileError> {
    let withdrawn = review
        .entries()
        .iter()
        .map(RosterEntry::student_id)
        .filter(|id| !enrolled.contains(*id));

    let mut unknown: Vec<StudentId> = approval
        .referenced_ids()
        .filter(|id| !review.is_on_roster(id))
        .chain(withdrawn)
        .cloned()
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }

    unknown.sort();
    unknown.dedup();
    Err(ReconcileError::StaleRosterReference {
        student_ids: unknown,
    })
}

/// One record per roster entry, in roster order
///
/// Status: override, else present if selected, else absent.
pub fn build_payload(
    candidate: &SessionCandidate,
    review: &RosterReview,
    approval: &Approval,
) -> CommitPayload {
    let records = review
        .entries()
        .iter()
        .map(|entry| CommitRecord {
            student_id: entry.student_id().clone(),
            status: resolve_status(
                entry.student_id(),
                &approval.present_selection,
                &approval.status_overrides,
            ),
            detected: entry.is_detected(),
            confidence: entry.evidence.as_ref().map(|e| e.confidence()),
        })
        .collect();

    CommitPayload {
        candidate_id: candidate.candidate_id,
        class_id: candidate.class_id.clone(),
        subject_id: candidate.subject_id.clone(),
        session_name: candidate.session_name.clone(),
        session_type: candidate.session_type,
        photo_count: candidate.photo_count,
        taken_at: candidate.created_at,
        records,
    }
}
