//! Collaborator traits
//!
//! The reconciliation core consumes two external collaborators:
//! - **RosterProvider**: who is enrolled in a class (optionally a subject)
//! - **AttendanceSink**: durable storage for committed sessions
//!
//! SQLite implementations live in [`crate::db`]; tests substitute fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CommitPayload, CommitReceipt, RosterStudent};

/// Source of the enrolled roster
///
/// # Example
/// ```rust,ignore
/// let roster = provider.enrolled_students("CS-1", Some("MATH")).await?;
/// ```
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// Enrolled students in roster order
    async fn enrolled_students(
        &self,
        class_id: &str,
        subject_id: Option<&str>,
    ) -> rollcall_common::Result<Vec<RosterStudent>>;
}

/// Storage sink failures
///
/// All variants leave the candidate reviewable; the commit may be retried.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Storage backend reported an error
    #[error("Storage error: {0}")]
    Storage(#[from] rollcall_common::Error),

    /// Storage refused the payload
    #[error("Rejected by storage: {0}")]
    Rejected(String),

    /// Storage temporarily unreachable
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable destination for committed attendance
///
/// Writes are keyed on `candidate_id`: writing the same candidate twice must
/// not create a second session.
#[async_trait]
pub trait AttendanceSink: Send + Sync {
    /// Persist the whole payload atomically
    async fn write_session(&self, payload: &CommitPayload) -> Result<CommitReceipt, SinkError>;
}
