//! Error types for rollcall-ar
//!
//! `ReconcileError` is the domain taxonomy of the reconciliation workflow.
//! `ApiError` maps it (and shared errors) onto HTTP responses with a stable
//! error code so clients can tell a stale roster from a storage failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CandidateState, StudentId};

/// Reconciliation workflow errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The engine reported no photos; the batch is aborted before aggregation
    #[error("No photos processed in batch")]
    NoPhotosProcessed,

    /// The approval references students that are not on the candidate roster
    #[error("Roster changed since preview; unknown students: {}", join_ids(.student_ids))]
    StaleRosterReference { student_ids: Vec<StudentId> },

    /// The storage sink rejected or failed the write; safe to retry
    #[error("Commit failed: {reason}")]
    CommitFailed { reason: String },

    /// Status outside present|absent|medical|authorized
    #[error("Invalid attendance status: {0:?}")]
    InvalidStatusValue(String),

    /// Cancellation observed before the write was dispatched
    #[error("Commit cancelled before dispatch")]
    CommitCancelled,

    /// Operation not allowed in the candidate's current state
    #[error("Cannot {operation} candidate {candidate_id} in state {state}")]
    InvalidState {
        candidate_id: Uuid,
        state: CandidateState,
        operation: &'static str,
    },

    /// Client-supplied student ID with an unrecognized format
    #[error("Invalid student id: {0:?}")]
    InvalidStudentId(String),
}

impl ReconcileError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::NoPhotosProcessed => "NO_PHOTOS_PROCESSED",
            ReconcileError::StaleRosterReference { .. } => "STALE_ROSTER_REFERENCE",
            ReconcileError::CommitFailed { .. } => "COMMIT_FAILED",
            ReconcileError::InvalidStatusValue(_) => "INVALID_STATUS_VALUE",
            ReconcileError::CommitCancelled => "COMMIT_CANCELLED",
            ReconcileError::InvalidState { .. } => "INVALID_STATE",
            ReconcileError::InvalidStudentId(_) => "INVALID_STUDENT_ID",
        }
    }

    /// HTTP status the API answers with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ReconcileError::NoPhotosProcessed => StatusCode::UNPROCESSABLE_ENTITY,
            ReconcileError::StaleRosterReference { .. } => StatusCode::CONFLICT,
            ReconcileError::CommitFailed { .. } => StatusCode::BAD_GATEWAY,
            ReconcileError::InvalidStatusValue(_) => StatusCode::BAD_REQUEST,
            ReconcileError::CommitCancelled => StatusCode::CONFLICT,
            ReconcileError::InvalidState { .. } => StatusCode::CONFLICT,
            ReconcileError::InvalidStudentId(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn join_ids(ids: &[StudentId]) -> String {
    ids.iter().map(StudentId::as_str).collect::<Vec<_>>().join(", ")
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Reconciliation workflow error
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// rollcall-common error
    #[error("Common error: {0}")]
    Common(#[from] rollcall_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;

        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Reconcile(err) => {
                if let ReconcileError::StaleRosterReference { student_ids } = &err {
                    details = Some(json!({ "studentIds": student_ids }));
                }
                (err.status_code(), err.code(), err.to_string())
            }
            ApiError::Common(rollcall_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(rollcall_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let mut error = json!({
            "code": error_code,
            "message": message,
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_and_storage_errors_are_distinguishable() {
        let stale = ReconcileError::StaleRosterReference {
            student_ids: vec![StudentId::parse("A").unwrap(), StudentId::parse("B").unwrap()],
        };
        let failed = ReconcileError::CommitFailed {
            reason: "disk full".to_string(),
        };

        assert_ne!(stale.code(), failed.code());
        assert_ne!(stale.status_code(), failed.status_code());
        assert_eq!(stale.status_code(), StatusCode::CONFLICT);
        assert_eq!(failed.status_code(), StatusCode::BAD_GATEWAY);
        assert!(stale.to_string().contains("A, B"));
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::from(ReconcileError::NoPhotosProcessed), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ApiError::from(ReconcileError::InvalidStatusValue("late".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(rollcall_common::Error::InvalidInput("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(rollcall_common::Error::Internal("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
