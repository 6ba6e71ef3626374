//! Candidate review API
//!
//! - POST   /candidates: create from engine output, returns the review view
//! - GET    /candidates/:id
//! - POST   /candidates/:id/toggle `{ studentId }`
//! - POST   /candidates/:id/status `{ studentId, status }`
//! - DELETE /candidates/:id/status/:student_id
//! - POST   /candidates/:id/select-all, /deselect-all, /reset, /refresh-roster
//! - POST   /candidates/:id/commit, optional `{ presentStudentIds, statusOverrides }`
//! - DELETE /candidates/:id: discard

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rollcall_common::events::{CandidateState, RollcallEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    aggregator::{aggregate, compare_for_display},
    error::{ApiError, ApiResult, ReconcileError},
    ingest::{ingest, IngestReport},
    models::{
        AggregatedEvidence, Approval, AttendanceStatus, EngineOutput, SessionCandidate,
        SessionType, StateTransition, StudentId,
    },
    reconciler::{ReviewStatistics, RosterRefresh, RosterReview},
    AppState,
};

// ============================================================================
// Requests
// ============================================================================

/// POST /candidates request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCandidateRequest {
    pub class_id: String,
    #[serde(default)]
    pub subject_id: Option<String>,
    pub session_name: String,
    #[serde(default)]
    pub session_type: SessionType,
    pub engine_output: EngineOutput,
}

/// POST /candidates/:id/toggle request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub student_id: String,
}

/// POST /candidates/:id/status request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub student_id: String,
    pub status: String,
}

/// POST /candidates/:id/commit request body (optional)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub present_student_ids: Vec<String>,
    #[serde(default)]
    pub status_overrides: HashMap<String, String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Review view of a candidate
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub candidate_id: Uuid,
    pub class_id: String,
    pub subject_id: Option<String>,
    pub session_name: String,
    pub session_type: SessionType,
    pub photo_count: u32,
    pub state: CandidateState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Roster order
    pub entries: Vec<EntryView>,
    /// On-roster evidence, strongest first
    pub ranked_detections: Vec<AggregatedEvidence>,
    pub statistics: Option<ReviewStatistics>,
    /// Only on the create response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestReport>,
    /// Only on the refresh-roster response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster_changes: Option<RosterRefresh>,
}

/// One roster entry as the operator sees it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub student_id: StudentId,
    pub name: String,
    pub roll_number: String,
    pub is_detected: bool,
    pub is_selected: bool,
    /// Detected in every photo
    pub fully_corroborated: bool,
    pub status_override: Option<AttendanceStatus>,
    pub effective_status: AttendanceStatus,
    pub evidence: Option<AggregatedEvidence>,
}

impl CandidateView {
    pub fn from_candidate(candidate: &SessionCandidate) -> Self {
        let review = candidate.review();

        let entries = review.map(entry_views).unwrap_or_default();

        let ranked_detections = review
            .map(|review| {
                let mut ranked: Vec<AggregatedEvidence> = review
                    .entries()
                    .iter()
                    .filter_map(|entry| entry.evidence.clone())
                    .collect();
                ranked.sort_by(compare_for_display);
                ranked
            })
            .unwrap_or_default();

        Self {
            candidate_id: candidate.candidate_id,
            class_id: candidate.class_id.clone(),
            subject_id: candidate.subject_id.clone(),
            session_name: candidate.session_name.clone(),
            session_type: candidate.session_type,
            photo_count: candidate.photo_count,
            state: candidate.state(),
            created_at: candidate.created_at,
            updated_at: candidate.updated_at,
            entries,
            ranked_detections,
            statistics: review.map(RosterReview::statistics),
            ingest: None,
            roster_changes: None,
        }
    }
}

fn entry_views(review: &RosterReview) -> Vec<EntryView> {
    review
        .entries()
        .iter()
        .map(|entry| {
            let id = entry.student_id();
            EntryView {
                student_id: id.clone(),
                name: entry.student.name.clone(),
                roll_number: entry.student.roll_number.clone(),
                is_detected: entry.is_detected(),
                is_selected: review.is_selected(id),
                fully_corroborated: entry
                    .evidence
                    .as_ref()
                    .is_some_and(|e| e.is_fully_corroborated(review.photo_count())),
                status_override: review.status_overrides().get(id).copied(),
                effective_status: review
                    .effective_status(id)
                    .unwrap_or(AttendanceStatus::Absent),
                evidence: entry.evidence.clone(),
            }
        })
        .collect()
}

/// POST /candidates/:id/commit response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub candidate_id: Uuid,
    pub session_id: Uuid,
    pub state: CandidateState,
    pub record_count: usize,
    pub already_committed: bool,
    pub committed_at: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /candidates
///
/// Ingest → aggregate → load roster → reconcile. A batch with no photos
/// discards the candidate and answers 422.
pub async fn create_candidate(
    State(state): State<AppState>,
    Json(request): Json<CreateCandidateRequest>,
) -> ApiResult<(StatusCode, Json<CandidateView>)> {
    if request.class_id.trim().is_empty() {
        return Err(ApiError::BadRequest("classId must not be empty".to_string()));
    }

    let candidate = SessionCandidate::new(
        request.class_id,
        request.subject_id,
        request.session_name,
        request.session_type,
    );
    let candidate_id = candidate.candidate_id;
    let handle = state
        .insert_candidate(candidate_id, Arc::new(Mutex::new(candidate)))
        .await;
    let mut candidate = handle.candidate.lock().await;

    info!(
        candidate_id = %candidate_id,
        class_id = %candidate.class_id,
        "Candidate created"
    );
    state.event_bus.emit_lossy(RollcallEvent::CandidateCreated {
        candidate_id,
        class_id: candidate.class_id.clone(),
        photo_count: request.engine_output.photos_processed,
        timestamp: Utc::now(),
    });

    let batch = match ingest(&request.engine_output) {
        Ok(batch) => batch,
        Err(err) => {
            discard_failed(&state, &mut candidate, &err.to_string()).await;
            return Err(err.into());
        }
    };

    let evidence = aggregate(&batch.detections);

    let loaded = state
        .roster
        .enrolled_students(&candidate.class_id, candidate.subject_id.as_deref())
        .await;
    let roster = match loaded {
        Ok(roster) => roster,
        Err(err) => {
            discard_failed(&state, &mut candidate, &err.to_string()).await;
            return Err(err.into());
        }
    };

    let review = RosterReview::new(roster, evidence, batch.photo_count());
    let transition = candidate.begin_review(batch.photo_count(), review)?;
    emit_transition(&state, &transition);

    let mut view = CandidateView::from_candidate(&candidate);
    view.ingest = Some(batch.report);

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /candidates/:id
pub async fn get_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CandidateView>> {
    let handle = state.candidate(id).await?;
    let candidate = handle.candidate.lock().await;
    Ok(Json(CandidateView::from_candidate(&candidate)))
}

/// POST /candidates/:id/toggle
pub async fn toggle_student(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<Json<CandidateView>> {
    let student_id = StudentId::parse(&request.student_id)?;
    mutate_review(&state, id, "toggle student", |review| {
        review.toggle_student(&student_id);
        Ok(())
    })
    .await
}

/// POST /candidates/:id/status
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<Json<CandidateView>> {
    let student_id = StudentId::parse(&request.student_id)?;
    mutate_review(&state, id, "set status", |review| {
        review.set_status(&student_id, &request.status).map(|_| ())
    })
    .await
}

/// DELETE /candidates/:id/status/:student_id
pub async fn clear_status(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<CandidateView>> {
    let student_id = StudentId::parse(&student_id)?;
    mutate_review(&state, id, "clear status", |review| {
        review.clear_status(&student_id);
        Ok(())
    })
    .await
}

/// POST /candidates/:id/select-all
pub async fn select_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CandidateView>> {
    mutate_review(&state, id, "select all", |review| {
        review.select_all();
        Ok(())
    })
    .await
}

/// POST /candidates/:id/deselect-all
pub async fn deselect_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CandidateView>> {
    mutate_review(&state, id, "deselect all", |review| {
        review.deselect_all();
        Ok(())
    })
    .await
}

/// POST /candidates/:id/reset
pub async fn reset_to_detected(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CandidateView>> {
    mutate_review(&state, id, "reset to detected", |review| {
        review.reset_to_detected();
        Ok(())
    })
    .await
}

/// POST /candidates/:id/refresh-roster
///
/// Reloads the roster from the provider; stale selections and overrides are
/// dropped silently.
pub async fn refresh_roster(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CandidateView>> {
    let handle = state.candidate(id).await?;
    let mut candidate = handle.candidate.lock().await;

    // Fail fast on a candidate that cannot be edited
    candidate.review_mut("refresh roster")?;

    let roster = state
        .roster
        .enrolled_students(&candidate.class_id, candidate.subject_id.as_deref())
        .await?;

    let changes = candidate.review_mut("refresh roster")?.refresh_roster(roster);
    info!(
        candidate_id = %id,
        added = changes.added.len(),
        removed = changes.removed.len(),
        "Candidate roster refreshed"
    );
    emit_selection_changed(&state, &candidate);

    let mut view = CandidateView::from_candidate(&candidate);
    view.roster_changes = Some(changes);
    Ok(Json(view))
}

/// POST /candidates/:id/commit
///
/// Without a body the candidate's own review state is committed.
pub async fn commit_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<CommitResponse>> {
    let approval = parse_commit_body(&body)?;

    let handle = state.candidate(id).await?;
    let mut candidate = handle.candidate.lock().await;

    match state
        .commit_coordinator
        .commit(&mut candidate, approval, &handle.cancel)
        .await
    {
        Ok(outcome) => {
            emit_transition(&state, &outcome.transition);
            state.event_bus.emit_lossy(RollcallEvent::AttendanceCommitted {
                candidate_id: id,
                session_id: outcome.receipt.session_id,
                record_count: outcome.receipt.record_count,
                already_committed: outcome.receipt.already_committed,
                timestamp: Utc::now(),
            });

            Ok(Json(CommitResponse {
                candidate_id: id,
                session_id: outcome.receipt.session_id,
                state: candidate.state(),
                record_count: outcome.receipt.record_count,
                already_committed: outcome.receipt.already_committed,
                committed_at: outcome.receipt.committed_at,
            }))
        }
        Err(err) => {
            if matches!(err, ReconcileError::CommitFailed { .. }) {
                state.record_error(err.to_string()).await;
            }
            state.event_bus.emit_lossy(RollcallEvent::CommitRejected {
                candidate_id: id,
                reason_code: err.code().to_string(),
                message: err.to_string(),
                timestamp: Utc::now(),
            });
            Err(err.into())
        }
    }
}

/// DELETE /candidates/:id
///
/// Cancels any commit not yet dispatched, then discards.
pub async fn discard_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CandidateView>> {
    let handle = state.candidate(id).await?;
    handle.cancel.cancel();

    let mut candidate = handle.candidate.lock().await;
    let transition = candidate.discard()?;
    emit_transition(&state, &transition);

    Ok(Json(CandidateView::from_candidate(&candidate)))
}

/// Build candidate routes
pub fn candidate_routes() -> Router<AppState> {
    Router::new()
        .route("/candidates", post(create_candidate))
        .route(
            "/candidates/:id",
            get(get_candidate).delete(discard_candidate),
        )
        .route("/candidates/:id/toggle", post(toggle_student))
        .route("/candidates/:id/status", post(set_status))
        .route("/candidates/:id/status/:student_id", delete(clear_status))
        .route("/candidates/:id/select-all", post(select_all))
        .route("/candidates/:id/deselect-all", post(deselect_all))
        .route("/candidates/:id/reset", post(reset_to_detected))
        .route("/candidates/:id/refresh-roster", post(refresh_roster))
        .route("/candidates/:id/commit", post(commit_candidate))
}

// ============================================================================
// Helpers
// ============================================================================

/// Run one review mutation under the candidate lock
async fn mutate_review<F>(
    state: &AppState,
    id: Uuid,
    operation: &'static str,
    mutation: F,
) -> ApiResult<Json<CandidateView>>
where
    F: FnOnce(&mut RosterReview) -> Result<(), ReconcileError>,
{
    let handle = state.candidate(id).await?;
    let mut candidate = handle.candidate.lock().await;

    mutation(candidate.review_mut(operation)?)?;

    debug!(candidate_id = %id, operation, "Review updated");
    emit_selection_changed(state, &candidate);

    Ok(Json(CandidateView::from_candidate(&candidate)))
}

fn parse_commit_body(body: &[u8]) -> ApiResult<Option<Approval>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let request: CommitRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid commit body: {}", e)))?;

    Ok(Some(Approval::from_raw(
        request.present_student_ids,
        request.status_overrides,
    )?))
}

async fn discard_failed(state: &AppState, candidate: &mut SessionCandidate, reason: &str) {
    warn!(
        candidate_id = %candidate.candidate_id,
        reason,
        "Candidate discarded during processing"
    );
    state.record_error(reason).await;

    if let Ok(transition) = candidate.discard() {
        emit_transition(state, &transition);
    }
}

fn emit_transition(state: &AppState, transition: &StateTransition) {
    state.event_bus.emit_lossy(RollcallEvent::CandidateStateChanged {
        candidate_id: transition.candidate_id,
        old_state: transition.old_state,
        new_state: transition.new_state,
        timestamp: transition.transitioned_at,
    });
}

fn emit_selection_changed(state: &AppState, candidate: &SessionCandidate) {
    if let Some(review) = candidate.review() {
        state.event_bus.emit_lossy(RollcallEvent::SelectionChanged {
            candidate_id: candidate.candidate_id,
            counts: review.statistics().counts(),
            timestamp: Utc::now(),
        });
    }
}
