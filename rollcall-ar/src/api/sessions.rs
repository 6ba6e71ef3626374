//! Committed session read-back
//!
//! GET /sessions/:candidate_id

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    db::load_committed_session,
    error::{ApiError, ApiResult},
    models::CommittedSession,
    AppState,
};

/// GET /sessions/:candidate_id
///
/// Durable attendance written by a successful commit.
pub async fn get_session(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> ApiResult<Json<CommittedSession>> {
    load_committed_session(&state.db, candidate_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!("No committed session for candidate {}", candidate_id))
        })
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/sessions/:candidate_id", get(get_session))
}
