//! rollcall-ar library interface
//!
//! Attendance reconciliation: ingest recognition results, merge evidence
//! across photos, reconcile against the class roster, let an operator review
//! and correct the selection, then commit it atomically.

pub mod aggregator;
pub mod api;
pub mod commit;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod reconciler;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, ReconcileError};

use axum::Router;
use chrono::{DateTime, Utc};
use rollcall_common::events::EventBus;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::commit::CommitCoordinator;
use crate::db::{SqliteAttendanceSink, SqliteRosterProvider};
use crate::models::SessionCandidate;
use crate::types::{AttendanceSink, RosterProvider};

/// One candidate in the in-memory store
///
/// The mutex serializes every request against the candidate. The token
/// cancels a commit that has not been dispatched yet.
#[derive(Clone)]
pub struct CandidateHandle {
    pub candidate: Arc<Mutex<SessionCandidate>>,
    pub cancel: CancellationToken,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Enrolled roster source
    pub roster: Arc<dyn RosterProvider>,
    /// Final write path
    pub commit_coordinator: CommitCoordinator,
    /// Candidates by ID; terminal candidates stay queryable
    pub candidates: Arc<RwLock<HashMap<Uuid, CandidateHandle>>>,
    /// Parent of every candidate cancellation token; cancelled on shutdown
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// State wired to the SQLite roster and sink
    pub fn new(db: SqlitePool, event_bus: EventBus, max_lock_wait_ms: u64) -> Self {
        let roster = Arc::new(SqliteRosterProvider::new(db.clone()));
        let sink = Arc::new(
            SqliteAttendanceSink::new(db.clone()).with_max_lock_wait_ms(max_lock_wait_ms),
        );
        Self::with_collaborators(db, event_bus, roster, sink)
    }

    /// State with explicit collaborators
    pub fn with_collaborators(
        db: SqlitePool,
        event_bus: EventBus,
        roster: Arc<dyn RosterProvider>,
        sink: Arc<dyn AttendanceSink>,
    ) -> Self {
        Self {
            db,
            event_bus,
            commit_coordinator: CommitCoordinator::new(roster.clone(), sink),
            roster,
            candidates: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a candidate; its cancellation token is a child of `shutdown`
    pub async fn insert_candidate(
        &self,
        id: Uuid,
        candidate: Arc<Mutex<SessionCandidate>>,
    ) -> CandidateHandle {
        let handle = CandidateHandle {
            candidate,
            cancel: self.shutdown.child_token(),
        };
        self.candidates.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn candidate(&self, id: Uuid) -> ApiResult<CandidateHandle> {
        self.candidates
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Candidate {}", id)))
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::candidate_routes())
        .merge(api::session_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
