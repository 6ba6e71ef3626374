//! HTTP API integration tests
//!
//! Drives the router with tower's `oneshot`; no listener is bound.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{create_test_db, seed_class, student, ScriptedSink, StaticRoster};
use rollcall_ar::AppState;
use rollcall_common::db::init_memory_database;
use rollcall_common::events::{EventBus, RollcallEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

struct TestApp {
    app: Router,
    state: AppState,
    roster: Arc<StaticRoster>,
    sink: Arc<ScriptedSink>,
}

async fn create_test_app(roster_ids: &[&str], sink: ScriptedSink) -> TestApp {
    let pool = init_memory_database().await.expect("in-memory database");
    let roster = Arc::new(StaticRoster::new(roster_ids));
    let sink = Arc::new(sink);

    let state = AppState::with_collaborators(
        pool,
        EventBus::new(100),
        roster.clone(),
        sink.clone(),
    );

    TestApp {
        app: rollcall_ar::build_router(state.clone()),
        state,
        roster,
        sink,
    }
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn create_body(photos: Value) -> Value {
    let photos_processed = photos.as_array().map(|p| p.len()).unwrap_or(0);
    json!({
        "classId": "CS-1",
        "subjectId": "MATH",
        "sessionName": "Period 3",
        "sessionType": "extra",
        "engineOutput": {
            "photosProcessed": photos_processed,
            "photos": photos,
        }
    })
}

/// Create a candidate with S1 and S3 detected; returns its ID
async fn create_reviewed(test: &TestApp) -> String {
    let body = create_body(json!([
        { "photoIndex": 0, "detections": [
            { "studentId": "S1", "confidence": 0.92 },
            { "studentId": "S3", "confidence": 0.55 },
        ]},
        { "photoIndex": 1, "detections": [
            { "studentId": "S1", "confidence": 0.88 },
        ]},
    ]));

    let (status, json) = send(&test.app, "POST", "/candidates", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["candidateId"].as_str().unwrap().to_string()
}

fn selected_ids(view: &Value) -> Vec<String> {
    view["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["isSelected"].as_bool().unwrap())
        .map(|e| e["studentId"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;

    let (status, json) = send(&test.app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "rollcall-ar");
    assert_eq!(json["candidates"], 0);
    assert!(json["uptimeSeconds"].is_u64());
    // Omitted until something fails
    assert!(json.get("lastError").is_none());
    assert!(json.get("last_error").is_none());
}

#[tokio::test]
async fn test_create_candidate_reconciles_roster() {
    let test = create_test_app(&["S1", "S2", "S3", "S4"], ScriptedSink::new()).await;
    let mut events = test.state.event_bus.subscribe();

    let body = create_body(json!([
        { "photoIndex": 0, "detections": [
            { "studentId": "S3", "confidence": 0.55 },
            { "studentId": "S1", "confidence": 0.92 },
            { "studentId": "bad id", "confidence": 0.9 },
            { "studentId": "S2", "confidence": 0.0 },
        ]},
        { "photoIndex": 1, "detections": [
            { "studentId": "S1", "confidence": 0.88 },
        ]},
    ]));
    let (status, view) = send(&test.app, "POST", "/candidates", Some(body)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["state"], "readyForReview");
    assert_eq!(view["sessionType"], "extra");
    assert_eq!(view["photoCount"], 2);
    assert_eq!(view["entries"].as_array().unwrap().len(), 4);
    assert_eq!(selected_ids(&view), vec!["S1", "S3"]);
    assert_eq!(view["ingest"]["accepted"], 3);
    assert_eq!(view["ingest"]["discardedConfidence"], 1);
    assert_eq!(view["ingest"]["discardedStudentId"], 1);

    let stats = &view["statistics"];
    assert_eq!(stats["totalEnrolled"], 4);
    assert_eq!(stats["totalDetected"], 2);
    assert_eq!(stats["totalSelected"], 2);
    assert_eq!(stats["fullyCorroborated"], 1);

    let s1 = &view["entries"][0];
    assert_eq!(s1["isDetected"], true);
    assert_eq!(s1["fullyCorroborated"], true);
    assert_eq!(s1["effectiveStatus"], "present");
    assert_eq!(s1["evidence"]["detectionCount"], 2);
    assert_eq!(view["entries"][1]["evidence"], Value::Null);
    assert_eq!(view["entries"][1]["effectiveStatus"], "absent");

    let ranked: Vec<&str> = view["rankedDetections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["studentId"].as_str().unwrap())
        .collect();
    assert_eq!(ranked, vec!["S1", "S3"]);

    assert!(matches!(
        events.recv().await.unwrap(),
        RollcallEvent::CandidateCreated { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        RollcallEvent::CandidateStateChanged { .. }
    ));
}

#[tokio::test]
async fn test_no_photos_rejected_and_discarded() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;

    let (status, json) = send(&test.app, "POST", "/candidates", Some(create_body(json!([])))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["code"], "NO_PHOTOS_PROCESSED");

    let candidates = test.state.candidates.read().await;
    assert_eq!(candidates.len(), 1);
    let handle = candidates.values().next().unwrap();
    assert_eq!(
        handle.candidate.lock().await.state(),
        rollcall_ar::models::CandidateState::Discarded
    );
}

#[tokio::test]
async fn test_empty_class_id_rejected() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;
    let mut body = create_body(json!([{ "photoIndex": 0, "detections": [] }]));
    body["classId"] = json!("  ");

    let (status, json) = send(&test.app, "POST", "/candidates", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_review_mutations() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;
    let base = format!("/candidates/{}", id);

    let (status, view) = send(
        &test.app,
        "POST",
        &format!("{}/toggle", base),
        Some(json!({ "studentId": "S2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(selected_ids(&view), vec!["S1", "S2", "S3"]);
    assert_eq!(view["statistics"]["manuallyAdded"], 1);

    let (status, view) = send(
        &test.app,
        "POST",
        &format!("{}/status", base),
        Some(json!({ "studentId": "S3", "status": "medical" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["entries"][2]["statusOverride"], "medical");
    assert_eq!(view["entries"][2]["effectiveStatus"], "medical");
    assert_eq!(view["statistics"]["statusTally"]["medical"], 1);

    let (_, view) = send(&test.app, "POST", &format!("{}/deselect-all", base), None).await;
    assert!(selected_ids(&view).is_empty());

    let (_, view) = send(&test.app, "POST", &format!("{}/select-all", base), None).await;
    assert_eq!(selected_ids(&view).len(), 3);

    let (_, view) = send(&test.app, "POST", &format!("{}/reset", base), None).await;
    assert_eq!(selected_ids(&view), vec!["S1", "S3"]);
    // Reset leaves overrides alone
    assert_eq!(view["entries"][2]["statusOverride"], "medical");

    let (status, view) =
        send(&test.app, "DELETE", &format!("{}/status/S3", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["entries"][2]["statusOverride"], Value::Null);
    assert_eq!(view["entries"][2]["effectiveStatus"], "present");

    let (status, fetched) = send(&test.app, "GET", &base, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["entries"], view["entries"]);
}

#[tokio::test]
async fn test_invalid_status_rejected() {
    let test = create_test_app(&["S1", "S2"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    let (status, json) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/status", id),
        Some(json!({ "studentId": "S1", "status": "late" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_STATUS_VALUE");

    let (_, view) = send(&test.app, "GET", &format!("/candidates/{}", id), None).await;
    assert_eq!(view["entries"][0]["statusOverride"], Value::Null);
}

#[tokio::test]
async fn test_malformed_student_id_rejected() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    let (status, json) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/toggle", id),
        Some(json!({ "studentId": "no spaces allowed" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_STUDENT_ID");
}

#[tokio::test]
async fn test_unknown_candidate_404() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;
    let uri = format!("/candidates/{}", uuid::Uuid::new_v4());

    let (status, json) = send(&test.app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&test.app, "POST", &format!("{}/commit", uri), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_commit_own_state() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;
    let mut events = test.state.event_bus.subscribe();

    let (status, json) = send(&test.app, "POST", &format!("/candidates/{}/commit", id), None).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["state"], "committed");
    assert_eq!(json["recordCount"], 3);
    assert_eq!(json["alreadyCommitted"], false);

    let candidate_id = uuid::Uuid::parse_str(&id).unwrap();
    let payload = test.sink.committed(candidate_id).unwrap();
    assert_eq!(payload.class_id, "CS-1");
    assert_eq!(payload.subject_id.as_deref(), Some("MATH"));

    assert!(matches!(
        events.recv().await.unwrap(),
        RollcallEvent::CandidateStateChanged { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        RollcallEvent::AttendanceCommitted { record_count: 3, .. }
    ));

    // Terminal: no more edits or commits
    let (status, json) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/toggle", id),
        Some(json!({ "studentId": "S2" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "INVALID_STATE");

    let (status, _) = send(&test.app, "POST", &format!("/candidates/{}/commit", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(test.sink.attempts().len(), 1);
}

#[tokio::test]
async fn test_commit_with_client_approval() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    let (status, _) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/commit", id),
        Some(json!({
            "presentStudentIds": ["S2"],
            "statusOverrides": { "S3": "authorized" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let payload = test
        .sink
        .committed(uuid::Uuid::parse_str(&id).unwrap())
        .unwrap();
    let statuses: Vec<(String, String)> = payload
        .records
        .iter()
        .map(|r| (r.student_id.to_string(), r.status.to_string()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("S1".to_string(), "absent".to_string()),
            ("S2".to_string(), "present".to_string()),
            ("S3".to_string(), "authorized".to_string()),
        ]
    );

    // The committed view reflects what was approved
    let (_, view) = send(&test.app, "GET", &format!("/candidates/{}", id), None).await;
    assert_eq!(view["state"], "committed");
    assert_eq!(selected_ids(&view), vec!["S2"]);
}

#[tokio::test]
async fn test_stale_commit_rejected_without_write() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    let (status, json) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/commit", id),
        Some(json!({ "presentStudentIds": ["S1", "S9"] })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "STALE_ROSTER_REFERENCE");
    assert_eq!(json["error"]["details"]["studentIds"], json!(["S9"]));
    assert!(test.sink.attempts().is_empty());

    let (_, view) = send(&test.app, "GET", &format!("/candidates/{}", id), None).await;
    assert_eq!(view["state"], "readyForReview");
}

#[tokio::test]
async fn test_commit_after_roster_shrinks_is_stale() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    test.roster.replace(&["S1", "S2"]);
    let (status, json) = send(&test.app, "POST", &format!("/candidates/{}/commit", id), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "STALE_ROSTER_REFERENCE");
    assert_eq!(json["error"]["details"]["studentIds"], json!(["S3"]));
    assert!(test.sink.attempts().is_empty());

    // Refresh drops S3, after which the same commit succeeds
    let (status, _) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/refresh-roster", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&test.app, "POST", &format!("/candidates/{}/commit", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["recordCount"], 2);
}

#[tokio::test]
async fn test_failed_commit_is_retryable() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::failing(&["timeout"])).await;
    let id = create_reviewed(&test).await;
    let uri = format!("/candidates/{}/commit", id);

    let (status, json) = send(&test.app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "COMMIT_FAILED");

    let (_, health) = send(&test.app, "GET", "/health", None).await;
    assert!(health["lastError"].as_str().unwrap().contains("timeout"));

    let (_, view) = send(&test.app, "GET", &format!("/candidates/{}", id), None).await;
    assert_eq!(view["state"], "readyForReview");

    let (status, json) = send(&test.app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["recordCount"], 3);
    assert_eq!(test.sink.committed_count(), 1);
}

#[tokio::test]
async fn test_refresh_roster_drops_stale_selection() {
    let test = create_test_app(&["S1", "S2", "S3"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    test.roster.replace(&["S1", "S2", "S4"]);
    let (status, view) = send(
        &test.app,
        "POST",
        &format!("/candidates/{}/refresh-roster", id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["rosterChanges"]["added"], json!(["S4"]));
    assert_eq!(view["rosterChanges"]["removed"], json!(["S3"]));
    assert_eq!(selected_ids(&view), vec!["S1"]);
    assert_eq!(view["statistics"]["totalEnrolled"], 3);
}

#[tokio::test]
async fn test_discard_candidate() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;
    let uri = format!("/candidates/{}", id);

    let (status, view) = send(&test.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "discarded");

    let (status, json) = send(&test.app, "POST", &format!("{}/commit", uri), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "INVALID_STATE");

    let (status, _) = send(&test.app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(test.sink.attempts().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_pending_commit() {
    let test = create_test_app(&["S1"], ScriptedSink::new()).await;
    let id = create_reviewed(&test).await;

    test.state.shutdown.cancel();
    let (status, json) = send(&test.app, "POST", &format!("/candidates/{}/commit", id), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "COMMIT_CANCELLED");
    assert!(test.sink.attempts().is_empty());
}

#[tokio::test]
async fn test_sqlite_backed_commit_and_read_back() {
    let (_dir, pool) = create_test_db().await;
    seed_class(&pool, "CS-1", &[student("S1"), student("S2"), student("S3")]).await;
    let state = AppState::new(pool, EventBus::new(16), 1000);
    let app = rollcall_ar::build_router(state);

    let body = create_body(json!([
        { "photoIndex": 0, "detections": [{ "studentId": "S2", "confidence": 0.7 }] },
    ]));
    let (status, view) = send(&app, "POST", "/candidates", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = view["candidateId"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, receipt) = send(&app, "POST", &format!("/candidates/{}/commit", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, session) = send(&app, "GET", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["sessionId"], receipt["sessionId"]);
    assert_eq!(session["sessionType"], "extra");
    let statuses: Vec<&str> = session["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["absent", "present", "absent"]);
}
