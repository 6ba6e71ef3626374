//! Server-Sent Events stream of reconciliation events

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams every `RollcallEvent`: candidate creation, state changes,
/// selection changes, commits and rejected commits.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    rollcall_common::sse::create_event_sse_stream("rollcall-ar", state.event_bus.subscribe())
}
