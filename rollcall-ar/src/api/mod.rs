//! HTTP API handlers for rollcall-ar
//!
//! JSON over REST for the review workflow, plus SSE for live updates.

pub mod candidates;
pub mod health;
pub mod sessions;
pub mod sse;

pub use candidates::candidate_routes;
pub use health::health_routes;
pub use sessions::session_routes;
pub use sse::event_stream;
