//! Event types for the Rollcall event system
//!
//! Provides shared event definitions and EventBus for all Rollcall services.

mod candidate_types;

pub use candidate_types::{CandidateState, ReviewCounts};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Rollcall event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RollcallEvent {
    /// A candidate was created from an uploaded photo batch
    CandidateCreated {
        candidate_id: Uuid,
        class_id: String,
        photo_count: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate moved between lifecycle states
    CandidateStateChanged {
        candidate_id: Uuid,
        old_state: CandidateState,
        new_state: CandidateState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The operator changed the presence selection or a status override
    ///
    /// Non-critical: emitted lossy, review UIs re-fetch on receipt.
    SelectionChanged {
        candidate_id: Uuid,
        counts: ReviewCounts,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attendance written by the storage sink
    AttendanceCommitted {
        candidate_id: Uuid,
        session_id: Uuid,
        record_count: usize,
        /// True when the sink already held this candidate (retried commit)
        already_committed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A commit attempt was rejected; the candidate stays reviewable
    CommitRejected {
        candidate_id: Uuid,
        /// Stable error code (e.g. "STALE_ROSTER_REFERENCE", "COMMIT_FAILED")
        reason_code: String,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RollcallEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            RollcallEvent::CandidateCreated { .. } => "CandidateCreated",
            RollcallEvent::CandidateStateChanged { .. } => "CandidateStateChanged",
            RollcallEvent::SelectionChanged { .. } => "SelectionChanged",
            RollcallEvent::AttendanceCommitted { .. } => "AttendanceCommitted",
            RollcallEvent::CommitRejected { .. } => "CommitRejected",
        }
    }

    /// Candidate the event refers to
    pub fn candidate_id(&self) -> Uuid {
        match self {
            RollcallEvent::CandidateCreated { candidate_id, .. }
            | RollcallEvent::CandidateStateChanged { candidate_id, .. }
            | RollcallEvent::SelectionChanged { candidate_id, .. }
            | RollcallEvent::AttendanceCommitted { candidate_id, .. }
            | RollcallEvent::CommitRejected { candidate_id, .. } => *candidate_id,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Broadcast bus shared by the service's handlers
///
/// Cloning is cheap; all clones feed the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RollcallEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use rollcall_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RollcallEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RollcallEvent,
    ) -> Result<usize, broadcast::error::SendError<RollcallEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RollcallEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
