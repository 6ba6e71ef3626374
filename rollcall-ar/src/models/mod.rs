//! Data models for rollcall-ar (Attendance Reconciliation)

pub mod candidate;
pub mod commit;
pub mod detection;
pub mod evidence;
pub mod roster;
pub mod status;

pub use candidate::{CandidateState, SessionCandidate, StateTransition};
pub use commit::{Approval, CommitPayload, CommitReceipt, CommitRecord, CommittedSession};
pub use detection::{EngineDetection, EngineOutput, PhotoDetections, RawDetection, StudentId};
pub use evidence::{AggregatedEvidence, EvidenceMap};
pub use roster::{RosterEntry, RosterStudent};
pub use status::{AttendanceStatus, SessionType};
