//! Commit payload and the durable session read back from storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::{AttendanceStatus, SessionType, StudentId};
use crate::error::ReconcileError;

/// Operator-approved presence selection and status overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub present_selection: BTreeSet<StudentId>,
    pub status_overrides: BTreeMap<StudentId, AttendanceStatus>,
}

impl Approval {
    /// Build from unvalidated client strings
    ///
    /// Fails on the first ID that does not parse or status outside the
    /// recognized set. Roster membership is checked later, at commit.
    pub fn from_raw<P, O>(present: P, overrides: O) -> Result<Self, ReconcileError>
    where
        P: IntoIterator<Item = String>,
        O: IntoIterator<Item = (String, String)>,
    {
        let present_selection = present
            .into_iter()
            .map(|raw| StudentId::parse(&raw))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let status_overrides = overrides
            .into_iter()
            .map(|(raw_id, raw_status)| {
                let status = raw_status.parse::<AttendanceStatus>()?;
                Ok((StudentId::parse(&raw_id)?, status))
            })
            .collect::<Result<BTreeMap<_, _>, ReconcileError>>()?;

        Ok(Self {
            present_selection,
            status_overrides,
        })
    }

    /// Every ID the approval mentions, selected or overridden
    pub fn referenced_ids(&self) -> impl Iterator<Item = &StudentId> {
        self.present_selection
            .iter()
            .chain(self.status_overrides.keys())
    }
}

/// Final status of one roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    /// Whether the recognition engine saw the student
    pub detected: bool,
    /// Aggregated confidence when detected
    pub confidence: Option<f32>,
}

/// Complete write request for one candidate, one record per roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPayload {
    /// Idempotency key for the sink
    pub candidate_id: Uuid,
    pub class_id: String,
    pub subject_id: Option<String>,
    pub session_name: String,
    pub session_type: SessionType,
    pub photo_count: u32,
    pub taken_at: DateTime<Utc>,
    /// In roster order
    pub records: Vec<CommitRecord>,
}

/// Acknowledgement from the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    pub session_id: Uuid,
    pub candidate_id: Uuid,
    pub record_count: usize,
    pub committed_at: DateTime<Utc>,
    /// The sink already held this candidate; nothing new was written
    pub already_committed: bool,
}

/// Durable attendance session as stored by the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedSession {
    pub session_id: Uuid,
    pub candidate_id: Uuid,
    pub class_id: String,
    pub subject_id: Option<String>,
    pub session_name: String,
    pub session_type: SessionType,
    pub photo_count: u32,
    pub taken_at: DateTime<Utc>,
    pub committed_at: DateTime<Utc>,
    pub records: Vec<CommitRecord>,
}
