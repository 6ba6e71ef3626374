//! Roster students and reconciled roster entries

use serde::{Deserialize, Serialize};

use super::{AggregatedEvidence, StudentId};

/// Enrolled student as returned by the roster provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub student_id: StudentId,
    pub name: String,
    pub roll_number: String,
}

impl RosterStudent {
    pub fn new(student_id: StudentId, name: impl Into<String>, roll_number: impl Into<String>) -> Self {
        Self {
            student_id,
            name: name.into(),
            roll_number: roll_number.into(),
        }
    }
}

/// One enrolled student inside a review, with any evidence found for them
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub student: RosterStudent,
    pub evidence: Option<AggregatedEvidence>,
}

impl RosterEntry {
    pub fn student_id(&self) -> &StudentId {
        &self.student.student_id
    }

    /// Derived from the presence of evidence
    pub fn is_detected(&self) -> bool {
        self.evidence.is_some()
    }
}
