//! Attendance status and session type

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReconcileError;

/// Final per-student status written on commit
///
/// `Medical` and `Authorized` are informational on top of present/absent and
/// only ever come from an operator override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Medical,
    Authorized,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Medical,
        AttendanceStatus::Authorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Medical => "medical",
            AttendanceStatus::Authorized => "authorized",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "medical" => Ok(AttendanceStatus::Medical),
            "authorized" => Ok(AttendanceStatus::Authorized),
            other => Err(ReconcileError::InvalidStatusValue(other.to_string())),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regular timetable session or an extra one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Normal,
    Extra,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Normal => "normal",
            SessionType::Extra => "extra",
        }
    }
}

impl FromStr for SessionType {
    type Err = rollcall_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(SessionType::Normal),
            "extra" => Ok(SessionType::Extra),
            other => Err(rollcall_common::Error::InvalidInput(format!(
                "Unknown session type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
