//! Detection engine output and normalized raw detections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReconcileError;

/// Opaque student identifier
///
/// 1-64 characters, each an ASCII letter, digit, `-`, `_` or `.`.
/// Construct through [`StudentId::parse`] or `FromStr`; there is no unchecked
/// constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    /// Maximum identifier length in bytes
    pub const MAX_LEN: usize = 64;

    /// Parse and validate an identifier
    pub fn parse(raw: &str) -> Result<Self, ReconcileError> {
        let valid = !raw.is_empty()
            && raw.len() <= Self::MAX_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(ReconcileError::InvalidStudentId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StudentId {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StudentId {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One student seen in one photo, after ingest filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub photo_index: u32,
    pub student_id: StudentId,
    /// Always in (0, 1]
    pub confidence: f32,
}

/// Output of the recognition engine for one batch of photos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOutput {
    /// Number of photos the engine reports having processed
    pub photos_processed: u32,
    #[serde(default)]
    pub photos: Vec<PhotoDetections>,
}

/// Engine results for one photo
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDetections {
    pub photo_index: u32,
    /// Absence of a student here means "not seen in this photo"
    #[serde(default)]
    pub detections: Vec<EngineDetection>,
}

/// A single identity match as reported by the engine (unvalidated)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDetection {
    pub student_id: String,
    pub confidence: f32,
}
