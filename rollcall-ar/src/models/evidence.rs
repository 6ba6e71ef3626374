//! Cross-photo evidence for one student

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use super::StudentId;

/// Evidence map produced by aggregation, keyed by student
pub type EvidenceMap = HashMap<StudentId, AggregatedEvidence>;

/// Merged detections of one student across every photo of a batch
///
/// Only the aggregator builds these, so `detection_count` always equals the
/// number of distinct photo indices and is at least 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedEvidence {
    student_id: StudentId,
    detection_count: u32,
    photo_indices: Vec<u32>,
    confidence: f32,
}

impl AggregatedEvidence {
    /// Returns `None` for an empty photo set
    pub(crate) fn new(
        student_id: StudentId,
        photo_indices: BTreeSet<u32>,
        confidence: f32,
    ) -> Option<Self> {
        if photo_indices.is_empty() {
            return None;
        }

        Some(Self {
            student_id,
            detection_count: photo_indices.len() as u32,
            photo_indices: photo_indices.into_iter().collect(),
            confidence,
        })
    }

    pub fn student_id(&self) -> &StudentId {
        &self.student_id
    }

    /// Number of distinct photos the student was detected in
    pub fn detection_count(&self) -> u32 {
        self.detection_count
    }

    /// Matching photo indices, ascending and distinct
    pub fn photo_indices(&self) -> &[u32] {
        &self.photo_indices
    }

    /// Highest single-photo confidence
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Detected in every photo of the batch
    ///
    /// Informational only; selection never depends on it.
    pub fn is_fully_corroborated(&self, photo_count: u32) -> bool {
        photo_count > 0 && self.detection_count == photo_count
    }
}
