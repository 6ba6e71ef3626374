//! Detection ingest adapter
//!
//! Flattens per-photo engine output into [`RawDetection`] records. Entries the
//! engine contract does not allow are discarded and counted, never fatal: a
//! confidence outside (0, 1] (including NaN) or a student ID that does not
//! parse. Only a batch with no photos at all aborts.

use serde::Serialize;
use tracing::debug;

use crate::error::ReconcileError;
use crate::models::{EngineOutput, RawDetection, StudentId};

/// Counts of what ingest kept and dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub photo_count: u32,
    pub accepted: usize,
    pub discarded_confidence: usize,
    pub discarded_student_id: usize,
}

impl IngestReport {
    pub fn discarded(&self) -> usize {
        self.discarded_confidence + self.discarded_student_id
    }
}

/// Normalized batch ready for aggregation
#[derive(Debug, Clone)]
pub struct IngestedBatch {
    pub detections: Vec<RawDetection>,
    pub report: IngestReport,
}

impl IngestedBatch {
    pub fn photo_count(&self) -> u32 {
        self.report.photo_count
    }
}

/// Normalize one batch of engine output
///
/// The batch photo count is the larger of the engine's `photosProcessed` and
/// the number of distinct photo indices it actually reported.
pub fn ingest(output: &EngineOutput) -> Result<IngestedBatch, ReconcileError> {
    if output.photos_processed == 0 || output.photos.is_empty() {
        return Err(ReconcileError::NoPhotosProcessed);
    }

    let mut report = IngestReport::default();
    let mut detections = Vec::new();
    let mut seen_photos = std::collections::BTreeSet::new();

    for photo in &output.photos {
        seen_photos.insert(photo.photo_index);

        for detection in &photo.detections {
            if !is_valid_confidence(detection.confidence) {
                report.discarded_confidence += 1;
                continue;
            }

            let student_id = match StudentId::parse(&detection.student_id) {
                Ok(id) => id,
                Err(_) => {
                    report.discarded_student_id += 1;
                    continue;
                }
            };

            detections.push(RawDetection {
                photo_index: photo.photo_index,
                student_id,
                confidence: detection.confidence,
            });
        }
    }

    report.accepted = detections.len();
    report.photo_count = output.photos_processed.max(seen_photos.len() as u32);

    debug!(
        photo_count = report.photo_count,
        accepted = report.accepted,
        discarded_confidence = report.discarded_confidence,
        discarded_student_id = report.discarded_student_id,
        "Ingested detection batch"
    );

    Ok(IngestedBatch { detections, report })
}

fn is_valid_confidence(confidence: f32) -> bool {
    confidence.is_finite() && confidence > 0.0 && confidence <= 1.0
}
