//! Evidence aggregator
//!
//! Merges raw detections of the same student across every photo of a batch.
//!
//! # Strategy
//! 1. Group detections by student ID
//! 2. Collect the distinct photo indices per student (duplicates in one
//!    photo count once)
//! 3. Aggregate confidence = highest single-photo confidence
//!
//! Max-confidence assumes the engine's scores are comparable across photos.
//! One clear match in any photo is treated as stronger evidence than an
//! average dragged down by poor-angle shots.

use rollcall_common::{Error, Result};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::models::{AggregatedEvidence, EvidenceMap, RawDetection, StudentId};

/// Aggregate one batch
///
/// Pure: every detection is consumed before any evidence is returned.
pub fn aggregate(detections: &[RawDetection]) -> EvidenceMap {
    let mut groups: HashMap<&StudentId, (BTreeSet<u32>, f32)> = HashMap::new();

    for detection in detections {
        let (photos, best) = groups
            .entry(&detection.student_id)
            .or_insert_with(|| (BTreeSet::new(), 0.0));
        photos.insert(detection.photo_index);
        if detection.confidence > *best {
            *best = detection.confidence;
        }
    }

    let evidence: EvidenceMap = groups
        .into_iter()
        .filter_map(|(student_id, (photos, confidence))| {
            AggregatedEvidence::new(student_id.clone(), photos, confidence)
                .map(|evidence| (student_id.clone(), evidence))
        })
        .collect();

    debug!(
        raw_detections = detections.len(),
        students = evidence.len(),
        "Aggregated detection evidence"
    );

    evidence
}

/// Display order: confidence descending, ties by ascending student ID
pub fn rank(evidence: &EvidenceMap) -> Vec<&AggregatedEvidence> {
    let mut ranked: Vec<&AggregatedEvidence> = evidence.values().collect();
    ranked.sort_by(|a, b| compare_for_display(a, b));
    ranked
}

pub(crate) fn compare_for_display(a: &AggregatedEvidence, b: &AggregatedEvidence) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| a.student_id().cmp(b.student_id()))
}

/// Aggregate independent batches in parallel
///
/// Each batch runs on the blocking pool; results come back in input order.
pub async fn aggregate_batches(batches: Vec<Vec<RawDetection>>) -> Result<Vec<EvidenceMap>> {
    let handles: Vec<_> = batches
        .into_iter()
        .map(|batch| tokio::task::spawn_blocking(move || aggregate(&batch)))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let evidence = handle
            .await
            .map_err(|e| Error::Internal(format!("Aggregation task failed: {}", e)))?;
        results.push(evidence);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(photo_index: u32, id: &str, confidence: f32) -> RawDetection {
        RawDetection {
            photo_index,
            student_id: StudentId::parse(id).unwrap(),
            confidence,
        }
    }

    fn id(s: &str) -> StudentId {
        StudentId::parse(s).unwrap()
    }

    #[test]
    fn test_single_photo() {
        let evidence = aggregate(&[det(0, "A", 0.9), det(0, "B", 0.4)]);

        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[&id("A")].detection_count(), 1);
        assert_eq!(evidence[&id("A")].confidence(), 0.9);
        assert_eq!(evidence[&id("B")].detection_count(), 1);
        assert_eq!(evidence[&id("B")].confidence(), 0.4);
    }

    #[test]
    fn test_max_confidence_across_photos() {
        let evidence = aggregate(&[det(0, "A", 0.6), det(1, "A", 0.95)]);

        let a = &evidence[&id("A")];
        assert_eq!(a.detection_count(), 2);
        assert_eq!(a.photo_indices(), &[0, 1]);
        assert_eq!(a.confidence(), 0.95);
    }

    #[test]
    fn test_duplicate_in_same_photo_counts_once() {
        let evidence = aggregate(&[det(2, "A", 0.5), det(2, "A", 0.7), det(0, "A", 0.3)]);

        let a = &evidence[&id("A")];
        assert_eq!(a.detection_count(), 2);
        assert_eq!(a.photo_indices(), &[0, 2]);
        assert_eq!(a.confidence(), 0.7);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_rank_ties_by_student_id() {
        let evidence = aggregate(&[
            det(0, "C", 0.8),
            det(0, "B", 0.8),
            det(0, "A", 0.5),
            det(0, "D", 0.9),
        ]);

        let order: Vec<&str> = rank(&evidence)
            .into_iter()
            .map(|e| e.student_id().as_str())
            .collect();
        assert_eq!(order, vec!["D", "B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_aggregate_batches_keeps_order() {
        let batches = vec![
            vec![det(0, "A", 0.9)],
            vec![det(0, "B", 0.4), det(1, "B", 0.5)],
            Vec::new(),
        ];

        let results = aggregate_batches(batches).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].contains_key(&id("A")));
        assert_eq!(results[1][&id("B")].detection_count(), 2);
        assert!(results[2].is_empty());
    }
}
