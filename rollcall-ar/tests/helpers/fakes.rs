//! In-memory collaborators and fixture builders

use async_trait::async_trait;
use chrono::Utc;
use rollcall_ar::models::{
    CommitPayload, CommitReceipt, EngineDetection, EngineOutput, PhotoDetections, RosterStudent,
    StudentId,
};
use rollcall_ar::types::{AttendanceSink, RosterProvider, SinkError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

pub fn sid(raw: &str) -> StudentId {
    StudentId::parse(raw).expect("valid student id")
}

/// Roster student with a roll number derived from the ID
pub fn student(raw: &str) -> RosterStudent {
    RosterStudent::new(sid(raw), format!("Student {}", raw), format!("R-{}", raw))
}

/// Engine output with one entry per photo, indexed from 0
pub fn engine_output(photos: &[&[(&str, f32)]]) -> EngineOutput {
    EngineOutput {
        photos_processed: photos.len() as u32,
        photos: photos
            .iter()
            .enumerate()
            .map(|(index, detections)| PhotoDetections {
                photo_index: index as u32,
                detections: detections
                    .iter()
                    .map(|(id, confidence)| EngineDetection {
                        student_id: id.to_string(),
                        confidence: *confidence,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Roster provider whose roster tests can replace mid-review
#[derive(Default)]
pub struct StaticRoster {
    students: Mutex<Vec<RosterStudent>>,
}

impl StaticRoster {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            students: Mutex::new(ids.iter().map(|id| student(id)).collect()),
        }
    }

    pub fn replace(&self, ids: &[&str]) {
        *self.students.lock().unwrap() = ids.iter().map(|id| student(id)).collect();
    }
}

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn enrolled_students(
        &self,
        _class_id: &str,
        _subject_id: Option<&str>,
    ) -> rollcall_common::Result<Vec<RosterStudent>> {
        Ok(self.students.lock().unwrap().clone())
    }
}

/// Sink that fails a scripted number of times, then succeeds
///
/// Keyed on candidate ID like a real store: a repeated write returns the
/// first receipt.
#[derive(Default)]
pub struct ScriptedSink {
    failures: Mutex<VecDeque<String>>,
    attempts: Mutex<Vec<CommitPayload>>,
    committed: Mutex<HashMap<Uuid, (CommitReceipt, CommitPayload)>>,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reasons: &[&str]) -> Self {
        let sink = Self::default();
        sink.failures
            .lock()
            .unwrap()
            .extend(reasons.iter().map(|r| r.to_string()));
        sink
    }

    /// Every payload received, including failed attempts
    pub fn attempts(&self) -> Vec<CommitPayload> {
        self.attempts.lock().unwrap().clone()
    }

    /// The stored payload for a candidate
    pub fn committed(&self, candidate_id: Uuid) -> Option<CommitPayload> {
        self.committed
            .lock()
            .unwrap()
            .get(&candidate_id)
            .map(|(_, payload)| payload.clone())
    }

    pub fn committed_count(&self) -> usize {
        self.committed.lock().unwrap().len()
    }
}

#[async_trait]
impl AttendanceSink for ScriptedSink {
    async fn write_session(&self, payload: &CommitPayload) -> Result<CommitReceipt, SinkError> {
        self.attempts.lock().unwrap().push(payload.clone());

        if let Some(reason) = self.failures.lock().unwrap().pop_front() {
            return Err(SinkError::Unavailable(reason));
        }

        let mut committed = self.committed.lock().unwrap();
        if let Some((receipt, _)) = committed.get(&payload.candidate_id) {
            return Ok(CommitReceipt {
                already_committed: true,
                ..receipt.clone()
            });
        }

        let receipt = CommitReceipt {
            session_id: Uuid::new_v4(),
            candidate_id: payload.candidate_id,
            record_count: payload.records.len(),
            committed_at: Utc::now(),
            already_committed: false,
        };
        committed.insert(payload.candidate_id, (receipt.clone(), payload.clone()));
        Ok(receipt)
    }
}
