//! Roster reconciler
//!
//! Combines the enrolled roster with aggregated evidence and owns the review
//! state the operator edits: a presence selection seeded from detection and
//! an independent map of status overrides.
//!
//! Both structures only change through the named operations below, which
//! keep every selected or overridden ID on the current roster. Statistics are
//! derived from that state on every read.

use rollcall_common::events::ReviewCounts;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::error::ReconcileError;
use crate::models::{
    AggregatedEvidence, Approval, AttendanceStatus, EvidenceMap, RosterEntry, RosterStudent,
    StudentId,
};

/// Review state for one candidate
#[derive(Debug, Clone)]
pub struct RosterReview {
    entries: Vec<RosterEntry>,
    evidence: EvidenceMap,
    photo_count: u32,
    present_selection: BTreeSet<StudentId>,
    status_overrides: BTreeMap<StudentId, AttendanceStatus>,
}

/// Students that entered or left the roster on refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRefresh {
    pub added: Vec<StudentId>,
    pub removed: Vec<StudentId>,
}

impl RosterReview {
    /// Reconcile a roster against evidence
    ///
    /// Every enrolled student gets an entry, detected or not; the initial
    /// selection is exactly the detected students. Evidence for students not
    /// on the roster is kept (a later refresh may enroll them) but ignored.
    pub fn new(roster: Vec<RosterStudent>, evidence: EvidenceMap, photo_count: u32) -> Self {
        let entries = build_entries(roster, &evidence);

        let off_roster = evidence.len() - entries.iter().filter(|e| e.is_detected()).count();
        if off_roster > 0 {
            debug!(off_roster, "Ignoring evidence for students not on the roster");
        }

        let mut review = Self {
            entries,
            evidence,
            photo_count,
            present_selection: BTreeSet::new(),
            status_overrides: BTreeMap::new(),
        };
        review.present_selection = review.detected_ids();
        review
    }

    // ========================================
    // Read access
    // ========================================

    /// Entries in roster order
    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn evidence(&self) -> &EvidenceMap {
        &self.evidence
    }

    pub fn photo_count(&self) -> u32 {
        self.photo_count
    }

    pub fn present_selection(&self) -> &BTreeSet<StudentId> {
        &self.present_selection
    }

    pub fn status_overrides(&self) -> &BTreeMap<StudentId, AttendanceStatus> {
        &self.status_overrides
    }

    pub fn is_on_roster(&self, student_id: &StudentId) -> bool {
        self.entries.iter().any(|e| e.student_id() == student_id)
    }

    pub fn is_selected(&self, student_id: &StudentId) -> bool {
        self.present_selection.contains(student_id)
    }

    /// Students with evidence, restricted to the roster
    pub fn detected_ids(&self) -> BTreeSet<StudentId> {
        self.entries
            .iter()
            .filter(|e| e.is_detected())
            .map(|e| e.student_id().clone())
            .collect()
    }

    /// Override if any, else present when selected, else absent
    ///
    /// `None` for students not on the roster.
    pub fn effective_status(&self, student_id: &StudentId) -> Option<AttendanceStatus> {
        if !self.is_on_roster(student_id) {
            return None;
        }
        Some(resolve_status(
            student_id,
            &self.present_selection,
            &self.status_overrides,
        ))
    }

    /// Snapshot of the current selection and overrides
    pub fn approval(&self) -> Approval {
        Approval {
            present_selection: self.present_selection.clone(),
            status_overrides: self.status_overrides.clone(),
        }
    }

    // ========================================
    // Operator mutations
    // ========================================

    /// Flip membership in the selection. Off-roster IDs are ignored.
    ///
    /// Returns whether the student is now selected.
    pub fn toggle_student(&mut self, student_id: &StudentId) -> bool {
        if !self.is_on_roster(student_id) {
            debug!(student_id = %student_id, "Toggle ignored: not on roster");
            return false;
        }

        if self.present_selection.remove(student_id) {
            false
        } else {
            self.present_selection.insert(student_id.clone());
            true
        }
    }

    /// Record a status override from its wire form
    ///
    /// The status is validated before anything changes. Off-roster IDs are
    /// ignored; returns whether an override was recorded.
    pub fn set_status(
        &mut self,
        student_id: &StudentId,
        status: &str,
    ) -> Result<bool, ReconcileError> {
        let status: AttendanceStatus = status.parse()?;
        Ok(self.set_status_value(student_id, status))
    }

    /// Record a status override. Selection membership is untouched.
    pub fn set_status_value(&mut self, student_id: &StudentId, status: AttendanceStatus) -> bool {
        if !self.is_on_roster(student_id) {
            debug!(student_id = %student_id, "Status override ignored: not on roster");
            return false;
        }
        self.status_overrides.insert(student_id.clone(), status);
        true
    }

    /// Remove an override; returns whether one existed
    pub fn clear_status(&mut self, student_id: &StudentId) -> bool {
        self.status_overrides.remove(student_id).is_some()
    }

    pub fn select_all(&mut self) {
        self.present_selection = self.roster_ids().cloned().collect();
    }

    pub fn deselect_all(&mut self) {
        self.present_selection.clear();
    }

    /// Selection back to exactly the detected students; overrides untouched
    pub fn reset_to_detected(&mut self) {
        self.present_selection = self.detected_ids();
    }

    /// Rebuild entries from a fresh roster
    ///
    /// Selection and overrides silently keep only students still enrolled.
    /// Newly enrolled students are unselected even if detected.
    pub fn refresh_roster(&mut self, roster: Vec<RosterStudent>) -> RosterRefresh {
        let old_ids: HashSet<StudentId> = self.roster_ids().cloned().collect();

        self.entries = build_entries(roster, &self.evidence);

        let new_ids: HashSet<StudentId> = self.roster_ids().cloned().collect();
        self.present_selection.retain(|id| new_ids.contains(id));
        self.status_overrides.retain(|id, _| new_ids.contains(id));

        let mut added: Vec<StudentId> = new_ids
            .iter()
            .filter(|id| !old_ids.contains(*id))
            .cloned()
            .collect();
        let mut removed: Vec<StudentId> = old_ids
            .into_iter()
            .filter(|id| !new_ids.contains(id))
            .collect();
        added.sort();
        removed.sort();

        debug!(
            added = added.len(),
            removed = removed.len(),
            "Roster refreshed"
        );

        RosterRefresh { added, removed }
    }

    /// Adopt an approval already validated against this roster
    pub(crate) fn adopt(&mut self, approval: Approval) {
        self.present_selection = approval.present_selection;
        self.status_overrides = approval.status_overrides;
    }

    // ========================================
    // Derived statistics
    // ========================================

    /// Recomputed from current state on every call
    pub fn statistics(&self) -> ReviewStatistics {
        let mut stats = ReviewStatistics {
            total_enrolled: self.entries.len(),
            ..Default::default()
        };

        for entry in &self.entries {
            let id = entry.student_id();
            let selected = self.present_selection.contains(id);

            if let Some(evidence) = &entry.evidence {
                stats.total_detected += 1;
                if !selected {
                    stats.manually_removed += 1;
                }
                if evidence.is_fully_corroborated(self.photo_count) {
                    stats.fully_corroborated += 1;
                }
            } else if selected {
                stats.manually_added += 1;
            }

            if selected {
                stats.total_selected += 1;
            }

            stats
                .status_tally
                .record(resolve_status(id, &self.present_selection, &self.status_overrides));
        }

        stats
    }

    fn roster_ids(&self) -> impl Iterator<Item = &StudentId> {
        self.entries.iter().map(RosterEntry::student_id)
    }
}

/// Shared by review reads and commit payload construction
pub(crate) fn resolve_status(
    student_id: &StudentId,
    selection: &BTreeSet<StudentId>,
    overrides: &BTreeMap<StudentId, AttendanceStatus>,
) -> AttendanceStatus {
    match overrides.get(student_id) {
        Some(status) => *status,
        None if selection.contains(student_id) => AttendanceStatus::Present,
        None => AttendanceStatus::Absent,
    }
}

fn build_entries(roster: Vec<RosterStudent>, evidence: &EvidenceMap) -> Vec<RosterEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(roster.len());

    for student in roster {
        if !seen.insert(student.student_id.clone()) {
            debug!(student_id = %student.student_id, "Duplicate roster student skipped");
            continue;
        }
        let evidence: Option<AggregatedEvidence> = evidence.get(&student.student_id).cloned();
        entries.push(RosterEntry { student, evidence });
    }

    entries
}

/// Read-only review statistics
///
/// Built only by [`RosterReview::statistics`]; fields have getters and no
/// setters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatistics {
    total_enrolled: usize,
    total_detected: usize,
    total_selected: usize,
    manually_added: usize,
    manually_removed: usize,
    fully_corroborated: usize,
    status_tally: StatusTally,
}

impl ReviewStatistics {
    pub fn total_enrolled(&self) -> usize {
        self.total_enrolled
    }

    pub fn total_detected(&self) -> usize {
        self.total_detected
    }

    /// Selected students that are on the roster
    pub fn total_selected(&self) -> usize {
        self.total_selected
    }

    /// Selected but not detected
    pub fn manually_added(&self) -> usize {
        self.manually_added
    }

    /// Detected but not selected
    pub fn manually_removed(&self) -> usize {
        self.manually_removed
    }

    /// Detected in every photo of the batch
    pub fn fully_corroborated(&self) -> usize {
        self.fully_corroborated
    }

    pub fn status_tally(&self) -> StatusTally {
        self.status_tally
    }

    /// Headline counts for selection events
    pub fn counts(&self) -> ReviewCounts {
        ReviewCounts {
            total_enrolled: self.total_enrolled,
            total_detected: self.total_detected,
            total_selected: self.total_selected,
        }
    }
}

/// Effective status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    pub present: usize,
    pub absent: usize,
    pub medical: usize,
    pub authorized: usize,
}

impl StatusTally {
    fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Medical => self.medical += 1,
            AttendanceStatus::Authorized => self.authorized += 1,
        }
    }

    pub fn get(&self, status: AttendanceStatus) -> usize {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Medical => self.medical,
            AttendanceStatus::Authorized => self.authorized,
        }
    }
}
