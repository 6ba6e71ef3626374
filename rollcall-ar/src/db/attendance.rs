//! Committed attendance persistence
//!
//! One `attendance_sessions` row per candidate plus one `attendance_records`
//! row per roster entry, written in a single transaction. The UNIQUE
//! `candidate_id` column makes a repeated commit return the first receipt
//! instead of writing a second session.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_common::{Error, Result};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::config::DEFAULT_MAX_LOCK_WAIT_MS;
use crate::models::{
    AttendanceStatus, CommitPayload, CommitReceipt, CommitRecord, CommittedSession, StudentId,
};
use crate::types::{AttendanceSink, SinkError};
use crate::utils::retry_on_lock;

/// Attendance sink backed by the shared database
#[derive(Clone)]
pub struct SqliteAttendanceSink {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteAttendanceSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait_ms(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }
}

#[async_trait]
impl AttendanceSink for SqliteAttendanceSink {
    async fn write_session(
        &self,
        payload: &CommitPayload,
    ) -> std::result::Result<CommitReceipt, SinkError> {
        let receipt = retry_on_lock("attendance commit", self.max_lock_wait_ms, || {
            write_session_once(&self.pool, payload)
        })
        .await
        .map_err(into_sink_error)?;

        if receipt.already_committed {
            tracing::info!(
                candidate_id = %payload.candidate_id,
                session_id = %receipt.session_id,
                "Candidate already committed; returning existing session"
            );
        }

        Ok(receipt)
    }
}

/// Constraint violations reject the payload; anything else is a storage error
fn into_sink_error(err: Error) -> SinkError {
    if let Error::Database(sqlx::Error::Database(db_err)) = &err {
        if db_err.is_unique_violation()
            || db_err.is_check_violation()
            || db_err.is_foreign_key_violation()
        {
            tracing::warn!(error = %db_err, "Attendance payload rejected by a constraint");
            return SinkError::Rejected(db_err.message().to_string());
        }
    }
    SinkError::Storage(err)
}

async fn write_session_once(pool: &SqlitePool, payload: &CommitPayload) -> Result<CommitReceipt> {
    let candidate_id = payload.candidate_id.to_string();

    let mut tx = pool.begin().await?;

    if let Some(existing) = find_receipt(&mut tx, &candidate_id).await? {
        tx.rollback().await?;
        return Ok(existing);
    }

    let session_id = Uuid::new_v4();
    let committed_at = Utc::now();

    let inserted = sqlx::query(
        r#"
        INSERT INTO attendance_sessions (
            session_id, candidate_id, class_id, subject_id, session_name,
            session_type, photo_count, taken_at, committed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session_id.to_string())
    .bind(&candidate_id)
    .bind(&payload.class_id)
    .bind(&payload.subject_id)
    .bind(&payload.session_name)
    .bind(payload.session_type.as_str())
    .bind(payload.photo_count as i64)
    .bind(payload.taken_at.to_rfc3339())
    .bind(committed_at.to_rfc3339())
    .execute(&mut *tx)
    .await;

    if let Err(err) = inserted {
        // Lost a race with a concurrent commit of the same candidate
        let unique_violation = matches!(
            &err,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation()
        );
        tx.rollback().await?;

        if unique_violation {
            let mut tx = pool.begin().await?;
            let existing = find_receipt(&mut tx, &candidate_id).await?;
            tx.rollback().await?;
            if let Some(existing) = existing {
                return Ok(existing);
            }
        }
        return Err(err.into());
    }

    for (position, record) in payload.records.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO attendance_records (
                session_id, student_id, position, status, detected, confidence
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id.to_string())
        .bind(record.student_id.as_str())
        .bind(position as i64)
        .bind(record.status.as_str())
        .bind(record.detected)
        .bind(record.confidence.map(f64::from))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(CommitReceipt {
        session_id,
        candidate_id: payload.candidate_id,
        record_count: payload.records.len(),
        committed_at,
        already_committed: false,
    })
}

async fn find_receipt(
    tx: &mut Transaction<'_, Sqlite>,
    candidate_id: &str,
) -> Result<Option<CommitReceipt>> {
    let row = sqlx::query(
        r#"
        SELECT s.session_id, s.candidate_id, s.committed_at,
               (SELECT COUNT(*) FROM attendance_records r WHERE r.session_id = s.session_id) AS record_count
        FROM attendance_sessions s
        WHERE s.candidate_id = ?
        "#,
    )
    .bind(candidate_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|row| -> Result<CommitReceipt> {
        Ok(CommitReceipt {
            session_id: parse_uuid(row.get("session_id"))?,
            candidate_id: parse_uuid(row.get("candidate_id"))?,
            record_count: row.get::<i64, _>("record_count") as usize,
            committed_at: parse_timestamp(row.get("committed_at"))?,
            already_committed: true,
        })
    })
    .transpose()
}

/// Read a committed session back by candidate ID
///
/// Records come back in the order they were committed (roster order).
pub async fn load_committed_session(
    pool: &SqlitePool,
    candidate_id: Uuid,
) -> Result<Option<CommittedSession>> {
    let Some(row) = sqlx::query(
        r#"
        SELECT session_id, candidate_id, class_id, subject_id, session_name,
               session_type, photo_count, taken_at, committed_at
        FROM attendance_sessions
        WHERE candidate_id = ?
        "#,
    )
    .bind(candidate_id.to_string())
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let session_id: String = row.get("session_id");

    let record_rows = sqlx::query(
        r#"
        SELECT student_id, status, detected, confidence
        FROM attendance_records
        WHERE session_id = ?
        ORDER BY position
        "#,
    )
    .bind(&session_id)
    .fetch_all(pool)
    .await?;

    let records = record_rows
        .into_iter()
        .map(|r| -> Result<CommitRecord> {
            let student_id: String = r.get("student_id");
            let status: String = r.get("status");
            let confidence: Option<f64> = r.get("confidence");
            Ok(CommitRecord {
                student_id: StudentId::parse(&student_id)
                    .map_err(|e| Error::Internal(e.to_string()))?,
                status: status
                    .parse::<AttendanceStatus>()
                    .map_err(|e| Error::Internal(e.to_string()))?,
                detected: r.get("detected"),
                confidence: confidence.map(|c| c as f32),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let session_type: String = row.get("session_type");

    Ok(Some(CommittedSession {
        session_id: parse_uuid(session_id)?,
        candidate_id: parse_uuid(row.get("candidate_id"))?,
        class_id: row.get("class_id"),
        subject_id: row.get("subject_id"),
        session_name: row.get("session_name"),
        session_type: session_type.parse()?,
        photo_count: row.get::<i64, _>("photo_count") as u32,
        taken_at: parse_timestamp(row.get("taken_at"))?,
        committed_at: parse_timestamp(row.get("committed_at"))?,
        records,
    }))
}

fn parse_uuid(raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| Error::Internal(format!("Invalid UUID {}: {}", raw, e)))
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {}: {}", raw, e)))
}
