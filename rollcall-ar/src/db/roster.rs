//! Roster queries
//!
//! Students, classes and enrollments. An enrollment with a NULL subject
//! covers every subject of the class.

use async_trait::async_trait;
use rollcall_common::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use crate::models::{RosterStudent, StudentId};
use crate::types::RosterProvider;

/// Roster provider backed by the shared database
#[derive(Clone)]
pub struct SqliteRosterProvider {
    pool: SqlitePool,
}

impl SqliteRosterProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RosterProvider for SqliteRosterProvider {
    /// Ordered by enrollment position, then roll number
    ///
    /// Without a subject every enrollment of the class counts. A student
    /// enrolled both class-wide and per subject appears once, at the lower
    /// position.
    async fn enrolled_students(
        &self,
        class_id: &str,
        subject_id: Option<&str>,
    ) -> Result<Vec<RosterStudent>> {
        let rows = sqlx::query(
            r#"
            SELECT s.student_id, s.name, s.roll_number, MIN(e.position) AS position
            FROM enrollments e
            JOIN students s ON s.student_id = e.student_id
            WHERE e.class_id = ?1
              AND (?2 IS NULL OR e.subject_id IS NULL OR e.subject_id = ?2)
            GROUP BY s.student_id, s.name, s.roll_number
            ORDER BY position, s.roll_number, s.student_id
            "#,
        )
        .bind(class_id)
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        let mut roster = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_id: String = row.get("student_id");
            match StudentId::parse(&raw_id) {
                Ok(student_id) => roster.push(RosterStudent {
                    student_id,
                    name: row.get("name"),
                    roll_number: row.get("roll_number"),
                }),
                Err(_) => warn!(student_id = %raw_id, "Skipping stored student with invalid id"),
            }
        }

        debug!(
            class_id,
            subject_id = subject_id.unwrap_or("-"),
            students = roster.len(),
            "Loaded roster"
        );

        Ok(roster)
    }
}

/// Insert or update a student
pub async fn upsert_student(pool: &SqlitePool, student: &RosterStudent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO students (student_id, name, roll_number)
        VALUES (?, ?, ?)
        ON CONFLICT(student_id) DO UPDATE SET
            name = excluded.name,
            roll_number = excluded.roll_number
        "#,
    )
    .bind(student.student_id.as_str())
    .bind(&student.name)
    .bind(&student.roll_number)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or rename a class
pub async fn upsert_class(pool: &SqlitePool, class_id: &str, name: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO classes (class_id, name)
        VALUES (?, ?)
        ON CONFLICT(class_id) DO UPDATE SET name = excluded.name
        "#,
    )
    .bind(class_id)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Enroll a student (class-wide when `subject_id` is `None`)
///
/// Re-enrolling replaces the position.
pub async fn enroll_student(
    pool: &SqlitePool,
    class_id: &str,
    subject_id: Option<&str>,
    student_id: &StudentId,
    position: i64,
) -> Result<()> {
    // OR REPLACE works against the expression index on IFNULL(subject_id, '')
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO enrollments (class_id, subject_id, student_id, position)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(class_id)
    .bind(subject_id)
    .bind(student_id.as_str())
    .bind(position)
    .execute(pool)
    .await?;

    Ok(())
}
