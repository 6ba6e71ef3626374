//! Database initialization
//!
//! Opens (creating if needed) the shared SQLite database and makes sure every
//! table the attendance services rely on exists. Safe to call on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas go through the connect options so every pooled
    // connection gets them, not just the first one.
    // WAL lets review reads continue while a commit transaction is open.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Single connection: every SQLite `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_students_table(pool).await?;
    create_classes_table(pool).await?;
    create_enrollments_table(pool).await?;
    create_attendance_sessions_table(pool).await?;
    create_attendance_records_table(pool).await?;

    info!("Database schema ready (students, classes, enrollments, attendance)");
    Ok(())
}

async fn create_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            student_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            roll_number TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            class_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Enrollment of a student in a class, optionally scoped to one subject
///
/// `subject_id` NULL means the student attends every subject of the class.
async fn create_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            class_id TEXT NOT NULL REFERENCES classes(class_id) ON DELETE CASCADE,
            subject_id TEXT,
            student_id TEXT NOT NULL REFERENCES students(student_id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Expression index: a plain UNIQUE treats every NULL subject as distinct
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_enrollments_unique
        ON enrollments (class_id, IFNULL(subject_id, ''), student_id)
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per committed candidate; `candidate_id` is the idempotency key
async fn create_attendance_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_sessions (
            session_id TEXT PRIMARY KEY,
            candidate_id TEXT NOT NULL UNIQUE,
            class_id TEXT NOT NULL,
            subject_id TEXT,
            session_name TEXT NOT NULL,
            session_type TEXT NOT NULL,
            photo_count INTEGER NOT NULL,
            taken_at TEXT NOT NULL,
            committed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            session_id TEXT NOT NULL REFERENCES attendance_sessions(session_id) ON DELETE CASCADE,
            student_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('present', 'absent', 'medical', 'authorized')),
            detected INTEGER NOT NULL,
            confidence REAL,
            UNIQUE (session_id, student_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
