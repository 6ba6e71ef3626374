//! Database Test Utilities

use rollcall_ar::db::{enroll_student, upsert_class, upsert_student};
use rollcall_ar::models::RosterStudent;
use rollcall_common::db::init_database;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create a file-backed test database with the full schema
///
/// Returns (TempDir, SqlitePool); the TempDir must outlive the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("rollcall.db");
    let pool = init_database(&db_path)
        .await
        .expect("Failed to initialize test database");
    (temp_dir, pool)
}

/// Create a class and enroll `students` class-wide in the given order
pub async fn seed_class(pool: &SqlitePool, class_id: &str, students: &[RosterStudent]) {
    upsert_class(pool, class_id, &format!("Class {}", class_id))
        .await
        .expect("Failed to create class");

    for (position, student) in students.iter().enumerate() {
        upsert_student(pool, student)
            .await
            .expect("Failed to create student");
        enroll_student(pool, class_id, None, &student.student_id, position as i64)
            .await
            .expect("Failed to enroll student");
    }
}
