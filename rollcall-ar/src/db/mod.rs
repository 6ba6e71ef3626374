//! Database access for rollcall-ar
//!
//! SQLite implementations of the collaborator traits over the shared
//! `rollcall.db`. Tables are created by `rollcall_common::db::init_database`.

pub mod attendance;
pub mod roster;

pub use attendance::{load_committed_session, SqliteAttendanceSink};
pub use roster::{enroll_student, upsert_class, upsert_student, SqliteRosterProvider};
