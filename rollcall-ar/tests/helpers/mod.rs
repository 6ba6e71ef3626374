//! Test Helper Utilities
//!
//! Shared utilities for testing rollcall-ar

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{create_test_db, seed_class};
pub use fakes::{engine_output, sid, student, ScriptedSink, StaticRoster};
