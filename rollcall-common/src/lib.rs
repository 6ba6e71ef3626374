//! # Rollcall Common Library
//!
//! Shared code for the Rollcall services including:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Event types (RollcallEvent enum) and the EventBus
//! - SQLite initialization for the shared attendance database
//! - Server-Sent Events helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
