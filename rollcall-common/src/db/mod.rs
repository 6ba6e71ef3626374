//! Database initialization for the shared attendance database

pub mod init;

pub use init::*;
