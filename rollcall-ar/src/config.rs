//! Service configuration for rollcall-ar
//!
//! Resolves every setting with the same priority: command line (or its
//! environment variable) → TOML `[service]` table → compiled default.
//! The root folder additionally honors `ROLLCALL_ROOT_FOLDER`, see
//! [`rollcall_common::config::RootFolderResolver`].

use rollcall_common::config::{RootFolderResolver, TomlConfig};
use std::path::PathBuf;
use tracing::info;

/// Module name used for root folder resolution and logging
pub const MODULE_NAME: &str = "rollcall-ar";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5731;
pub const DEFAULT_EVENT_CAPACITY: usize = 100;
/// Budget for retrying a locked database
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub root_folder: Option<PathBuf>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub root_folder: PathBuf,
    pub event_capacity: usize,
    pub max_lock_wait_ms: u64,
}

impl ServiceConfig {
    /// Merge command line, TOML and defaults
    pub fn resolve(cli: CliOverrides, toml: &TomlConfig) -> Self {
        let service = &toml.service;

        let root_folder = RootFolderResolver::new(MODULE_NAME)
            .with_cli_arg(cli.root_folder)
            .with_toml(toml)
            .resolve();

        let config = Self {
            host: cli
                .host
                .or_else(|| service.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(service.port).unwrap_or(DEFAULT_PORT),
            root_folder,
            event_capacity: service
                .event_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_EVENT_CAPACITY),
            max_lock_wait_ms: service.max_lock_wait_ms.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS),
        };

        info!(
            host = %config.host,
            port = config.port,
            root_folder = %config.root_folder.display(),
            event_capacity = config.event_capacity,
            max_lock_wait_ms = config.max_lock_wait_ms,
            "Service configuration resolved"
        );

        config
    }

    /// `host:port` for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
