//! rollcall-ar - Attendance Reconciliation service
//!
//! Turns face-recognition output for a batch of classroom photos into a
//! reviewable attendance candidate, and commits the approved result to the
//! shared database.

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_common::config::{load_toml_config, LoggingConfig, RootFolderInitializer, TomlConfig};
use rollcall_common::events::EventBus;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rollcall_ar::config::{CliOverrides, ServiceConfig, MODULE_NAME};
use rollcall_ar::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "rollcall-ar")]
#[command(about = "Attendance reconciliation service")]
#[command(version)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "ROLLCALL_AR_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "ROLLCALL_AR_PORT")]
    port: Option<u16>,

    /// Root folder holding the shared database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // TOML first: it carries the default log level
    let (toml_config, toml_error) = match load_toml_config() {
        Ok(config) => (config, None),
        Err(e) => (TomlConfig::default(), Some(e)),
    };
    init_tracing(&toml_config.logging)?;
    if let Some(e) = toml_error {
        warn!("Ignoring TOML config, using defaults: {}", e);
    }

    info!(
        "Starting {} v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServiceConfig::resolve(
        CliOverrides {
            host: args.host,
            port: args.port,
            root_folder: args.root_folder,
        },
        &toml_config,
    );

    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = rollcall_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let event_bus = EventBus::new(config.event_capacity);
    let state = AppState::new(db_pool, event_bus, config.max_lock_wait_ms);
    let shutdown = state.shutdown.clone();

    let app = rollcall_ar::build_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    info!("rollcall-ar listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("rollcall-ar stopped");
    Ok(())
}

/// Logging to stderr, or to `log_file` when configured
///
/// `RUST_LOG` wins over the TOML level.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rollcall_ar={level},rollcall_common={level},tower_http={level}",
            level = logging.level
        ))
    });

    let file_layer = match &logging.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel in-flight candidates
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
