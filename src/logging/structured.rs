//! Subscriber setup
//!
//! Console output is always on, in the human-readable format. When
//! `[logging] local_enabled` is set, every event is also written as one JSON
//! object per line to `<local_path>/sensorvault.log.<date>`, through a
//! non-blocking writer so store writes never wait on log I/O.

use crate::config::LoggingConfig;
use crate::domain::{Result, VaultError};
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "sensorvault.log";

/// Keeps the file writer's worker alive; drop it last
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber
///
/// `RUST_LOG` wins over `log_level` when set. Fails if a subscriber is
/// already installed.
pub fn init_logging(log_level: &str, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(default_directive(parse_log_level(log_level)?)),
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_filter(filter.clone());

    let (file, file_guard) = if config.local_enabled {
        let appender = RollingFileAppender::new(
            rotation(&config.local_rotation)?,
            prepare_log_directory(Path::new(&config.local_path))?,
            LOG_FILE_PREFIX,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(writer)
            .with_filter(filter);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| VaultError::Configuration(format!("Logging already initialized: {e}")))?;

    tracing::debug!(
        level = log_level,
        local_enabled = config.local_enabled,
        local_path = %config.local_path,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn parse_log_level(level: &str) -> Result<Level> {
    level.parse::<Level>().map_err(|_| {
        VaultError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))
    })
}

/// Only this crate's events at `level`; dependencies stay at warn
fn default_directive(level: Level) -> String {
    format!("warn,sensorvault={}", level.as_str().to_ascii_lowercase())
}

fn rotation(name: &str) -> Result<Rotation> {
    match name {
        "daily" => Ok(Rotation::DAILY),
        "hourly" => Ok(Rotation::HOURLY),
        other => Err(VaultError::Configuration(format!(
            "Invalid logging.local_rotation '{other}'. Must be one of: daily, hourly"
        ))),
    }
}

fn prepare_log_directory(path: &Path) -> Result<&Path> {
    std::fs::create_dir_all(path).map_err(|e| {
        VaultError::Configuration(format!(
            "Failed to create log directory {}: {e}",
            path.display()
        ))
    })?;
    Ok(path)
}
