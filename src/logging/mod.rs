//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output (always on)
//! - JSON-formatted local log files with daily or hourly rotation
//! - Configurable log levels
//!
//! # Example
//!
//! ```no_run
//! use sensorvault::logging::init_logging;
//! use sensorvault::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! // Use tracing macros for logging
//! tracing::info!("Application started");
//! tracing::error!(error = "Something went wrong", "Error occurred");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the completion of a file rotation
///
/// # Example
///
/// ```no_run
/// use sensorvault::log_rotation;
/// use std::path::Path;
///
/// log_rotation!(Path::new("/data/3f1c.gz"), 1250, true);
/// ```
#[macro_export]
macro_rules! log_rotation {
    ($artifact:expr, $records:expr, $encrypted:expr) => {
        tracing::info!(
            artifact = %$artifact.display(),
            records = $records,
            encrypted = $encrypted,
            "Rotated local data file"
        );
    };
}

/// Log the outcome of a remote hand-off
///
/// # Example
///
/// ```no_run
/// use sensorvault::log_hand_off_complete;
/// use sensorvault::store::HandOffReport;
/// use std::time::Duration;
///
/// let report = HandOffReport::new();
/// log_hand_off_complete!("file", &report, Duration::from_millis(250));
/// ```
#[macro_export]
macro_rules! log_hand_off_complete {
    ($store:expr, $report:expr, $duration:expr) => {
        tracing::info!(
            store = $store,
            succeeded = $report.succeeded,
            failed = $report.failed,
            skipped = $report.skipped,
            duration_ms = $duration.as_millis(),
            "Remote hand-off completed"
        );
    };
}

/// Log a record that was dropped before persistence
///
/// # Example
///
/// ```no_run
/// use sensorvault::log_dropped_datum;
/// use sensorvault::domain::AnonymizationError;
///
/// let error = AnonymizationError::InvalidPattern("empty".to_string());
/// log_dropped_datum!("7d44b88c-4199-4bad-97dc-d78268e01398", "Sms", &error);
/// ```
#[macro_export]
macro_rules! log_dropped_datum {
    ($datum_id:expr, $datum_type:expr, $error:expr) => {
        tracing::warn!(
            datum_id = %$datum_id,
            datum_type = %$datum_type,
            error = %$error,
            "Dropped record that could not be anonymized"
        );
    };
}
