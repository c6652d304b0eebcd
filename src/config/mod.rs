//! Configuration management for Sensorvault.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Sensorvault uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SENSORVAULT_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation before any store is built
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sensorvault::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("sensorvault.toml")?;
//!
//! println!("Protocol: {}", config.protocol.id);
//! println!("Store directory: {}", config.store_directory().display());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and data directory
//! - [`ProtocolConfig`] - Protocol, participant and device identifiers
//! - [`AnonymizationConfig`](crate::anonymization::AnonymizationConfig) - Run parameters and per-field selections
//! - [`LocalStoreConfig`] - Store kind, compression, encryption, thresholds
//! - [`RemoteStoreConfig`] - Archive location
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//! data_directory = "/var/lib/sensorvault"
//!
//! [protocol]
//! id = "sleep-study-2024"
//! participant_id = "p-0042"
//!
//! [local_store]
//! kind = "file"
//! compression_level = "optimal"
//! encrypt = true
//! public_key = "${SENSORVAULT_PUBLIC_KEY}"
//!
//! [remote_store]
//! archive_path = "/mnt/archive"
//!
//! [[anonymization.overrides]]
//! datum_type = "Location"
//! field = "latitude"
//! anonymizer = { kind = "rounding", places = 2 }
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, CompressionLevel, LocalStoreConfig, LocalStoreKind, LoggingConfig,
    ProtocolConfig, RemoteStoreConfig, VaultConfig,
};
