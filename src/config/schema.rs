//! Configuration schema types
//!
//! This module defines the configuration structure for Sensorvault.

use crate::anonymization::AnonymizationConfig;
use crate::encryption::ArtifactPublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Main Sensorvault configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// The data-collection run this device belongs to
    pub protocol: ProtocolConfig,

    /// Anonymization parameters and per-field selections
    #[serde(default)]
    pub anonymization: AnonymizationConfig,

    /// Local buffering
    #[serde(default)]
    pub local_store: LocalStoreConfig,

    /// Remote archive
    #[serde(default)]
    pub remote_store: RemoteStoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VaultConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.protocol.validate()?;
        self.anonymization
            .validate()
            .map_err(|e| format!("anonymization: {e:#}"))?;
        self.local_store.validate()?;
        self.remote_store.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Directory the local store buffers into
    ///
    /// `<data_directory>/<protocol id>/<store kind>`
    pub fn store_directory(&self) -> PathBuf {
        PathBuf::from(&self.application.data_directory)
            .join(&self.protocol.id)
            .join(self.local_store.kind.to_string())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root of all local store directories
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        if self.data_directory.trim().is_empty() {
            return Err("application.data_directory cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_directory: default_data_directory(),
        }
    }
}

/// Protocol (data-collection run) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol identifier stamped on stored data
    pub id: String,

    /// Participant identifier; seeds per-participant anonymization
    #[serde(default)]
    pub participant_id: Option<String>,

    /// Device identifier; seeds per-participant anonymization when no
    /// participant id is set
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

impl ProtocolConfig {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("protocol.id cannot be empty".to_string());
        }
        if self.id.contains(['/', '\\']) || self.id.starts_with('.') {
            return Err(format!(
                "protocol.id '{}' cannot be used as a directory name",
                self.id
            ));
        }
        if self.device_id.trim().is_empty() {
            return Err("protocol.device_id cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            participant_id: None,
            device_id: default_device_id(),
        }
    }
}

/// Local store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalStoreKind {
    /// Compressed files on disk
    #[default]
    File,
    /// In-memory set of records
    Ram,
}

impl fmt::Display for LocalStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Ram => f.write_str("ram"),
        }
    }
}

/// Compression level of file store artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    None,
    Fastest,
    #[default]
    Optimal,
}

/// Local store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStoreConfig {
    /// Store implementation (file, ram)
    #[serde(default)]
    pub kind: LocalStoreKind,

    /// Compression level (none, fastest, optimal)
    #[serde(default)]
    pub compression_level: CompressionLevel,

    /// Write buffer size in bytes; values <= 0 use the default
    #[serde(default = "default_buffer_size")]
    pub buffer_size: i64,

    /// Encrypt completed artifacts
    #[serde(default)]
    pub encrypt: bool,

    /// Base64 DER (SubjectPublicKeyInfo) RSA public key
    #[serde(default)]
    pub public_key: Option<String>,

    /// Hand data to the remote store; when false data stays local
    #[serde(default = "default_true")]
    pub upload_to_remote: bool,

    /// Active file size that triggers rotation
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Directory size that triggers a hand-off
    #[serde(default = "default_max_directory_size_mb")]
    pub max_directory_size_mb: u64,

    /// Number of writes between size checks
    #[serde(default = "default_size_check_interval")]
    pub size_check_interval: u64,

    /// Record count that triggers a hand-off of the RAM store
    #[serde(default = "default_max_ram_records")]
    pub max_ram_records: usize,
}

impl LocalStoreConfig {
    fn validate(&self) -> Result<(), String> {
        if self.encrypt {
            let key = self
                .public_key
                .as_deref()
                .ok_or("local_store.encrypt is enabled but local_store.public_key is not set")?;
            ArtifactPublicKey::from_base64_der(key)
                .map_err(|e| format!("local_store.public_key is unusable: {e}"))?;
        }

        if self.max_file_size_mb == 0 {
            return Err("local_store.max_file_size_mb must be > 0".to_string());
        }
        if self.max_directory_size_mb < self.max_file_size_mb {
            return Err(format!(
                "local_store.max_directory_size_mb ({}) must be >= max_file_size_mb ({})",
                self.max_directory_size_mb, self.max_file_size_mb
            ));
        }
        if self.size_check_interval == 0 {
            return Err("local_store.size_check_interval must be > 0".to_string());
        }
        if self.max_ram_records == 0 {
            return Err("local_store.max_ram_records must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            kind: LocalStoreKind::default(),
            compression_level: CompressionLevel::default(),
            buffer_size: default_buffer_size(),
            encrypt: false,
            public_key: None,
            upload_to_remote: true,
            max_file_size_mb: default_max_file_size_mb(),
            max_directory_size_mb: default_max_directory_size_mb(),
            size_check_interval: default_size_check_interval(),
            max_ram_records: default_max_ram_records(),
        }
    }
}

/// Remote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    /// Archive directory artifacts are handed to
    #[serde(default = "default_archive_path")]
    pub archive_path: String,
}

impl RemoteStoreConfig {
    fn validate(&self) -> Result<(), String> {
        if self.archive_path.trim().is_empty() {
            return Err("remote_store.archive_path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            archive_path: default_archive_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_directory() -> String {
    "./data/sensorvault".to_string()
}

fn default_device_id() -> String {
    "local-device".to_string()
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> i64 {
    8192
}

fn default_max_file_size_mb() -> u64 {
    1
}

fn default_max_directory_size_mb() -> u64 {
    10
}

fn default_size_check_interval() -> u64 {
    10_000
}

fn default_max_ram_records() -> usize {
    50_000
}

fn default_archive_path() -> String {
    "./data/archive".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
