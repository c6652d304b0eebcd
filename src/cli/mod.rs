//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Sensorvault using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Sensorvault - anonymized, compressed, encrypted sensor data buffering
#[derive(Parser, Debug)]
#[command(name = "sensorvault")]
#[command(version, about, long_about = None)]
#[command(author = "Sensorvault Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sensorvault.toml", env = "SENSORVAULT_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SENSORVAULT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Anonymize JSON records and buffer them in the local store
    Ingest(commands::ingest::IngestArgs),

    /// Hand buffered data off to the remote store
    Flush(commands::flush::FlushArgs),

    /// Show local store and archive status
    Status(commands::status::StatusArgs),

    /// Export local data as one JSON array per record kind in a zip archive
    Export(commands::export::ExportArgs),

    /// Decrypt an encrypted artifact
    Decrypt(commands::decrypt::DecryptArgs),

    /// Generate an RSA key pair for artifact encryption
    Keygen(commands::keygen::KeygenArgs),
}
