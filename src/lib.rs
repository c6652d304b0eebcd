//! # Sensorvault - on-device sensor data buffering
//!
//! Sensorvault accumulates sensor records on a device, anonymizes them
//! before anything is persisted, compacts them into gzip artifacts, optionally
//! encrypts those artifacts for a study's public key, and hands them off to a
//! remote store. Local data is deleted only after the remote store confirmed
//! it.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`store`] - Local stores (file, RAM), hand-off coordination, remote contract
//! - [`anonymization`] - Per-field anonymizers and the field registry
//! - [`encryption`] - AES-256-CBC artifact envelope with an RSA-wrapped key
//! - [`adapters`] - Remote store implementations
//! - [`domain`] - Records, identifiers, and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorvault::adapters::directory::DirectoryRemoteStore;
//! use sensorvault::anonymization::{AnonymizationContext, AnonymizationRegistry, DatumAnonymizer};
//! use sensorvault::domain::{Datum, DatumPayload, ProtocolId};
//! use sensorvault::store::{FileLocalDataStore, FileStoreOptions, LocalDataStore, never_cancelled};
//! use chrono::Utc;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let anonymizer = Arc::new(DatumAnonymizer::new(
//!         Arc::new(AnonymizationRegistry::standard()),
//!         AnonymizationContext::generate(Some("participant-001"), "device-a"),
//!     ));
//!     let remote = Arc::new(DirectoryRemoteStore::new(Path::new("./archive"))?);
//!
//!     let store = FileLocalDataStore::new(
//!         Path::new("./data"),
//!         FileStoreOptions::default(),
//!         anonymizer,
//!         remote,
//!         never_cancelled(),
//!     )?;
//!     store.start()?;
//!
//!     let datum = Datum::new(
//!         ProtocolId::new("study-1")?,
//!         Utc::now(),
//!         DatumPayload::Speed { kph: Some(42.0) },
//!     );
//!     store.write_datum(&datum)?;
//!
//!     let report = store.write_to_remote(&never_cancelled()).await?;
//!     println!("Handed off {} artifacts", report.succeeded);
//!     store.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::VaultError`]; store hand-offs return the
//! cloneable [`domain::StoreError`] so a joined hand-off can share its
//! outcome with every waiter.

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod domain;
pub mod encryption;
pub mod logging;
pub mod store;
