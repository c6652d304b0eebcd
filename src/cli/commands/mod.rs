//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod decrypt;
pub mod export;
pub mod flush;
pub mod ingest;
pub mod init;
pub mod keygen;
pub mod status;
pub mod validate;

use crate::anonymization::{AnonymizationContext, DatumAnonymizer};
use crate::config::VaultConfig;
use crate::store::{
    create_directory_remote, create_local_store, CancellationSignal, LocalDataStore,
    RemoteDataStore,
};
use std::path::Path;
use std::sync::Arc;

/// Builds the configured anonymizer
pub(crate) fn build_anonymizer(config: &VaultConfig) -> anyhow::Result<Arc<DatumAnonymizer>> {
    let context = AnonymizationContext::from_config(
        &config.anonymization,
        config.protocol.participant_id.as_deref(),
        &config.protocol.device_id,
    );
    Ok(Arc::new(DatumAnonymizer::from_config(
        &config.anonymization,
        context,
    )?))
}

/// Builds the configured remote store
pub(crate) fn build_remote(config: &VaultConfig) -> anyhow::Result<Arc<dyn RemoteDataStore>> {
    Ok(create_directory_remote(Path::new(
        &config.remote_store.archive_path,
    ))?)
}

/// Builds and starts the configured local store
pub(crate) fn open_local_store(
    config: &VaultConfig,
    shutdown: CancellationSignal,
) -> anyhow::Result<Arc<dyn LocalDataStore>> {
    let store = create_local_store(
        &config.local_store,
        &config.store_directory(),
        build_anonymizer(config)?,
        build_remote(config)?,
        shutdown,
    )?;
    store.start()?;
    Ok(store)
}
