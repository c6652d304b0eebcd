//! Local accumulation and remote hand-off
//!
//! A [`LocalDataStore`] accepts records, anonymizes them before anything is
//! persisted, buffers them (compressed files on disk, or a set in memory) and
//! hands them to a [`RemoteDataStore`] when asked or when the buffer grows too
//! large. Data is removed locally only after the remote store confirmed it.
//!
//! # Concurrency
//!
//! - Writes may come from any number of threads; each store serializes them
//!   behind one mutex.
//! - At most one hand-off per store is in flight. A caller that asks for a
//!   hand-off while one is running is given the running one
//!   ([`HandOffCoordinator`]).
//! - Size-triggered flushes never overlap ([`SizeTriggeredFlush`]) and never
//!   block the writer that noticed the size.
//!
//! # Cancellation
//!
//! Long-running operations take a [`CancellationSignal`]. Cancelling between
//! artifacts leaves the unprocessed ones on disk for the next hand-off.

pub mod export;
pub mod file;
pub mod hand_off;
pub mod ram;
pub mod remote;

use crate::adapters::directory::DirectoryRemoteStore;
use crate::anonymization::DatumAnonymizer;
use crate::config::{LocalStoreConfig, LocalStoreKind};
use crate::domain::{Datum, Result, StoreError};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

pub use export::{export_to_zip, ExportSummary};
pub use file::{FileLocalDataStore, FileStoreOptions, FileStoreStats};
pub use hand_off::HandOffCoordinator;
pub use ram::RamLocalDataStore;
pub use remote::{ContentType, DataLineIter, DatumLines, RemoteDataStore};

/// Cooperative cancellation; `true` means cancelled
pub type CancellationSignal = watch::Receiver<bool>;

/// Whether the signal has been raised
pub fn is_cancelled(signal: &CancellationSignal) -> bool {
    *signal.borrow()
}

/// A signal that is never raised
pub fn never_cancelled() -> CancellationSignal {
    watch::channel(false).1
}

/// Outcome of one hand-off
///
/// Units are files for the file store and records for the RAM store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandOffReport {
    /// Units confirmed by the remote store and removed locally
    pub succeeded: usize,
    /// Units the remote store rejected; still held locally
    pub failed: usize,
    /// Units left untouched because the hand-off was cancelled
    pub skipped: usize,
    /// One message per failure
    pub errors: Vec<String>,
}

impl HandOffReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn add_failure(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
    }

    pub fn add_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: HandOffReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }

    /// True when nothing failed and nothing was left behind
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// On-device buffer of anonymized records
#[async_trait]
pub trait LocalDataStore: Send + Sync {
    /// Short name for logs ("file", "ram")
    fn store_name(&self) -> &'static str;

    /// Prepares the store to accept records
    fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Closes transient resources; buffered data stays local
    fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Anonymizes and buffers one record
    ///
    /// Returns `Ok(false)` when the record was dropped (it could not be
    /// anonymized, or the write failed and the store recovered by rotating).
    /// Errors are reserved for failures that leave the store unusable.
    fn write_datum(&self, datum: &Datum) -> Result<bool>;

    /// Whether the buffer has outgrown its threshold
    fn is_too_large(&self) -> bool;

    /// Hands everything buffered to the remote store
    ///
    /// Joins the running hand-off if there is one.
    async fn write_to_remote(
        &self,
        cancel: &CancellationSignal,
    ) -> std::result::Result<HandOffReport, StoreError>;

    /// Hands off if the buffer is too large and no size-triggered flush runs
    ///
    /// Returns `true` if a flush was started and the remote store accepted
    /// everything.
    async fn flush_if_too_large(&self, cancel: &CancellationSignal) -> bool;

    /// Discards all buffered data
    fn clear(&self) -> Result<()>;

    /// Drops transient handles without losing data
    fn reset(&self) -> Result<()>;

    /// Human-readable buffer size ("3.2 MB", "120 records")
    fn size_description(&self) -> String;

    /// Every buffered record as `(record kind, anonymized JSON)`
    ///
    /// Lazily produced from a snapshot taken when called. Records held only
    /// in encrypted artifacts cannot be read locally and are left out.
    fn data_lines(&self) -> Result<DataLineIter>;
}

/// Guard against overlapping size-triggered flushes of one store
#[derive(Debug, Default)]
pub struct SizeTriggeredFlush {
    running: AtomicBool,
}

struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SizeTriggeredFlush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs a hand-off through `remote` if `local` is too large
    ///
    /// Returns immediately with `false` if the store is small enough or a
    /// size-triggered flush is already running. Failures are logged, never
    /// returned; the running flag is cleared however the flush ends.
    pub async fn run(
        &self,
        local: &dyn LocalDataStore,
        remote: &dyn RemoteDataStore,
        cancel: &CancellationSignal,
    ) -> bool {
        if !local.is_too_large() {
            return false;
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(store = local.store_name(), "Size-triggered flush already running");
            return false;
        }
        let _flag = RunningFlag(&self.running);

        tracing::info!(
            store = local.store_name(),
            size = %local.size_description(),
            "Local store too large; handing off to remote"
        );

        match remote.write_local_store(local, cancel).await {
            Ok(complete) => complete,
            Err(e) => {
                tracing::warn!(
                    store = local.store_name(),
                    error = %e,
                    "Size-triggered flush failed"
                );
                false
            }
        }
    }
}

/// Builds the configured local store over `directory`
///
/// The returned store is not started yet.
pub fn create_local_store(
    config: &LocalStoreConfig,
    directory: &Path,
    anonymizer: Arc<DatumAnonymizer>,
    remote: Arc<dyn RemoteDataStore>,
    shutdown: CancellationSignal,
) -> Result<Arc<dyn LocalDataStore>> {
    let store: Arc<dyn LocalDataStore> = match config.kind {
        LocalStoreKind::File => Arc::new(FileLocalDataStore::new(
            directory,
            FileStoreOptions::from_config(config)?,
            anonymizer,
            remote,
            shutdown,
        )?),
        LocalStoreKind::Ram => Arc::new(RamLocalDataStore::new(
            config.max_ram_records,
            config.upload_to_remote,
            anonymizer,
            remote,
            shutdown,
        )),
    };

    tracing::debug!(store = store.store_name(), "Created local store");
    Ok(store)
}

/// Remote store backed by a local archive directory
pub fn create_directory_remote(archive: &Path) -> Result<Arc<dyn RemoteDataStore>> {
    Ok(Arc::new(DirectoryRemoteStore::new(archive)?))
}
