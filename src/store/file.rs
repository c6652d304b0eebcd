//! File-backed local store
//!
//! Records are appended as compact JSON, with no separator, to a gzip stream
//! over the *active* file. Rotation closes the active file and turns it into a
//! completed artifact: encrypted straight to `<name>.gz.bin` when encryption
//! is on, otherwise (or when encryption fails) renamed to `<name>.gz`. Then a
//! fresh active file is opened. Hand-off uploads every completed artifact and
//! deletes each one only after the remote store confirmed it.
//!
//! ```text
//! <uuid>                  active or closing file (no extension)
//! <uuid>.gz               completed, not encrypted
//! <uuid>.gz.bin.partial   encryption in progress
//! <uuid>.gz.bin           completed, encrypted
//! ```
//!
//! A plaintext file never carries a completed name while it is being
//! encrypted, so a listing of completed artifacts cannot pick it up.
//!
//! A write that fails halfway can leave a truncated record at the end of the
//! abandoned file. Readers stop at the first record that does not parse
//! ([`LocalDataStore::data_lines`] does).

use super::hand_off::HandOffCoordinator;
use super::remote::{datum_line, ContentType, DataLineIter, RemoteDataStore};
use super::{is_cancelled, CancellationSignal, HandOffReport, LocalDataStore, SizeTriggeredFlush};
use crate::anonymization::DatumAnonymizer;
use crate::config::{CompressionLevel, LocalStoreConfig};
use crate::domain::{Datum, DatumType, EncryptionError, Result, StoreError};
use crate::encryption::{encrypt_file, ArtifactPublicKey};
use crate::{log_dropped_datum, log_hand_off_complete, log_rotation};
use async_trait::async_trait;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

const COMPLETED_SUFFIX: &str = ".gz";
const ENCRYPTED_SUFFIX: &str = ".gz.bin";
const PARTIAL_SUFFIX: &str = ".partial";

/// Attempts at creating a new active file before giving up
const OPEN_ATTEMPTS: usize = 3;

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Tuning of a [`FileLocalDataStore`]
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    pub compression: Compression,
    /// Bytes buffered between the gzip stream and the file
    pub buffer_size: usize,
    /// Encrypt completed artifacts; requires `public_key`
    pub encrypt: bool,
    /// Base64 DER public key used to wrap artifact keys
    pub public_key: Option<String>,
    /// When false, hand-offs are no-ops and data stays local
    pub upload_to_remote: bool,
    /// Rotate once the active file grows past this
    pub max_file_bytes: u64,
    /// Hand off once the directory grows past this
    pub max_directory_bytes: u64,
    /// Sizes are checked once every this many writes
    pub size_check_interval: u64,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            encrypt: false,
            public_key: None,
            upload_to_remote: true,
            max_file_bytes: BYTES_PER_MB,
            max_directory_bytes: 10 * BYTES_PER_MB,
            size_check_interval: 10_000,
        }
    }
}

impl FileStoreOptions {
    pub fn from_config(config: &LocalStoreConfig) -> Result<Self> {
        if config.size_check_interval == 0 {
            return Err(StoreError::Configuration(
                "size_check_interval must be greater than 0".to_string(),
            )
            .into());
        }

        let compression = match config.compression_level {
            CompressionLevel::None => Compression::none(),
            CompressionLevel::Fastest => Compression::fast(),
            CompressionLevel::Optimal => Compression::default(),
        };

        Ok(Self {
            compression,
            buffer_size: usize::try_from(config.buffer_size)
                .ok()
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_BUFFER_SIZE),
            encrypt: config.encrypt,
            public_key: config.public_key.clone(),
            upload_to_remote: config.upload_to_remote,
            max_file_bytes: config.max_file_size_mb * BYTES_PER_MB,
            max_directory_bytes: config.max_directory_size_mb * BYTES_PER_MB,
            size_check_interval: config.size_check_interval,
        })
    }
}

/// Point-in-time counters of a [`FileLocalDataStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStoreStats {
    pub records_written: u64,
    /// Non-empty files closed as completed artifacts
    pub rotations: u64,
    pub write_failures: u64,
    /// Records that could not be anonymized
    pub dropped_records: u64,
    /// Files in the storage directory, active file included
    pub files: usize,
    pub bytes: u64,
}

/// Outcome of encrypting a completed artifact
enum EncryptOutcome {
    Success(PathBuf),
    Failure(EncryptionError),
}

struct ActiveFile {
    path: PathBuf,
    writer: GzEncoder<BufWriter<File>>,
    records: u64,
}

#[derive(Default)]
struct WriterState {
    active: Option<ActiveFile>,
    writes_since_check: u64,
    started: bool,
}

#[derive(Default)]
struct Counters {
    records_written: AtomicU64,
    rotations: AtomicU64,
    write_failures: AtomicU64,
    dropped_records: AtomicU64,
}

struct Inner {
    directory: PathBuf,
    options: FileStoreOptions,
    public_key: Option<ArtifactPublicKey>,
    anonymizer: Arc<DatumAnonymizer>,
    remote: Arc<dyn RemoteDataStore>,
    shutdown: CancellationSignal,
    state: Mutex<WriterState>,
    hand_off: HandOffCoordinator,
    flush: SizeTriggeredFlush,
    counters: Counters,
    #[cfg(test)]
    fail_next_write: std::sync::atomic::AtomicBool,
}

/// Local store that buffers records in compressed files
///
/// Cloning is cheap; clones share the same directory and state.
#[derive(Clone)]
pub struct FileLocalDataStore {
    inner: Arc<Inner>,
}

impl FileLocalDataStore {
    /// Creates a store over `directory`, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Fails before accepting any data if encryption is enabled without a
    /// usable public key.
    pub fn new(
        directory: &Path,
        options: FileStoreOptions,
        anonymizer: Arc<DatumAnonymizer>,
        remote: Arc<dyn RemoteDataStore>,
        shutdown: CancellationSignal,
    ) -> Result<Self> {
        let public_key = if options.encrypt {
            let text = options.public_key.as_deref().ok_or_else(|| {
                StoreError::Configuration(
                    "Encryption is enabled but no public key is configured".to_string(),
                )
            })?;
            let key = ArtifactPublicKey::from_base64_der(text).map_err(|e| {
                StoreError::Configuration(format!("Encryption public key is unusable: {e}"))
            })?;
            Some(key)
        } else {
            None
        };

        fs::create_dir_all(directory).map_err(|e| {
            StoreError::Io(format!(
                "Failed to create storage directory {}: {e}",
                directory.display()
            ))
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                directory: directory.to_path_buf(),
                options,
                public_key,
                anonymizer,
                remote,
                shutdown,
                state: Mutex::new(WriterState::default()),
                hand_off: HandOffCoordinator::new(),
                flush: SizeTriggeredFlush::new(),
                counters: Counters::default(),
                #[cfg(test)]
                fail_next_write: std::sync::atomic::AtomicBool::new(false),
            }),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    /// Path of the file currently written to, if one is open
    pub fn active_path(&self) -> Option<PathBuf> {
        self.inner.lock_state().active.as_ref().map(|a| a.path.clone())
    }

    /// Closes the active file as a completed artifact and opens a new one
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        self.inner.rotate_locked(&mut state)?;
        Ok(())
    }

    /// Completed artifacts waiting for hand-off, sorted by name
    pub fn completed_artifacts(&self) -> Result<Vec<PathBuf>> {
        Ok(self.inner.completed_artifacts()?)
    }

    pub fn stats(&self) -> FileStoreStats {
        let counters = &self.inner.counters;
        let (files, bytes) = self.inner.directory_usage();
        FileStoreStats {
            records_written: counters.records_written.load(Ordering::Relaxed),
            rotations: counters.rotations.load(Ordering::Relaxed),
            write_failures: counters.write_failures.load(Ordering::Relaxed),
            dropped_records: counters.dropped_records.load(Ordering::Relaxed),
            files,
            bytes,
        }
    }

    fn spawn_flush(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; size-triggered flush left to the caller");
            return;
        };
        let store = self.clone();
        runtime.spawn(async move {
            let inner = store.inner.clone();
            inner
                .flush
                .run(&store, inner.remote.as_ref(), &inner.shutdown)
                .await;
        });
    }

    #[cfg(test)]
    fn fail_next_write(&self) {
        self.inner.fail_next_write.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalDataStore for FileLocalDataStore {
    fn store_name(&self) -> &'static str {
        "file"
    }

    /// Promotes files orphaned by a previous process and opens the first file
    fn start(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        if state.started {
            return Ok(());
        }

        let active = state.active.as_ref().map(|a| a.path.clone());
        self.inner.promote_orphans(active.as_deref())?;
        self.inner.rotate_locked(&mut state)?;
        state.started = true;

        tracing::info!(directory = %self.inner.directory.display(), "File store started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        self.inner.close_active(&mut state);
        state.started = false;

        tracing::info!(directory = %self.inner.directory.display(), "File store stopped");
        Ok(())
    }

    fn write_datum(&self, datum: &Datum) -> Result<bool> {
        let inner = &self.inner;
        let json = match inner.anonymizer.anonymized_json(datum) {
            Ok(json) => json,
            Err(e) => {
                log_dropped_datum!(datum.id(), datum.datum_type(), e);
                inner.counters.dropped_records.fetch_add(1, Ordering::Relaxed);
                return Ok(false);
            }
        };

        let (written, check_directory) = {
            let mut state = inner.lock_state();
            inner.write_locked(&mut state, json.as_bytes())?
        };

        if check_directory && self.is_too_large() {
            self.spawn_flush();
        }
        Ok(written)
    }

    fn is_too_large(&self) -> bool {
        self.inner.directory_usage().1 > self.inner.options.max_directory_bytes
    }

    async fn write_to_remote(
        &self,
        cancel: &CancellationSignal,
    ) -> std::result::Result<HandOffReport, StoreError> {
        if !self.inner.options.upload_to_remote {
            tracing::debug!("Remote upload disabled; keeping data local");
            return Ok(HandOffReport::new());
        }

        let inner = self.inner.clone();
        let cancel = cancel.clone();
        self.inner
            .hand_off
            .run(move || inner.run_hand_off(cancel))
            .await
    }

    async fn flush_if_too_large(&self, cancel: &CancellationSignal) -> bool {
        self.inner
            .flush
            .run(self, self.inner.remote.as_ref(), cancel)
            .await
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        drop(state.active.take());

        for entry in fs::read_dir(&self.inner.directory)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
            }
        }

        if state.started {
            state.active = Some(self.inner.open_new_file()?);
        }

        tracing::info!(directory = %self.inner.directory.display(), "File store cleared");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.inner.lock_state();
        self.inner.close_active(&mut state);
        state.writes_since_check = 0;
        Ok(())
    }

    fn size_description(&self) -> String {
        let bytes = self.inner.directory_usage().1;
        format!("{:.1} MB", bytes as f64 / BYTES_PER_MB as f64)
    }

    /// Reads the plaintext artifacts and what was flushed to the active file
    ///
    /// Files are opened under the writer lock, so a rotation or hand-off
    /// running afterwards does not change what the iterator yields.
    fn data_lines(&self) -> Result<DataLineIter> {
        let mut sources = Vec::new();
        let mut encrypted = 0usize;
        {
            let mut state = self.inner.lock_state();
            let active = match state.active.as_mut() {
                Some(active) if active.records > 0 => {
                    active.writer.flush()?;
                    Some((active.path.clone(), true))
                }
                Some(active) => Some((active.path.clone(), false)),
                None => None,
            };

            for entry in fs::read_dir(&self.inner.directory)? {
                let path = entry?.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !path.is_file() {
                    continue;
                }
                if name.ends_with(ENCRYPTED_SUFFIX) {
                    encrypted += 1;
                    continue;
                }
                if !name.ends_with(COMPLETED_SUFFIX) && name.contains('.') {
                    continue;
                }

                let is_active = match &active {
                    Some((active, has_records)) if *active == path => {
                        if !has_records {
                            continue;
                        }
                        true
                    }
                    _ => false,
                };

                let file = File::open(&path)?;
                let len = file.metadata()?.len();
                if len == 0 {
                    continue;
                }
                // the active file keeps growing; stop at what was flushed
                let limit = if is_active { len } else { u64::MAX };
                sources.push((path, file.take(limit)));
            }
        }

        if encrypted > 0 {
            tracing::warn!(encrypted, "Encrypted artifacts cannot be read locally; leaving them out");
        }
        sources.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Box::new(
            sources
                .into_iter()
                .flat_map(|(path, source)| artifact_lines(path, source)),
        ))
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one record; returns `(written, directory_check_due)`
    fn write_locked(
        &self,
        state: &mut WriterState,
        bytes: &[u8],
    ) -> std::result::Result<(bool, bool), StoreError> {
        let active = match state.active.take() {
            Some(active) => active,
            None => self.open_new_file()?,
        };
        let active = state.active.insert(active);

        if let Err(e) = self.append(active, bytes) {
            self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                path = %active.path.display(),
                error = %e,
                "Write failed; rotating to a new file"
            );
            self.rotate_locked(state)?;
            return Ok((false, false));
        }
        active.records += 1;
        self.counters.records_written.fetch_add(1, Ordering::Relaxed);

        state.writes_since_check += 1;
        if state.writes_since_check < self.options.size_check_interval {
            return Ok((true, false));
        }
        state.writes_since_check = 0;

        let active_too_large = match state.active.as_mut() {
            Some(active) => match active
                .writer
                .flush()
                .and_then(|()| fs::metadata(&active.path))
            {
                Ok(metadata) => metadata.len() > self.options.max_file_bytes,
                Err(e) => {
                    tracing::warn!(
                        path = %active.path.display(),
                        error = %e,
                        "Size check failed; rotating"
                    );
                    true
                }
            },
            None => false,
        };
        if active_too_large {
            self.rotate_locked(state)?;
        }
        Ok((true, true))
    }

    fn append(&self, active: &mut ActiveFile, bytes: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure"));
        }
        active.writer.write_all(bytes)
    }

    fn rotate_locked(&self, state: &mut WriterState) -> std::result::Result<(), StoreError> {
        self.close_active(state);
        state.active = Some(self.open_new_file()?);
        Ok(())
    }

    fn close_active(&self, state: &mut WriterState) {
        let Some(active) = state.active.take() else {
            return;
        };

        let ActiveFile {
            path,
            writer,
            records,
        } = active;

        let closed = writer
            .finish()
            .and_then(|buffered| buffered.into_inner().map_err(|e| e.into_error()))
            .and_then(|file| file.sync_all());
        if let Err(e) = closed {
            tracing::warn!(path = %path.display(), error = %e, "Failed to close data file cleanly");
        }

        if records == 0 {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete empty data file");
            }
            return;
        }

        if let Some((artifact, encrypted)) = self.complete(&path) {
            self.counters.rotations.fetch_add(1, Ordering::Relaxed);
            log_rotation!(artifact, records, encrypted);
        }
    }

    /// Turns a closed file into a completed artifact
    ///
    /// Returns the artifact path and whether it is encrypted. When encryption
    /// fails the file is kept as a plain `.gz` artifact.
    fn complete(&self, path: &Path) -> Option<(PathBuf, bool)> {
        if let Some(public_key) = &self.public_key {
            match encrypt_closed(path, public_key) {
                EncryptOutcome::Success(encrypted) => return Some((encrypted, true)),
                EncryptOutcome::Failure(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Failed to encrypt artifact; keeping it unencrypted"
                    );
                }
            }
        }

        let completed = with_suffix(path, COMPLETED_SUFFIX);
        if let Err(e) = fs::rename(path, &completed) {
            tracing::error!(path = %path.display(), error = %e, "Failed to mark data file complete");
            return None;
        }
        Some((completed, false))
    }

    fn open_new_file(&self) -> std::result::Result<ActiveFile, StoreError> {
        let mut last_error = None;

        for attempt in 1..=OPEN_ATTEMPTS {
            let path = self.directory.join(Uuid::new_v4().to_string());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    let buffered = BufWriter::with_capacity(self.options.buffer_size, file);
                    tracing::debug!(path = %path.display(), "Opened data file");
                    return Ok(ActiveFile {
                        path,
                        writer: GzEncoder::new(buffered, self.options.compression),
                        records: 0,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "Failed to create data file"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(StoreError::ResourceExhausted {
            attempts: OPEN_ATTEMPTS,
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Turns leftovers of a previous process into completed artifacts
    fn promote_orphans(&self, active: Option<&Path>) -> std::result::Result<(), StoreError> {
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() || Some(path.as_path()) == active {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(PARTIAL_SUFFIX) {
                fs::remove_file(&path)?;
            } else if !name.contains('.') {
                if fs::metadata(&path)?.len() == 0 {
                    fs::remove_file(&path)?;
                } else if let Some((artifact, encrypted)) = self.complete(&path) {
                    tracing::info!(
                        artifact = %artifact.display(),
                        encrypted,
                        "Promoted data file left by a previous run"
                    );
                }
            }
        }
        Ok(())
    }

    fn completed_artifacts(&self) -> std::result::Result<Vec<PathBuf>, StoreError> {
        let mut artifacts = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let completed = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(COMPLETED_SUFFIX) || n.ends_with(ENCRYPTED_SUFFIX));
            if completed && path.is_file() {
                artifacts.push(path);
            }
        }
        artifacts.sort();
        Ok(artifacts)
    }

    /// File count and total bytes of the storage directory
    fn directory_usage(&self) -> (usize, u64) {
        let Ok(entries) = fs::read_dir(&self.directory) else {
            return (0, 0);
        };
        entries
            .filter_map(|entry| entry.ok()?.metadata().ok())
            .filter(|m| m.is_file())
            .fold((0, 0), |(files, bytes), m| (files + 1, bytes + m.len()))
    }

    async fn run_hand_off(
        self: Arc<Self>,
        cancel: CancellationSignal,
    ) -> std::result::Result<HandOffReport, StoreError> {
        let started = Instant::now();

        // listed under the lock: every completion happens while it is held
        let artifacts = {
            let mut state = self.lock_state();
            if state.started {
                if let Err(e) = self.rotate_locked(&mut state) {
                    tracing::warn!(error = %e, "Rotation before hand-off failed");
                }
            } else {
                self.close_active(&mut state);
            }
            self.completed_artifacts()?
        };
        let mut report = HandOffReport::new();

        for (index, path) in artifacts.iter().enumerate() {
            if is_cancelled(&cancel) {
                let remaining = artifacts.len() - index;
                tracing::info!(remaining, "Hand-off cancelled; remaining artifacts stay local");
                report.add_skipped(remaining);
                break;
            }

            match self.hand_off_artifact(path, &cancel).await {
                Ok(()) => report.add_success(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to hand off artifact");
                    report.add_failure(format!("{}: {e}", path.display()));
                }
            }
        }

        log_hand_off_complete!("file", &report, started.elapsed());
        Ok(report)
    }

    async fn hand_off_artifact(
        &self,
        path: &Path,
        cancel: &CancellationSignal,
    ) -> std::result::Result<(), StoreError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Io(format!("Unusable file name: {}", path.display())))?;
        let content_type = ContentType::from_path(path);

        let mut file = tokio::fs::File::open(path).await?;
        self.remote
            .write_stream(&mut file, name, content_type, cancel)
            .await?;
        drop(file);

        tokio::fs::remove_file(path).await?;
        tracing::debug!(path = %path.display(), %content_type, "Artifact handed off");
        Ok(())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Encrypts a closed data file to `<name>.gz.bin` and deletes the plaintext
fn encrypt_closed(closed: &Path, public_key: &ArtifactPublicKey) -> EncryptOutcome {
    let encrypted = with_suffix(closed, ENCRYPTED_SUFFIX);
    let partial = with_suffix(&encrypted, PARTIAL_SUFFIX);

    let result = encrypt_file(closed, &partial, public_key).and_then(|()| {
        fs::rename(&partial, &encrypted).map_err(|e| {
            let _ = fs::remove_file(&partial);
            EncryptionError::from(e)
        })
    });

    match result {
        Ok(()) => {
            if let Err(e) = fs::remove_file(closed) {
                tracing::warn!(
                    path = %closed.display(),
                    error = %e,
                    "Failed to delete unencrypted data file"
                );
            }
            EncryptOutcome::Success(encrypted)
        }
        Err(e) => EncryptOutcome::Failure(e),
    }
}

/// Records of one plaintext file, up to the first one that does not parse
fn artifact_lines<R>(path: PathBuf, source: R) -> impl Iterator<Item = (DatumType, String)> + Send
where
    R: Read + Send + 'static,
{
    serde_json::Deserializer::from_reader(BufReader::new(MultiGzDecoder::new(source)))
        .into_iter::<Datum>()
        .map_while(move |datum| match datum {
            Ok(datum) => Some(datum),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Stopped reading data file at an unreadable record"
                );
                None
            }
        })
        .filter_map(|datum| datum_line(&datum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::{AnonymizationContext, AnonymizationRegistry};
    use crate::domain::{DatumPayload, ProtocolId, VaultError};
    use crate::encryption::keys::tests::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY};
    use crate::encryption::{decrypt_artifact, ArtifactPrivateKey};
    use crate::store::{never_cancelled, DatumLines};
    use chrono::Utc;
    use flate2::read::MultiGzDecoder;
    use serde_json::Value;
    use std::io::Read;
    use tempfile::TempDir;
    use tokio::io::AsyncRead;

    struct NullRemote;

    #[async_trait]
    impl RemoteDataStore for NullRemote {
        async fn write_stream(
            &self,
            _stream: &mut (dyn AsyncRead + Send + Unpin),
            _name: &str,
            _content_type: ContentType,
            _cancel: &CancellationSignal,
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn write_datum_lines(
            &self,
            _lines: &DatumLines,
            _cancel: &CancellationSignal,
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    fn store(dir: &TempDir, options: FileStoreOptions) -> FileLocalDataStore {
        store_at(dir.path(), options)
    }

    fn store_at(directory: &Path, options: FileStoreOptions) -> FileLocalDataStore {
        let anonymizer = DatumAnonymizer::new(
            Arc::new(AnonymizationRegistry::standard()),
            AnonymizationContext::generate(None, "device"),
        );
        FileLocalDataStore::new(
            directory,
            options,
            Arc::new(anonymizer),
            Arc::new(NullRemote),
            never_cancelled(),
        )
        .unwrap()
    }

    fn speed(kph: f64) -> Datum {
        Datum::new(
            ProtocolId::new("study-1").unwrap(),
            Utc::now(),
            DatumPayload::Speed { kph: Some(kph) },
        )
    }

    fn read_records(bytes: &[u8]) -> Vec<Value> {
        let mut text = String::new();
        MultiGzDecoder::new(bytes).read_to_string(&mut text).unwrap();
        serde_json::Deserializer::from_str(&text)
            .into_iter::<Value>()
            .map(|v| v.unwrap())
            .collect()
    }

    fn encrypted_options() -> FileStoreOptions {
        FileStoreOptions {
            encrypt: true,
            public_key: Some(TEST_PUBLIC_KEY.to_string()),
            ..FileStoreOptions::default()
        }
    }

    fn line_kph(lines: &[(DatumType, String)]) -> Vec<f64> {
        let mut values: Vec<f64> = lines
            .iter()
            .map(|(_, json)| serde_json::from_str::<Value>(json).unwrap()["kph"].as_f64().unwrap())
            .collect();
        values.sort_by(f64::total_cmp);
        values
    }

    fn kph_values(paths: &[PathBuf]) -> Vec<f64> {
        paths
            .iter()
            .flat_map(|p| read_records(&fs::read(p).unwrap()))
            .map(|v| v["kph"].as_f64().unwrap())
            .collect()
    }

    #[test]
    fn test_start_opens_active_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        assert!(store.active_path().is_none());

        store.start().unwrap();
        let active = store.active_path().unwrap();
        assert!(active.exists());
        assert!(active.extension().is_none());
    }

    #[test]
    fn test_rotation_produces_completed_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        store.start().unwrap();

        assert!(store.write_datum(&speed(1.0)).unwrap());
        assert!(store.write_datum(&speed(2.0)).unwrap());
        store.rotate().unwrap();

        let artifacts = store.completed_artifacts().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].to_string_lossy().ends_with(".gz"));

        let records = read_records(&fs::read(&artifacts[0]).unwrap());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["anonymized"], true);
        assert_eq!(store.stats().rotations, 1);
    }

    #[test]
    fn test_rotation_deletes_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        store.start().unwrap();
        let first = store.active_path().unwrap();

        store.rotate().unwrap();
        assert!(!first.exists());
        assert!(store.completed_artifacts().unwrap().is_empty());
        assert_eq!(store.stats().files, 1);
    }

    #[test]
    fn test_write_failure_rotates_without_losing_records() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        store.start().unwrap();

        assert!(store.write_datum(&speed(1.0)).unwrap());
        let before = store.active_path().unwrap();

        store.fail_next_write();
        assert!(!store.write_datum(&speed(2.0)).unwrap());

        assert!(store.write_datum(&speed(3.0)).unwrap());
        let after = store.active_path().unwrap();
        assert_ne!(before, after);

        store.stop().unwrap();
        let artifacts = store.completed_artifacts().unwrap();
        assert_eq!(artifacts.len(), 2);

        let mut values = kph_values(&artifacts);
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![1.0, 3.0]);

        let stats = store.stats();
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.records_written, 2);
    }

    #[test]
    fn test_size_check_rotates_large_file() {
        let dir = TempDir::new().unwrap();
        let store = store(
            &dir,
            FileStoreOptions {
                compression: Compression::none(),
                buffer_size: 64,
                max_file_bytes: 1,
                size_check_interval: 5,
                ..FileStoreOptions::default()
            },
        );
        store.start().unwrap();

        for i in 0..10 {
            assert!(store.write_datum(&speed(f64::from(i))).unwrap());
        }

        assert_eq!(store.stats().rotations, 2);
        assert_eq!(store.completed_artifacts().unwrap().len(), 2);
    }

    #[test]
    fn test_encrypted_rotation() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, encrypted_options());
        store.start().unwrap();
        store.write_datum(&speed(42.0)).unwrap();
        store.stop().unwrap();

        let artifacts = store.completed_artifacts().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts[0].to_string_lossy().ends_with(".gz.bin"));

        let private_key = ArtifactPrivateKey::parse(TEST_PRIVATE_KEY).unwrap();
        let plain = decrypt_artifact(&fs::read(&artifacts[0]).unwrap(), &private_key).unwrap();
        assert_eq!(read_records(&plain)[0]["kph"], 42.0);
    }

    #[test]
    fn test_encryption_failure_keeps_plain_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, encrypted_options());
        store.start().unwrap();
        store.write_datum(&speed(7.0)).unwrap();

        // a directory where the ciphertext should go makes encryption fail
        let active = store.active_path().unwrap();
        fs::create_dir(with_suffix(&active, ".gz.bin.partial")).unwrap();
        store.stop().unwrap();

        let artifacts = store.completed_artifacts().unwrap();
        assert_eq!(artifacts, vec![with_suffix(&active, COMPLETED_SUFFIX)]);
        assert_eq!(kph_values(&artifacts), vec![7.0]);
        assert!(!active.exists());
        assert_eq!(store.stats().rotations, 1);
    }

    #[test]
    fn test_no_plaintext_name_while_encrypting() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, encrypted_options());
        store.start().unwrap();
        store.write_datum(&speed(1.0)).unwrap();
        let active = store.active_path().unwrap();
        store.rotate().unwrap();

        assert!(!with_suffix(&active, COMPLETED_SUFFIX).exists());
        assert!(!active.exists());
        assert_eq!(
            store.completed_artifacts().unwrap(),
            vec![with_suffix(&active, ENCRYPTED_SUFFIX)]
        );
    }

    #[test]
    fn test_unwritable_directory_exhausts_attempts() {
        let dir = TempDir::new().unwrap();
        let storage = dir.path().join("data");
        let store = store_at(&storage, FileStoreOptions::default());
        store.start().unwrap();

        // the storage directory turns into a plain file
        fs::remove_dir_all(&storage).unwrap();
        fs::write(&storage, b"not a directory").unwrap();

        let err = store.rotate().unwrap_err();
        assert!(matches!(
            err,
            VaultError::Store(StoreError::ResourceExhausted {
                attempts: OPEN_ATTEMPTS,
                ..
            })
        ));
        assert!(store.active_path().is_none());
    }

    #[test]
    fn test_data_lines_cover_artifacts_and_active_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        store.start().unwrap();
        store.write_datum(&speed(1.0)).unwrap();
        store.write_datum(&speed(2.0)).unwrap();
        store.rotate().unwrap();
        store.write_datum(&speed(3.0)).unwrap();

        let lines: Vec<_> = store.data_lines().unwrap().collect();
        assert!(lines.iter().all(|(kind, _)| *kind == DatumType::Speed));
        assert_eq!(line_kph(&lines), vec![1.0, 2.0, 3.0]);

        // reading leaves the store writable and its files in place
        assert!(store.write_datum(&speed(4.0)).unwrap());
        store.stop().unwrap();
        assert_eq!(kph_values(&store.completed_artifacts().unwrap()).len(), 4);
    }

    #[test]
    fn test_data_lines_skip_encrypted_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, encrypted_options());
        store.start().unwrap();
        store.write_datum(&speed(1.0)).unwrap();
        store.rotate().unwrap();
        store.write_datum(&speed(2.0)).unwrap();

        let lines: Vec<_> = store.data_lines().unwrap().collect();
        assert_eq!(line_kph(&lines), vec![2.0]);
    }

    #[test]
    fn test_data_lines_stop_at_truncated_record() {
        let dir = TempDir::new().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(serde_json::to_string(&speed(9.0)).unwrap().as_bytes())
            .unwrap();
        encoder.write_all(b"{\"id\":\"0b6f").unwrap();
        fs::write(
            dir.path().join(format!("{}.gz", Uuid::new_v4())),
            encoder.finish().unwrap(),
        )
        .unwrap();

        let store = store(&dir, FileStoreOptions::default());
        let lines: Vec<_> = store.data_lines().unwrap().collect();
        assert_eq!(line_kph(&lines), vec![9.0]);
    }

    #[test]
    fn test_encrypt_without_key_fails_fast() {
        let dir = TempDir::new().unwrap();
        let anonymizer = DatumAnonymizer::new(
            Arc::new(AnonymizationRegistry::standard()),
            AnonymizationContext::generate(None, "device"),
        );
        let result = FileLocalDataStore::new(
            dir.path(),
            FileStoreOptions {
                encrypt: true,
                ..FileStoreOptions::default()
            },
            Arc::new(anonymizer),
            Arc::new(NullRemote),
            never_cancelled(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_start_promotes_orphans() {
        let dir = TempDir::new().unwrap();
        {
            let store = store(&dir, FileStoreOptions::default());
            store.start().unwrap();
            store.write_datum(&speed(5.0)).unwrap();
            // simulate a crash: the active file is left behind unfinished
            let active = store.active_path().unwrap();
            let mut state = store.inner.lock_state();
            let orphan = state.active.take().unwrap();
            orphan.writer.finish().unwrap();
            assert!(active.exists());
        }
        fs::write(dir.path().join(Uuid::new_v4().to_string()), b"").unwrap();
        fs::write(dir.path().join("stale.gz.bin.partial"), b"junk").unwrap();

        let store = store(&dir, FileStoreOptions::default());
        store.start().unwrap();

        let artifacts = store.completed_artifacts().unwrap();
        assert_eq!(kph_values(&artifacts), vec![5.0]);
        // the promoted artifact plus the new active file
        assert_eq!(store.stats().files, 2);
    }

    #[test]
    fn test_clear_discards_everything() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        store.start().unwrap();
        store.write_datum(&speed(1.0)).unwrap();
        store.rotate().unwrap();
        store.write_datum(&speed(2.0)).unwrap();

        store.clear().unwrap();
        assert!(store.completed_artifacts().unwrap().is_empty());
        assert_eq!(store.stats().files, 1);
        assert!(store.write_datum(&speed(3.0)).unwrap());
    }

    #[test]
    fn test_options_from_config() {
        let config = LocalStoreConfig {
            compression_level: CompressionLevel::None,
            buffer_size: 0,
            max_file_size_mb: 2,
            ..LocalStoreConfig::default()
        };
        let options = FileStoreOptions::from_config(&config).unwrap();
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(options.max_file_bytes, 2 * BYTES_PER_MB);
        assert_eq!(options.compression, Compression::none());
    }

    #[test]
    fn test_size_description() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, FileStoreOptions::default());
        assert_eq!(store.size_description(), "0.0 MB");
    }

    #[tokio::test]
    async fn test_upload_disabled_keeps_data() {
        let dir = TempDir::new().unwrap();
        let store = store(
            &dir,
            FileStoreOptions {
                upload_to_remote: false,
                ..FileStoreOptions::default()
            },
        );
        store.start().unwrap();
        store.write_datum(&speed(1.0)).unwrap();
        store.rotate().unwrap();

        let report = store.write_to_remote(&never_cancelled()).await.unwrap();
        assert_eq!(report, HandOffReport::new());
        assert_eq!(store.completed_artifacts().unwrap().len(), 1);
    }
}
