//! Archive directory remote store
//!
//! Every artifact is written to a hidden temporary file, synced, and renamed
//! into place, so a name that appears in the archive always refers to a
//! complete artifact. Record batches from the RAM store are archived as one
//! gzip artifact per batch, in the same format the file store produces.

use crate::domain::{Result, StoreError, VaultError};
use crate::store::{is_cancelled, CancellationSignal, ContentType, DatumLines, RemoteDataStore};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

/// Remote store that archives artifacts in a directory
#[derive(Debug, Clone)]
pub struct DirectoryRemoteStore {
    archive: PathBuf,
}

impl DirectoryRemoteStore {
    /// Opens the archive, creating the directory if needed
    pub fn new(archive: &Path) -> Result<Self> {
        std::fs::create_dir_all(archive).map_err(|e| {
            VaultError::Remote(format!(
                "Failed to create archive directory {}: {e}",
                archive.display()
            ))
        })?;
        Ok(Self {
            archive: archive.to_path_buf(),
        })
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Archived artifacts, sorted by name
    pub fn artifacts(&self) -> Result<Vec<PathBuf>> {
        let mut artifacts = Vec::new();
        for entry in std::fs::read_dir(&self.archive)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if path.is_file() && !hidden {
                artifacts.push(path);
            }
        }
        artifacts.sort();
        Ok(artifacts)
    }

    async fn store(
        &self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
    ) -> std::result::Result<u64, StoreError> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(StoreError::Remote(format!("Invalid artifact name: {name:?}")));
        }

        let destination = self.archive.join(name);
        let temporary = self.archive.join(format!(".{name}.{}.tmp", Uuid::new_v4()));

        let written = async {
            let mut file = tokio::fs::File::create(&temporary).await?;
            let bytes = tokio::io::copy(stream, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            tokio::fs::rename(&temporary, &destination).await?;
            Ok::<_, std::io::Error>(bytes)
        }
        .await;

        match written {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let _ = tokio::fs::remove_file(&temporary).await;
                Err(StoreError::Remote(format!(
                    "Failed to archive {}: {e}",
                    destination.display()
                )))
            }
        }
    }
}

#[async_trait]
impl RemoteDataStore for DirectoryRemoteStore {
    async fn write_stream(
        &self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
        content_type: ContentType,
        cancel: &CancellationSignal,
    ) -> std::result::Result<(), StoreError> {
        if is_cancelled(cancel) {
            return Err(StoreError::Remote("cancelled".to_string()));
        }

        let bytes = self.store(stream, name).await?;
        tracing::debug!(name, %content_type, bytes, "Archived artifact");
        Ok(())
    }

    async fn write_datum_lines(
        &self,
        lines: &DatumLines,
        cancel: &CancellationSignal,
    ) -> std::result::Result<(), StoreError> {
        if is_cancelled(cancel) {
            return Err(StoreError::Remote("cancelled".to_string()));
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for (_, json) in lines.iter() {
            encoder.write_all(json.as_bytes())?;
        }
        let compressed = encoder.finish()?;

        let name = format!("{}.gz", Uuid::new_v4());
        self.store(&mut compressed.as_slice(), &name).await?;
        tracing::debug!(name = %name, records = lines.len(), "Archived record batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Datum, DatumPayload, ProtocolId};
    use crate::store::never_cancelled;
    use chrono::Utc;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_write_stream_archives_bytes() {
        let dir = TempDir::new().unwrap();
        let remote = DirectoryRemoteStore::new(dir.path()).unwrap();

        let mut stream: &[u8] = b"artifact bytes";
        remote
            .write_stream(&mut stream, "a.gz", ContentType::Gzip, &never_cancelled())
            .await
            .unwrap();

        let artifacts = remote.artifacts().unwrap();
        assert_eq!(artifacts, vec![dir.path().join("a.gz")]);
        assert_eq!(std::fs::read(&artifacts[0]).unwrap(), b"artifact bytes");
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let remote = DirectoryRemoteStore::new(dir.path()).unwrap();

        let mut stream: &[u8] = b"x";
        let err = remote
            .write_stream(&mut stream, "../escape.gz", ContentType::Gzip, &never_cancelled())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Remote(_)));
        assert!(remote.artifacts().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_write_is_refused() {
        let dir = TempDir::new().unwrap();
        let remote = DirectoryRemoteStore::new(dir.path()).unwrap();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let mut stream: &[u8] = b"x";
        assert!(remote
            .write_stream(&mut stream, "a.gz", ContentType::Gzip, &rx)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_datum_lines_archived_as_gzip() {
        let dir = TempDir::new().unwrap();
        let remote = DirectoryRemoteStore::new(dir.path()).unwrap();
        let protocol = ProtocolId::new("study-1").unwrap();
        let lines = DatumLines::new(vec![
            Datum::new(protocol.clone(), Utc::now(), DatumPayload::Speed { kph: Some(1.0) }),
            Datum::new(protocol, Utc::now(), DatumPayload::Speed { kph: Some(2.0) }),
        ]);

        remote
            .write_datum_lines(&lines, &never_cancelled())
            .await
            .unwrap();

        let artifacts = remote.artifacts().unwrap();
        assert_eq!(artifacts.len(), 1);

        let mut text = String::new();
        GzDecoder::new(std::fs::File::open(&artifacts[0]).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        let count = serde_json::Deserializer::from_str(&text)
            .into_iter::<serde_json::Value>()
            .count();
        assert_eq!(count, 2);
    }
}
