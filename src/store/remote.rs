//! Remote store contract
//!
//! The remote store is the durable archive that local stores hand their data
//! to. This crate does not implement a particular backend; it only defines the
//! contract (see [`crate::adapters::directory`] for a local reference
//! implementation).

use super::{CancellationSignal, LocalDataStore};
use crate::domain::{Datum, DatumType, StoreError};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tokio::io::AsyncRead;

/// Content type of a file-shaped artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Plain gzip artifact (`.gz`)
    Gzip,
    /// Encrypted artifact (`.gz.bin`)
    OctetStream,
}

impl ContentType {
    /// Derives the content type from an artifact's file name
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Self::Gzip,
            _ => Self::OctetStream,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "application/gzip",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized records handed off by the RAM store
///
/// Iterating is lazy and can be restarted any number of times; each pass
/// yields `(record kind, anonymized JSON)` for every record in the snapshot.
#[derive(Debug, Clone, Default)]
pub struct DatumLines {
    data: Vec<Datum>,
}

impl DatumLines {
    pub fn new(data: Vec<Datum>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The records in the snapshot
    pub fn data(&self) -> &[Datum] {
        &self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = (DatumType, String)> + '_ {
        self.data.iter().filter_map(datum_line)
    }

    /// Consumes the snapshot into owned lines
    pub fn into_lines(self) -> impl Iterator<Item = (DatumType, String)> + Send {
        self.data.into_iter().filter_map(|datum| datum_line(&datum))
    }
}

/// Owned, lazily produced `(record kind, anonymized JSON)` pairs
pub type DataLineIter = Box<dyn Iterator<Item = (DatumType, String)> + Send>;

pub(crate) fn datum_line(datum: &Datum) -> Option<(DatumType, String)> {
    match serde_json::to_string(datum) {
        Ok(json) => Some((datum.datum_type(), json)),
        Err(e) => {
            tracing::warn!(datum_id = %datum.id(), error = %e, "Could not serialize record");
            None
        }
    }
}

/// Durable sink for locally buffered data
#[async_trait]
pub trait RemoteDataStore: Send + Sync {
    /// Stores one file-shaped artifact
    ///
    /// Returning `Ok` means the artifact is durable and may be deleted locally.
    async fn write_stream(
        &self,
        stream: &mut (dyn AsyncRead + Send + Unpin),
        name: &str,
        content_type: ContentType,
        cancel: &CancellationSignal,
    ) -> Result<(), StoreError>;

    /// Stores a batch of serialized records
    ///
    /// Returning `Ok` means every record is durable.
    async fn write_datum_lines(
        &self,
        lines: &DatumLines,
        cancel: &CancellationSignal,
    ) -> Result<(), StoreError>;

    /// Entry point for a local store's size-triggered flush
    ///
    /// Returns `true` if the hand-off completed without failures.
    async fn write_local_store(
        &self,
        local: &dyn LocalDataStore,
        cancel: &CancellationSignal,
    ) -> Result<bool, StoreError> {
        let report = local.write_to_remote(cancel).await?;
        Ok(report.is_complete())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DatumPayload, ProtocolId};
    use chrono::Utc;

    #[test]
    fn test_content_type_from_path() {
        assert_eq!(
            ContentType::from_path(Path::new("/d/0b6f.gz")),
            ContentType::Gzip
        );
        assert_eq!(
            ContentType::from_path(Path::new("/d/0b6f.gz.bin")),
            ContentType::OctetStream
        );
        assert_eq!(ContentType::Gzip.as_str(), "application/gzip");
        assert_eq!(
            ContentType::OctetStream.to_string(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_datum_lines_restartable() {
        let protocol = ProtocolId::new("study-1").unwrap();
        let lines = DatumLines::new(vec![
            Datum::new(protocol.clone(), Utc::now(), DatumPayload::Speed { kph: Some(1.0) }),
            Datum::new(protocol, Utc::now(), DatumPayload::accelerometer(0.0, 0.1, 9.8)),
        ]);

        let first: Vec<_> = lines.iter().collect();
        let second: Vec<_> = lines.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].0, DatumType::Speed);
        assert!(first[1].1.contains("\"type\":\"Accelerometer\""));
    }
}
