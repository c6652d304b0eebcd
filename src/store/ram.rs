//! In-memory local store
//!
//! Keeps anonymized records in a set keyed by record id, so a record
//! submitted twice is held once. Hands off when the record count passes its
//! threshold.

use super::hand_off::HandOffCoordinator;
use super::remote::{DataLineIter, DatumLines, RemoteDataStore};
use super::{is_cancelled, CancellationSignal, HandOffReport, LocalDataStore, SizeTriggeredFlush};
use crate::anonymization::DatumAnonymizer;
use crate::domain::{Datum, Result, StoreError};
use crate::{log_dropped_datum, log_hand_off_complete};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

struct Inner {
    data: Mutex<HashSet<Datum>>,
    max_records: usize,
    upload_to_remote: bool,
    anonymizer: Arc<DatumAnonymizer>,
    remote: Arc<dyn RemoteDataStore>,
    shutdown: CancellationSignal,
    hand_off: HandOffCoordinator,
    flush: SizeTriggeredFlush,
}

/// Local store that buffers records in memory
#[derive(Clone)]
pub struct RamLocalDataStore {
    inner: Arc<Inner>,
}

impl RamLocalDataStore {
    pub fn new(
        max_records: usize,
        upload_to_remote: bool,
        anonymizer: Arc<DatumAnonymizer>,
        remote: Arc<dyn RemoteDataStore>,
        shutdown: CancellationSignal,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(HashSet::new()),
                max_records,
                upload_to_remote,
                anonymizer,
                remote,
                shutdown,
                hand_off: HandOffCoordinator::new(),
                flush: SizeTriggeredFlush::new(),
            }),
        }
    }

    /// Number of buffered records
    pub fn len(&self) -> usize {
        self.inner.lock_data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the buffered records
    pub fn records(&self) -> Vec<Datum> {
        self.inner.lock_data().iter().cloned().collect()
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
}

#[async_trait]
impl LocalDataStore for RamLocalDataStore {
    fn store_name(&self) -> &'static str {
        "ram"
    }

    fn write_datum(&self, datum: &Datum) -> Result<bool> {
        let anonymized = match self.inner.anonymizer.anonymize(datum) {
            Ok(anonymized) => anonymized,
            Err(e) => {
                log_dropped_datum!(datum.id(), datum.datum_type(), e);
                return Ok(false);
            }
        };

        let too_large = {
            let mut data = self.inner.lock_data();
            data.replace(anonymized);
            data.len() >= self.inner.max_records
        };

        if too_large {
            self.spawn_flush();
        }
        Ok(true)
    }

    fn is_too_large(&self) -> bool {
        self.len() >= self.inner.max_records
    }

    async fn write_to_remote(
        &self,
        cancel: &CancellationSignal,
    ) -> std::result::Result<HandOffReport, StoreError> {
        if !self.inner.upload_to_remote {
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
        self.inner.lock_data().clear();
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.inner.lock_data().clear();
        Ok(())
    }

    fn size_description(&self) -> String {
        format!("{} records", self.len())
    }

    fn data_lines(&self) -> Result<DataLineIter> {
        Ok(Box::new(DatumLines::new(self.records()).into_lines()))
    }
}

impl Inner {
    fn lock_data(&self) -> MutexGuard<'_, HashSet<Datum>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_hand_off(
        self: Arc<Self>,
        cancel: CancellationSignal,
    ) -> std::result::Result<HandOffReport, StoreError> {
        let started = Instant::now();
        let snapshot: Vec<Datum> = self.lock_data().iter().cloned().collect();
        let mut report = HandOffReport::new();

        if snapshot.is_empty() {
            return Ok(report);
        }
        if is_cancelled(&cancel) {
            report.add_skipped(snapshot.len());
            return Ok(report);
        }

        let lines = DatumLines::new(snapshot);
        match self.remote.write_datum_lines(&lines, &cancel).await {
            Ok(()) => {
                let mut data = self.lock_data();
                for datum in lines.data() {
                    data.remove(datum);
                }
                report.succeeded = lines.len();
            }
            Err(e) => {
                tracing::warn!(records = lines.len(), error = %e, "Failed to hand off records");
                report.failed = lines.len();
                report.errors.push(e.to_string());
            }
        }

        log_hand_off_complete!("ram", &report, started.elapsed());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::anonymizer::AnonymizerKind;
    use crate::anonymization::{AnonymizationContext, AnonymizationRegistry};
    use crate::domain::{DatumPayload, DatumType, ProtocolId};
    use crate::store::{never_cancelled, ContentType};
    use chrono::Utc;
    use tokio::io::AsyncRead;

    #[derive(Default)]
    struct CountingRemote {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl RemoteDataStore for CountingRemote {
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
            lines: &DatumLines,
            _cancel: &CancellationSignal,
        ) -> std::result::Result<(), StoreError> {
            self.batches.lock().unwrap().push(lines.iter().count());
            Ok(())
        }
    }

    fn engine() -> Arc<DatumAnonymizer> {
        Arc::new(DatumAnonymizer::new(
            Arc::new(AnonymizationRegistry::standard()),
            AnonymizationContext::generate(Some("participant"), "device"),
        ))
    }

    fn store(max_records: usize, remote: Arc<CountingRemote>) -> RamLocalDataStore {
        RamLocalDataStore::new(max_records, true, engine(), remote, never_cancelled())
    }

    fn speed(kph: f64) -> Datum {
        Datum::new(
            ProtocolId::new("study-1").unwrap(),
            Utc::now(),
            DatumPayload::Speed { kph: Some(kph) },
        )
    }

    #[test]
    fn test_duplicates_held_once() {
        let store = store(100, Arc::new(CountingRemote::default()));
        let datum = speed(3.0);

        assert!(store.write_datum(&datum).unwrap());
        assert!(store.write_datum(&datum).unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.size_description(), "1 records");
    }

    #[test]
    fn test_records_are_anonymized() {
        let engine = engine();
        engine
            .select(
                DatumType::Speed,
                "kph",
                Some(AnonymizerKind::Rounding { places: -1 }.instantiate().unwrap()),
            )
            .unwrap();
        let store = RamLocalDataStore::new(
            100,
            true,
            engine,
            Arc::new(CountingRemote::default()),
            never_cancelled(),
        );

        store.write_datum(&speed(47.0)).unwrap();
        let held = store.records();
        assert!(held[0].is_anonymized());
        assert_eq!(held[0].payload(), &DatumPayload::Speed { kph: Some(50.0) });
    }

    #[test]
    fn test_too_large_by_count() {
        let store = store(2, Arc::new(CountingRemote::default()));
        store.write_datum(&speed(1.0)).unwrap();
        assert!(!store.is_too_large());
        store.write_datum(&speed(2.0)).unwrap();
        assert!(store.is_too_large());
    }

    #[tokio::test]
    async fn test_hand_off_removes_records() {
        let remote = Arc::new(CountingRemote::default());
        let store = store(100, remote.clone());
        for i in 0..3 {
            store.write_datum(&speed(f64::from(i))).unwrap();
        }

        let report = store.write_to_remote(&never_cancelled()).await.unwrap();
        assert_eq!(report.succeeded, 3);
        assert!(store.is_empty());
        assert_eq!(*remote.batches.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_data_lines_snapshot() {
        let store = store(100, Arc::new(CountingRemote::default()));
        store.write_datum(&speed(1.0)).unwrap();
        store.write_datum(&speed(2.0)).unwrap();

        let lines: Vec<_> = store.data_lines().unwrap().collect();
        store.write_datum(&speed(3.0)).unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|(kind, json)| {
            *kind == DatumType::Speed && json.contains("\"anonymized\":true")
        }));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_clear() {
        let store = store(100, Arc::new(CountingRemote::default()));
        store.write_datum(&speed(1.0)).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
