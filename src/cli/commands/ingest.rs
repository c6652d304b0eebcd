//! Ingest command implementation
//!
//! Reads JSON records (one after another, any whitespace between them) from a
//! file or stdin and writes each one through the configured local store.

use super::open_local_store;
use crate::config::{load_config, LocalStoreKind};
use crate::domain::Datum;
use crate::store::is_cancelled;
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader, Read};
use tokio::sync::watch;

/// Arguments for the ingest command
#[derive(Args, Debug)]
pub struct IngestArgs {
    /// File with JSON records; reads stdin when omitted
    #[arg(short, long)]
    pub input: Option<String>,

    /// Hand everything off to the remote store when done
    #[arg(long)]
    pub flush: bool,
}

/// Counts of one ingest run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub accepted: usize,
    pub dropped: usize,
    pub malformed: bool,
}

impl IngestArgs {
    /// Execute the ingest command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let store = open_local_store(&config, shutdown_signal.clone())?;
        let reader: Box<dyn Read> = match &self.input {
            Some(path) => Box::new(File::open(path)?),
            None => Box::new(io::stdin().lock()),
        };

        tracing::info!(
            store = store.store_name(),
            input = self.input.as_deref().unwrap_or("stdin"),
            "Starting ingest"
        );

        let summary = ingest(BufReader::new(reader), &shutdown_signal, |datum| {
            store.write_datum(datum)
        })?;

        println!("📥 Ingest complete");
        println!("  Accepted: {}", summary.accepted);
        println!("  Dropped: {}", summary.dropped);
        if summary.malformed {
            println!("  ⚠️  Input ended with malformed JSON; the remainder was skipped");
        }

        // RAM buffers do not outlive the process
        let mut hand_off_complete = true;
        if self.flush || config.local_store.kind == LocalStoreKind::Ram {
            let report = store.write_to_remote(&shutdown_signal).await?;
            println!(
                "  Handed off: {} succeeded, {} failed, {} skipped",
                report.succeeded, report.failed, report.skipped
            );
            hand_off_complete = report.is_complete();
        }

        store.stop()?;
        println!("  Local store: {}", store.size_description());

        if summary.dropped > 0 || summary.malformed || !hand_off_complete {
            Ok(1) // Partial success exit code
        } else {
            Ok(0)
        }
    }
}

/// Streams records from `reader` into `write`
///
/// Stops early when `shutdown` is raised or the input stops being valid JSON.
pub fn ingest<R, W>(
    reader: R,
    shutdown: &watch::Receiver<bool>,
    mut write: W,
) -> crate::domain::Result<IngestSummary>
where
    R: Read,
    W: FnMut(&Datum) -> crate::domain::Result<bool>,
{
    let mut summary = IngestSummary::default();

    for record in serde_json::Deserializer::from_reader(reader).into_iter::<Datum>() {
        if is_cancelled(shutdown) {
            tracing::info!(accepted = summary.accepted, "Ingest interrupted by shutdown");
            break;
        }

        let datum = match record {
            Ok(datum) => datum,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed record; stopping");
                summary.malformed = true;
                break;
            }
        };

        if write(&datum)? {
            summary.accepted += 1;
        } else {
            summary.dropped += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::never_cancelled;

    const RECORDS: &str = r#"
{"id":"7d44b88c-4199-4bad-97dc-d78268e01398","device_id":"d","protocol_id":"study-1","timestamp":"2024-05-01T12:00:00Z","type":"Speed","kph":3.5}
{"id":"0b6f2b0e-6a55-4e57-9d3c-1f2f0d1b6a11","device_id":"d","protocol_id":"study-1","timestamp":"2024-05-01T12:00:01Z","type":"Speed","kph":4.0}
"#;

    #[test]
    fn test_ingest_counts_records() {
        let mut seen = Vec::new();
        let summary = ingest(RECORDS.as_bytes(), &never_cancelled(), |datum| {
            seen.push(datum.id());
            Ok(true)
        })
        .unwrap();

        assert_eq!(summary.accepted, 2);
        assert_eq!(seen.len(), 2);
        assert!(!summary.malformed);
    }

    #[test]
    fn test_ingest_stops_on_malformed_input() {
        let input = format!("{RECORDS}{{\"type\":");
        let summary = ingest(input.as_bytes(), &never_cancelled(), |_| Ok(false)).unwrap();

        assert_eq!(summary.dropped, 2);
        assert!(summary.malformed);
    }

    #[test]
    fn test_ingest_honours_shutdown() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let summary = ingest(RECORDS.as_bytes(), &rx, |_| Ok(true)).unwrap();
        assert_eq!(summary.accepted, 0);
    }
}
