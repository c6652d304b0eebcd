//! Export command implementation
//!
//! Writes everything the local store can read into a zip archive with one
//! JSON array per record kind, for sharing data without a remote store.

use super::open_local_store;
use crate::config::load_config;
use crate::domain::StoreError;
use crate::store::export_to_zip;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Zip archive to write [default: <protocol>_Data_<date>_<time>.zip]
    #[arg(short, long)]
    pub output: Option<String>,

    /// Overwrite an existing archive
    #[arg(long)]
    pub force: bool,
}

impl ExportArgs {
    /// Execute the export command
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

        let folder = export_folder_name(&config.protocol.id, Utc::now());
        let output = self
            .output
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{folder}.zip")));

        if output.exists() && !self.force {
            eprintln!(
                "❌ {} already exists (use --force to overwrite)",
                output.display()
            );
            return Ok(2);
        }

        let store = open_local_store(&config, shutdown_signal.clone())?;
        println!("📦 Exporting {} of local data", store.size_description());

        let exported = store
            .data_lines()
            .map_err(|e| StoreError::Io(e.to_string()))
            .and_then(|lines| export_to_zip(lines, &output, &folder, &shutdown_signal));
        store.stop()?;

        match exported {
            Ok(summary) => {
                for (kind, count) in &summary.by_type {
                    println!("  {kind}: {count}");
                }
                println!(
                    "✅ Exported {} records to {}",
                    summary.records(),
                    output.display()
                );
                Ok(0)
            }
            Err(StoreError::Cancelled) => {
                println!("⚠️  Export cancelled; no archive written");
                Ok(1)
            }
            Err(e) => {
                eprintln!("❌ Export failed: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }
}

/// `<protocol>_Data_<YYYYMMDD>_<HHMM>` with anything but ASCII letters and
/// digits replaced by `_`
fn export_folder_name(protocol: &str, now: DateTime<Utc>) -> String {
    format!("{protocol}_Data_{}", now.format("%Y%m%d_%H%M"))
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
