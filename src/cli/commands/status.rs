//! Status command implementation
//!
//! This module implements the `status` command for displaying what the local
//! store holds and what the archive has received.

use super::{build_anonymizer, build_remote};
use crate::adapters::directory::DirectoryRemoteStore;
use crate::config::{load_config, LocalStoreKind};
use crate::store::{never_cancelled, FileLocalDataStore, FileStoreOptions};
use clap::Args;
use std::path::Path;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// List every completed artifact
    #[arg(long)]
    pub list: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking store status");

        println!("📊 Store Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(2); // Configuration error exit code
            }
        };

        println!("  Protocol: {}", config.protocol.id);
        println!("  Local Store: {}", config.local_store.kind);

        if config.local_store.kind == LocalStoreKind::Ram {
            println!("  The RAM store holds no data between runs.");
        } else {
            // Not started, so nothing on disk changes
            let store = FileLocalDataStore::new(
                &config.store_directory(),
                FileStoreOptions::from_config(&config.local_store)?,
                build_anonymizer(&config)?,
                build_remote(&config)?,
                never_cancelled(),
            )?;
            let stats = store.stats();
            let artifacts = store.completed_artifacts()?;
            let encrypted = artifacts
                .iter()
                .filter(|p| p.extension().is_some_and(|e| e == "bin"))
                .count();

            println!("  Directory: {}", store.directory().display());
            println!(
                "  Files: {} ({} bytes)",
                stats.files, stats.bytes
            );
            println!(
                "  Completed Artifacts: {} ({} encrypted)",
                artifacts.len(),
                encrypted
            );
            if self.list {
                for artifact in &artifacts {
                    println!("    {}", artifact.display());
                }
            }
        }

        let archive = DirectoryRemoteStore::new(Path::new(&config.remote_store.archive_path))?;
        println!();
        println!(
            "  Archive: {} ({} artifacts)",
            archive.archive().display(),
            archive.artifacts()?.len()
        );
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_of_fresh_store() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sensorvault.toml");
        std::fs::write(
            &config_path,
            format!(
                "[application]\ndata_directory = \"{}\"\n\n[protocol]\nid = \"study-1\"\n\n[remote_store]\narchive_path = \"{}\"\n",
                dir.path().join("data").display(),
                dir.path().join("archive").display()
            ),
        )
        .unwrap();

        let args = StatusArgs { list: true };
        assert_eq!(args.execute(config_path.to_str().unwrap()).await.unwrap(), 0);
        assert!(dir.path().join("data/study-1/file").is_dir());
    }

    #[tokio::test]
    async fn test_status_with_missing_config() {
        let args = StatusArgs { list: false };
        assert_eq!(args.execute("/nonexistent/sensorvault.toml").await.unwrap(), 2);
    }
}
