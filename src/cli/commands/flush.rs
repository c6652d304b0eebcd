//! Flush command implementation
//!
//! Hands every buffered artifact to the remote store.

use super::open_local_store;
use crate::config::load_config;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the flush command
#[derive(Args, Debug)]
pub struct FlushArgs {
    /// Only hand off if the store has outgrown its size threshold
    #[arg(long)]
    pub if_too_large: bool,
}

impl FlushArgs {
    /// Execute the flush command
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
        println!("📤 Handing off {} of buffered data", store.size_description());

        let exit_code = if self.if_too_large {
            if store.flush_if_too_large(&shutdown_signal).await {
                println!("✅ Hand-off complete");
                0
            } else if store.is_too_large() {
                println!("⚠️  Hand-off did not complete");
                1
            } else {
                println!("Store is below its size threshold; nothing to do");
                0
            }
        } else {
            let report = store.write_to_remote(&shutdown_signal).await?;
            println!(
                "  Succeeded: {}  Failed: {}  Skipped: {}",
                report.succeeded, report.failed, report.skipped
            );
            for error in &report.errors {
                println!("  ❌ {error}");
            }
            if report.is_complete() {
                println!("✅ Hand-off complete");
                0
            } else {
                1 // Partial success exit code
            }
        };

        store.stop()?;
        Ok(exit_code)
    }
}
