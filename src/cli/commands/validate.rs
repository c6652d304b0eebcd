//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Sensorvault configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let store = &config.local_store;
        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Protocol: {}", config.protocol.id);
        println!(
            "  Participant: {}",
            config.protocol.participant_id.as_deref().unwrap_or("(device id)")
        );
        println!("  Local Store: {}", store.kind);
        println!("  Store Directory: {}", config.store_directory().display());
        println!("  Compression: {:?}", store.compression_level);
        println!("  Encryption: {}", if store.encrypt { "enabled" } else { "disabled" });
        println!(
            "  Thresholds: {} MB per file, {} MB per directory",
            store.max_file_size_mb, store.max_directory_size_mb
        );
        println!(
            "  Upload: {}",
            if store.upload_to_remote {
                config.remote_store.archive_path.as_str()
            } else {
                "disabled"
            }
        );
        println!(
            "  Anonymization Overrides: {}",
            config.anonymization.overrides.len()
        );
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_validate_reports_invalid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[protocol]\nid = \"\"\n").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_validate_accepts_minimal_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[protocol]\nid = \"study-1\"\n").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
