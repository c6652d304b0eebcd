//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file. Study-wide anonymization parameters are drawn once
//! here, so every device configured from the file shares them.

use crate::anonymization::context::{random_longitude_offset, random_time_anchor, GeoPoint};
use chrono::SecondsFormat;
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "sensorvault.toml")]
    pub output: String,

    /// Protocol (study) identifier to write into the file
    #[arg(long, default_value = "my-study")]
    pub protocol: String,

    /// Include example anonymization overrides and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

/// Study-wide anonymization parameters written into a new configuration
struct StudyParameters {
    random_time_anchor: String,
    origin: GeoPoint,
    longitude_offset: f64,
}

impl StudyParameters {
    fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            random_time_anchor: random_time_anchor(&mut rng)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            origin: GeoPoint::random(&mut rng),
            longitude_offset: random_longitude_offset(&mut rng),
        }
    }
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Sensorvault configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = self.generate_config(&StudyParameters::generate());

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. To encrypt artifacts, run: sensorvault keygen");
                println!("     and paste the public key into [local_store]");
                println!("  3. Validate configuration: sensorvault validate-config");
                println!("  4. Buffer records: sensorvault ingest --input records.json");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    fn generate_config(&self, study: &StudyParameters) -> String {
        let mut content = format!(
            r#"# Sensorvault Configuration File

[application]
log_level = "info"
data_directory = "./data/sensorvault"

[protocol]
id = "{protocol}"
# participant_id = "participant-001"
device_id = "local-device"

[anonymization]
# Shared by every device in the study; keep them identical across devices
random_time_anchor = "{anchor}"
study_origin = {{ latitude = {latitude:.6}, longitude = {longitude:.6} }}
study_longitude_offset = {offset:.6}

[local_store]
kind = "file"
compression_level = "optimal"
encrypt = false
# public_key = "<base64 DER public key from `sensorvault keygen`>"
upload_to_remote = true
max_file_size_mb = 1
max_directory_size_mb = 10
size_check_interval = 10000

[remote_store]
archive_path = "./data/archive"

[logging]
local_enabled = false
local_path = "./logs"
local_rotation = "daily"
"#,
            protocol = self.protocol,
            anchor = study.random_time_anchor,
            latitude = study.origin.latitude,
            longitude = study.origin.longitude,
            offset = study.longitude_offset,
        );

        if self.with_examples {
            content.push_str(
                r#"
# Anonymization overrides select an anonymizer per record field.
# Fields without an override are stored unchanged.

[[anonymization.overrides]]
datum_type = "Location"
field = "latitude"
anonymizer = { kind = "rebase_latitude", origin = "participant" }

[[anonymization.overrides]]
datum_type = "Location"
field = "longitude"
anonymizer = { kind = "longitude_offset", scope = "participant" }

[[anonymization.overrides]]
datum_type = "Speed"
field = "kph"
anonymizer = { kind = "rounding", places = -1 }

[[anonymization.overrides]]
datum_type = "Sms"
field = "message"
anonymizer = { kind = "pattern_redaction" }
pattern = "\\d{3}-\\d{4}"
"#,
            );
        }

        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::TempDir;

    fn args(output: &Path, with_examples: bool) -> InitArgs {
        InitArgs {
            output: output.display().to_string(),
            protocol: "study-1".to_string(),
            with_examples,
            force: false,
        }
    }

    #[tokio::test]
    async fn test_generated_config_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sensorvault.toml");

        assert_eq!(args(&path, true).execute().await.unwrap(), 0);

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.protocol.id, "study-1");
        assert!(config.anonymization.random_time_anchor.is_some());
        assert!(config.anonymization.study_origin.is_some());
        assert_eq!(config.anonymization.overrides.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sensorvault.toml");
        fs::write(&path, "existing").unwrap();

        assert_eq!(args(&path, false).execute().await.unwrap(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "existing");
    }
}
