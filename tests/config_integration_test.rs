//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables are serialized through
//! `ENV_MUTEX` to avoid interference between tests.

use sensorvault::config::{load_config, CompressionLevel, LocalStoreKind};
use sensorvault::store::FileStoreOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("SENSORVAULT_APPLICATION_LOG_LEVEL");
    std::env::remove_var("SENSORVAULT_PROTOCOL_DEVICE_ID");
    std::env::remove_var("SENSORVAULT_LOCAL_STORE_KIND");
    std::env::remove_var("SENSORVAULT_LOCAL_STORE_MAX_FILE_SIZE_MB");
    std::env::remove_var("SENSORVAULT_TEST_ARCHIVE");
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let config_file = write_config(
        r#"
[application]
log_level = "debug"
data_directory = "/var/lib/sensorvault"

[protocol]
id = "sleep-study"
participant_id = "p-042"
device_id = "phone-7"

[anonymization]
random_time_anchor = "0321-03-04T05:06:07Z"
study_origin = { latitude = 12.5, longitude = -45.25 }
study_longitude_offset = -12.0

[[anonymization.overrides]]
datum_type = "Speed"
field = "kph"
anonymizer = { kind = "rounding", places = -1 }

[local_store]
kind = "file"
compression_level = "fastest"
buffer_size = 4096
upload_to_remote = true
max_file_size_mb = 2
max_directory_size_mb = 20
size_check_interval = 500

[remote_store]
archive_path = "/srv/archive"

[logging]
local_enabled = true
local_path = "/var/log/sensorvault"
local_rotation = "hourly"
"#,
    );

    let config = load_config(config_file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.protocol.id, "sleep-study");
    assert_eq!(config.protocol.participant_id.as_deref(), Some("p-042"));
    assert_eq!(config.protocol.device_id, "phone-7");

    assert_eq!(config.anonymization.study_longitude_offset, Some(-12.0));
    assert_eq!(config.anonymization.overrides.len(), 1);

    assert_eq!(config.local_store.kind, LocalStoreKind::File);
    assert_eq!(config.local_store.compression_level, CompressionLevel::Fastest);
    assert_eq!(config.local_store.size_check_interval, 500);

    assert_eq!(config.remote_store.archive_path, "/srv/archive");
    assert!(config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "hourly");

    assert_eq!(
        config.store_directory(),
        PathBuf::from("/var/lib/sensorvault/sleep-study/file")
    );

    let options = FileStoreOptions::from_config(&config.local_store).unwrap();
    assert_eq!(options.buffer_size, 4096);
    assert_eq!(options.max_file_bytes, 2 * 1024 * 1024);
    assert_eq!(options.max_directory_bytes, 20 * 1024 * 1024);
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let config_file = write_config(
        r#"
[protocol]
id = "study-1"
"#,
    );

    let config = load_config(config_file.path()).unwrap();
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.protocol.device_id, "local-device");
    assert!(config.protocol.participant_id.is_none());
    assert_eq!(config.local_store.kind, LocalStoreKind::File);
    assert_eq!(config.local_store.compression_level, CompressionLevel::Optimal);
    assert!(!config.local_store.encrypt);
    assert!(config.local_store.upload_to_remote);
    assert_eq!(config.local_store.max_file_size_mb, 1);
    assert_eq!(config.local_store.max_directory_size_mb, 10);
    assert!(config.anonymization.overrides.is_empty());
}

#[test]
fn test_env_overrides() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    std::env::set_var("SENSORVAULT_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("SENSORVAULT_PROTOCOL_DEVICE_ID", "tablet-3");
    std::env::set_var("SENSORVAULT_LOCAL_STORE_KIND", "ram");
    std::env::set_var("SENSORVAULT_TEST_ARCHIVE", "/mnt/archive");

    let config_file = write_config(
        r#"
[protocol]
id = "study-1"

[remote_store]
archive_path = "${SENSORVAULT_TEST_ARCHIVE}"
"#,
    );

    let result = load_config(config_file.path());
    cleanup_env_vars();

    let config = result.unwrap();
    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.protocol.device_id, "tablet-3");
    assert_eq!(config.local_store.kind, LocalStoreKind::Ram);
    assert_eq!(config.remote_store.archive_path, "/mnt/archive");
}

#[test]
fn test_invalid_configs_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let cases = [
        // encryption without a key
        "[protocol]\nid = \"s\"\n[local_store]\nencrypt = true\n",
        // directory smaller than one file
        "[protocol]\nid = \"s\"\n[local_store]\nmax_file_size_mb = 5\nmax_directory_size_mb = 2\n",
        // protocol id that escapes the data directory
        "[protocol]\nid = \"../s\"\n",
        // anonymizer the field does not offer
        "[protocol]\nid = \"s\"\n[[anonymization.overrides]]\ndatum_type = \"Speed\"\nfield = \"kph\"\nanonymizer = { kind = \"timeline\" }\n",
        // unknown store kind
        "[protocol]\nid = \"s\"\n[local_store]\nkind = \"tape\"\n",
    ];

    for contents in cases {
        let config_file = write_config(contents);
        assert!(
            load_config(config_file.path()).is_err(),
            "accepted invalid config:\n{contents}"
        );
    }
}

#[test]
fn test_missing_file() {
    assert!(load_config("/nonexistent/sensorvault.toml").is_err());
}
