//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::VaultConfig;
use crate::domain::errors::VaultError;
use crate::domain::result::Result;
use regex::Regex;
use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into VaultConfig
/// 4. Applies environment variable overrides (SENSORVAULT_* prefix)
/// 5. Validates the configuration
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns an error if:
/// - File cannot be read
/// - TOML parsing fails
/// - Environment variable substitution fails
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use sensorvault::config::loader::load_config;
///
/// let config = load_config("sensorvault.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<VaultConfig> {
    let path = path.as_ref();

    // Check if file exists
    if !path.exists() {
        return Err(VaultError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    // Read file contents
    let contents = fs::read_to_string(path).map_err(|e| {
        VaultError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    // Perform environment variable substitution
    let contents = substitute_env_vars(&contents)?;

    // Parse TOML
    let mut config: VaultConfig = toml::from_str(&contents)
        .map_err(|e| VaultError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    // Apply environment variable overrides
    apply_env_overrides(&mut config)?;

    // Validate configuration
    config.validate().map_err(|e| {
        VaultError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// # Arguments
///
/// * `input` - String containing ${VAR} placeholders
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| VaultError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    // Process line by line to skip comments
    for line in input.lines() {
        let trimmed = line.trim_start();

        // Skip comment lines - don't process env vars in comments
        if trimmed.starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        // Process non-comment lines for env var substitution
        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(VaultError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using SENSORVAULT_* prefix
///
/// Environment variables follow the pattern: SENSORVAULT_<SECTION>_<KEY>
/// For example: SENSORVAULT_LOCAL_STORE_ENCRYPT, SENSORVAULT_PROTOCOL_ID
///
/// # Arguments
///
/// * `config` - Mutable reference to the configuration to update
fn apply_env_overrides(config: &mut VaultConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("SENSORVAULT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("SENSORVAULT_APPLICATION_DATA_DIRECTORY") {
        config.application.data_directory = val;
    }

    // Protocol overrides
    if let Ok(val) = std::env::var("SENSORVAULT_PROTOCOL_ID") {
        config.protocol.id = val;
    }
    if let Ok(val) = std::env::var("SENSORVAULT_PROTOCOL_PARTICIPANT_ID") {
        config.protocol.participant_id = Some(val);
    }
    if let Ok(val) = std::env::var("SENSORVAULT_PROTOCOL_DEVICE_ID") {
        config.protocol.device_id = val;
    }

    // Local store overrides
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_KIND") {
        config.local_store.kind = parse_enum("SENSORVAULT_LOCAL_STORE_KIND", &val)?;
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_COMPRESSION_LEVEL") {
        config.local_store.compression_level =
            parse_enum("SENSORVAULT_LOCAL_STORE_COMPRESSION_LEVEL", &val)?;
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_BUFFER_SIZE") {
        if let Ok(size) = val.parse() {
            config.local_store.buffer_size = size;
        }
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_ENCRYPT") {
        config.local_store.encrypt = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_PUBLIC_KEY") {
        config.local_store.public_key = Some(val);
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_UPLOAD_TO_REMOTE") {
        config.local_store.upload_to_remote = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_MAX_FILE_SIZE_MB") {
        if let Ok(size) = val.parse() {
            config.local_store.max_file_size_mb = size;
        }
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOCAL_STORE_MAX_DIRECTORY_SIZE_MB") {
        if let Ok(size) = val.parse() {
            config.local_store.max_directory_size_mb = size;
        }
    }

    // Remote store overrides
    if let Ok(val) = std::env::var("SENSORVAULT_REMOTE_STORE_ARCHIVE_PATH") {
        config.remote_store.archive_path = val;
    }

    // Logging overrides
    if let Ok(val) = std::env::var("SENSORVAULT_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("SENSORVAULT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

/// Parses a lowercase enum value the way the TOML file spells it
fn parse_enum<T: DeserializeOwned>(name: &str, value: &str) -> Result<T> {
    let deserializer: StrDeserializer<'_, serde::de::value::Error> =
        value.trim().into_deserializer();
    T::deserialize(deserializer)
        .map_err(|e| VaultError::Configuration(format!("Invalid {name} '{value}': {e}")))
}
