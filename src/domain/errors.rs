//! Domain error types
//!
//! This module defines the error hierarchy for Sensorvault. Errors are
//! domain-specific and don't expose third-party types: cipher, JSON and I/O
//! failures are flattened into messages at the boundary.

use thiserror::Error;

/// Main Sensorvault error type
///
/// This is the primary error type used throughout the library.
/// It wraps the sub-domain error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anonymization errors
    #[error("Anonymization error: {0}")]
    Anonymization(#[from] AnonymizationError),

    /// Encryption errors
    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    /// Local store errors
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    /// Remote store errors
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Errors raised while applying anonymizers to record fields
///
/// Any of these drops the offending record from the current write attempt;
/// none of them is fatal to the store.
#[derive(Debug, Clone, Error)]
pub enum AnonymizationError {
    /// The anonymizer cannot handle the kind of value it was given
    #[error("Anonymizer '{anonymizer}' cannot handle a {kind} value")]
    UnsupportedValueKind {
        anonymizer: &'static str,
        kind: &'static str,
    },

    /// A redaction pattern was empty or failed to compile
    #[error("Invalid redaction pattern: {0}")]
    InvalidPattern(String),

    /// No binding exists for the requested record field
    #[error("No anonymizable field '{field}' on {datum_type} records")]
    UnknownField { datum_type: String, field: String },

    /// The anonymizer is not one of the field's declared candidates
    #[error("Anonymizer '{anonymizer}' is not a candidate for {datum_type}.{field}")]
    NotACandidate {
        anonymizer: String,
        datum_type: String,
        field: String,
    },

    /// An anonymizer kind needs a parameter that was not supplied
    #[error("Anonymizer '{0}' requires a parameter that was not supplied")]
    MissingParameter(String),

    /// The record could not be converted to or from its JSON form
    #[error("Record JSON error: {0}")]
    Json(String),
}

/// Encryption-specific errors
#[derive(Debug, Clone, Error)]
pub enum EncryptionError {
    /// The configured public key could not be decoded
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The private key could not be decoded
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Wrapping or unwrapping the symmetric key material failed
    #[error("Key wrap failed: {0}")]
    KeyWrap(String),

    /// The symmetric cipher rejected its input
    #[error("Cipher failure: {0}")]
    Cipher(String),

    /// An encrypted artifact does not follow the documented layout
    #[error("Malformed encrypted artifact: {0}")]
    MalformedArtifact(String),

    /// Reading or writing artifact bytes failed
    #[error("Artifact I/O failed: {0}")]
    Io(String),
}

/// Local store errors
///
/// `Clone` so the outcome of one in-flight hand-off can be handed to every
/// caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store was started with an unusable configuration
    #[error("Store configuration error: {0}")]
    Configuration(String),

    /// No writable file could be created after repeated attempts
    #[error("Could not create a writable file after {attempts} attempts: {message}")]
    ResourceExhausted { attempts: usize, message: String },

    /// Local filesystem failure
    #[error("Store I/O failed: {0}")]
    Io(String),

    /// The hand-off task itself failed (not a single artifact)
    #[error("Hand-off failed: {0}")]
    HandOff(String),

    /// The remote store rejected a unit of data
    #[error("Remote store rejected data: {0}")]
    Remote(String),

    /// A cancellation request stopped the operation
    #[error("Operation cancelled")]
    Cancelled,
}

// Conversion from std::io::Error
impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for VaultError {
    fn from(err: toml::de::Error) -> Self {
        VaultError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<std::io::Error> for EncryptionError {
    fn from(err: std::io::Error) -> Self {
        EncryptionError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AnonymizationError {
    fn from(err: serde_json::Error) -> Self {
        AnonymizationError::Json(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_error_display() {
        let err = VaultError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_anonymization_error_conversion() {
        let err = AnonymizationError::InvalidPattern("empty".to_string());
        let vault_err: VaultError = err.into();
        assert!(matches!(vault_err, VaultError::Anonymization(_)));
    }

    #[test]
    fn test_store_error_conversion() {
        let err = StoreError::ResourceExhausted {
            attempts: 5,
            message: "disk full".to_string(),
        };
        let vault_err: VaultError = err.into();
        assert!(matches!(vault_err, VaultError::Store(_)));
        assert!(vault_err.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_unsupported_value_kind_display() {
        let err = AnonymizationError::UnsupportedValueKind {
            anonymizer: "string_hash",
            kind: "number",
        };
        assert_eq!(
            err.to_string(),
            "Anonymizer 'string_hash' cannot handle a number value"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vault_err: VaultError = io_err.into();
        assert!(matches!(vault_err, VaultError::Io(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let vault_err: VaultError = toml_err.into();
        assert!(matches!(vault_err, VaultError::Configuration(_)));
        assert!(vault_err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_store_error_is_clone() {
        let err = StoreError::HandOff("task panicked".to_string());
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
