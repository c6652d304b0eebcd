//! Domain models and types for Sensorvault.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Records** ([`Datum`], [`DatumPayload`], [`DatumType`])
//! - **Strongly-typed identifiers** ([`DatumId`], [`ProtocolId`])
//! - **Error types** ([`VaultError`], [`AnonymizationError`], [`EncryptionError`], [`StoreError`])
//! - **Result type alias** ([`Result`])
//!
//! # Example
//!
//! ```rust
//! use sensorvault::domain::{Datum, DatumPayload, ProtocolId};
//! use chrono::Utc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let datum = Datum::new(
//!     ProtocolId::new("study-1")?,
//!     Utc::now(),
//!     DatumPayload::location(38.03, -78.48, 12.0),
//! )
//! .with_device_id("device-a");
//! assert!(!datum.is_anonymized());
//! # Ok(())
//! # }
//! ```

pub mod datum;
pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use datum::{Datum, DatumPayload, DatumType};
pub use errors::{AnonymizationError, EncryptionError, StoreError, VaultError};
pub use ids::{DatumId, ProtocolId};
pub use result::Result;
