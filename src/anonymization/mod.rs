//! Anonymization module for Sensorvault
//!
//! Records are anonymized field by field before they reach any local buffer.
//!
//! # Architecture
//!
//! - **Anonymizers** ([`anonymizer`]): stateless transforms over one field value
//! - **Registry** ([`registry`]): per record kind, which fields are anonymizable,
//!   their candidate anonymizers and the default choice
//! - **Context** ([`context`]): run-specific time anchor, origins and offsets
//! - **Engine** ([`engine`]): applies the selected anonymizers to a record's
//!   JSON form and returns a new value
//!
//! # Usage
//!
//! ```rust,ignore
//! use sensorvault::anonymization::{AnonymizationConfig, AnonymizationContext, DatumAnonymizer};
//!
//! let config = AnonymizationConfig::default();
//! let context = AnonymizationContext::from_config(&config, Some("participant-1"), "device-a");
//! let engine = DatumAnonymizer::from_config(&config, context)?;
//! let json = engine.anonymized_json(&datum)?;
//! ```

pub mod anonymizer;
pub mod config;
pub mod context;
pub mod engine;
pub mod registry;
pub mod value;

// Re-export main types
pub use anonymizer::{Anonymizer, AnonymizerKind, Scope};
pub use config::{AnonymizationConfig, FieldOverride};
pub use context::{AnonymizationContext, GeoPoint};
pub use engine::DatumAnonymizer;
pub use registry::{AnonymizationRegistry, FieldBinding};
pub use value::{FieldKind, FieldValue};
