//! Anonymization configuration

use super::anonymizer::redaction::{PatternRedactionAnonymizer, DEFAULT_GLYPH};
use super::anonymizer::{Anonymizer, AnonymizerKind};
use super::context::GeoPoint;
use super::registry::AnonymizationRegistry;
use crate::domain::{AnonymizationError, DatumType};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Run-level anonymization settings
///
/// Values left unset are generated per run. Overrides replace the registry's
/// default selection for individual fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnonymizationConfig {
    /// Fixed time anchor (normally drawn at random)
    #[serde(default)]
    pub random_time_anchor: Option<DateTime<Utc>>,

    /// Fixed study origin (normally drawn at random)
    #[serde(default)]
    pub study_origin: Option<GeoPoint>,

    /// Fixed study longitude offset (normally drawn at random)
    #[serde(default)]
    pub study_longitude_offset: Option<f64>,

    /// Per-field anonymizer selections
    #[serde(default)]
    pub overrides: Vec<FieldOverride>,
}

/// Selects the anonymizer for one `(datum_type, field)` pair
///
/// ```toml
/// [[anonymization.overrides]]
/// datum_type = "Sms"
/// field = "message"
/// anonymizer = { kind = "pattern_redaction" }
/// pattern = "\\d{3}-\\d{4}"
/// ```
///
/// Leaving `anonymizer` out clears the default selection for the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOverride {
    pub datum_type: String,
    pub field: String,
    #[serde(default)]
    pub anonymizer: Option<AnonymizerKind>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub glyph: Option<char>,
}

impl FieldOverride {
    pub fn datum_type(&self) -> Result<DatumType, AnonymizationError> {
        DatumType::from_name(&self.datum_type).ok_or_else(|| AnonymizationError::UnknownField {
            datum_type: self.datum_type.clone(),
            field: self.field.clone(),
        })
    }

    /// Builds the selected anonymizer; `None` means no anonymization
    pub fn build(&self) -> Result<Option<Arc<dyn Anonymizer>>, AnonymizationError> {
        let Some(kind) = self.anonymizer else {
            return Ok(None);
        };

        if kind == AnonymizerKind::PatternRedaction {
            let pattern = self
                .pattern
                .as_deref()
                .ok_or_else(|| AnonymizationError::MissingParameter(kind.to_string()))?;
            let anonymizer =
                PatternRedactionAnonymizer::new(pattern, self.glyph.unwrap_or(DEFAULT_GLYPH))?;
            return Ok(Some(Arc::new(anonymizer)));
        }

        kind.instantiate().map(Some)
    }
}

impl AnonymizationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(offset) = self.study_longitude_offset {
            if !(-180.0..=180.0).contains(&offset) {
                anyhow::bail!("study_longitude_offset must be within [-180, 180], got {offset}");
            }
        }

        if let Some(origin) = self.study_origin {
            if !(-90.0..=90.0).contains(&origin.latitude)
                || !(-180.0..=180.0).contains(&origin.longitude)
            {
                anyhow::bail!(
                    "study_origin ({}, {}) is not a valid coordinate",
                    origin.latitude,
                    origin.longitude
                );
            }
        }

        let registry = AnonymizationRegistry::standard();
        for o in &self.overrides {
            let datum_type = o.datum_type()?;
            let binding = registry.binding(datum_type, &o.field)?;
            if let Some(kind) = &o.anonymizer {
                if !binding.is_candidate(kind) {
                    return Err(AnonymizationError::NotACandidate {
                        anonymizer: kind.to_string(),
                        datum_type: o.datum_type.clone(),
                        field: o.field.clone(),
                    })
                    .context("Invalid anonymization override");
                }
            }
            o.build()
                .with_context(|| format!("Invalid override for {}.{}", o.datum_type, o.field))?;
        }

        Ok(())
    }
}
