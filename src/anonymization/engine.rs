//! Record anonymization engine
//!
//! [`DatumAnonymizer`] applies the selected anonymizer of every bound field to
//! a record and produces a new JSON value (or a new record). The source record
//! is never modified.
//!
//! # Examples
//!
//! ```
//! use sensorvault::anonymization::{AnonymizationContext, AnonymizationRegistry, DatumAnonymizer};
//! use sensorvault::anonymization::anonymizer::AnonymizerKind;
//! use sensorvault::domain::{Datum, DatumPayload, DatumType, ProtocolId};
//! use chrono::Utc;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DatumAnonymizer::new(
//!     Arc::new(AnonymizationRegistry::standard()),
//!     AnonymizationContext::generate(Some("participant-1"), "device-a"),
//! );
//! engine.select(
//!     DatumType::Location,
//!     "latitude",
//!     Some(AnonymizerKind::Rounding { places: 2 }.instantiate()?),
//! )?;
//!
//! let datum = Datum::new(
//!     ProtocolId::new("study-1")?,
//!     Utc::now(),
//!     DatumPayload::location(38.0362, -78.48, 5.0),
//! );
//! let anonymized = engine.anonymize(&datum)?;
//! assert!(anonymized.is_anonymized());
//! # Ok(())
//! # }
//! ```

use super::anonymizer::Anonymizer;
use super::config::AnonymizationConfig;
use super::context::AnonymizationContext;
use super::registry::AnonymizationRegistry;
use super::value::FieldValue;
use crate::domain::{AnonymizationError, Datum, DatumType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

const ANONYMIZED_KEY: &str = "anonymized";

type Selections = HashMap<(DatumType, &'static str), Arc<dyn Anonymizer>>;

/// Applies per-field anonymizers to records
///
/// Thread-safe; share it behind an `Arc` between stores.
pub struct DatumAnonymizer {
    registry: Arc<AnonymizationRegistry>,
    context: AnonymizationContext,
    selections: RwLock<Selections>,
}

impl DatumAnonymizer {
    /// Creates an engine with every field's default anonymizer selected
    pub fn new(registry: Arc<AnonymizationRegistry>, context: AnonymizationContext) -> Self {
        let mut selections: Selections = HashMap::new();

        for datum_type in DatumType::ALL {
            for binding in registry.bindings(datum_type) {
                let Some(kind) = binding.default_anonymizer() else {
                    continue;
                };
                match kind.instantiate() {
                    Ok(anonymizer) => {
                        selections.insert((datum_type, binding.field), anonymizer);
                    }
                    Err(e) => tracing::warn!(
                        datum_type = %datum_type,
                        field = binding.field,
                        error = %e,
                        "Default anonymizer cannot be built; field left as is"
                    ),
                }
            }
        }

        Self {
            registry,
            context,
            selections: RwLock::new(selections),
        }
    }

    /// Creates an engine and applies the configured overrides
    pub fn from_config(
        config: &AnonymizationConfig,
        context: AnonymizationContext,
    ) -> Result<Self, AnonymizationError> {
        let engine = Self::new(Arc::new(AnonymizationRegistry::standard()), context);
        for o in &config.overrides {
            engine.select(o.datum_type()?, &o.field, o.build()?)?;
        }
        Ok(engine)
    }

    pub fn context(&self) -> &AnonymizationContext {
        &self.context
    }

    pub fn registry(&self) -> &AnonymizationRegistry {
        &self.registry
    }

    /// Selects the anonymizer for a field, or clears it with `None`
    ///
    /// # Errors
    ///
    /// Fails if the field is not bound for the record kind or if the
    /// anonymizer is not one of the field's candidates.
    pub fn select(
        &self,
        datum_type: DatumType,
        field: &str,
        anonymizer: Option<Arc<dyn Anonymizer>>,
    ) -> Result<(), AnonymizationError> {
        let binding = self.registry.binding(datum_type, field)?;
        let key = (datum_type, binding.field);

        let mut selections = self
            .selections
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match anonymizer {
            Some(anonymizer) => {
                let kind = anonymizer.kind();
                if !binding.is_candidate(&kind) {
                    return Err(AnonymizationError::NotACandidate {
                        anonymizer: kind.to_string(),
                        datum_type: datum_type.to_string(),
                        field: field.to_string(),
                    });
                }
                selections.insert(key, anonymizer);
            }
            None => {
                selections.remove(&key);
            }
        }
        Ok(())
    }

    /// The anonymizer currently selected for a field
    pub fn selected(&self, datum_type: DatumType, field: &str) -> Option<Arc<dyn Anonymizer>> {
        let binding = self.registry.binding(datum_type, field).ok()?;
        self.selections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(datum_type, binding.field))
            .cloned()
    }

    /// Produces the anonymized JSON object of a record
    ///
    /// Records that are already anonymized are returned as they are.
    pub fn anonymize_value(&self, datum: &Datum) -> Result<Value, AnonymizationError> {
        let mut json = serde_json::to_value(datum)?;
        if datum.is_anonymized() {
            return Ok(json);
        }

        let datum_type = datum.datum_type();
        let object = json
            .as_object_mut()
            .ok_or_else(|| AnonymizationError::Json("record is not a JSON object".to_string()))?;

        let selections = self
            .selections
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        for binding in self.registry.bindings(datum_type) {
            let Some(anonymizer) = selections.get(&(datum_type, binding.field)) else {
                continue;
            };
            let value = FieldValue::from_json(object.get(binding.field), binding.kind)?;
            let anonymized = anonymizer.apply(value, &self.context)?;
            object.insert(binding.field.to_string(), anonymized.into_json());
        }

        object.insert(ANONYMIZED_KEY.to_string(), Value::Bool(true));
        Ok(json)
    }

    /// Compact JSON text of the anonymized record
    pub fn anonymized_json(&self, datum: &Datum) -> Result<String, AnonymizationError> {
        let value = self.anonymize_value(datum)?;
        Ok(serde_json::to_string(&value)?)
    }

    /// Anonymized copy of a record
    pub fn anonymize(&self, datum: &Datum) -> Result<Datum, AnonymizationError> {
        let value = self.anonymize_value(datum)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl std::fmt::Debug for DatumAnonymizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatumAnonymizer")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::anonymizer::hash::hash_string;
    use crate::anonymization::anonymizer::{AnonymizerKind, PatternRedactionAnonymizer};
    use crate::anonymization::context::timeline_epoch;
    use crate::domain::{DatumPayload, ProtocolId};
    use chrono::{Duration, TimeZone, Utc};

    fn engine() -> DatumAnonymizer {
        DatumAnonymizer::new(
            Arc::new(AnonymizationRegistry::standard()),
            AnonymizationContext::generate(Some("participant"), "device")
                .with_random_time_anchor(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()),
        )
    }

    fn sms() -> Datum {
        Datum::new(
            ProtocolId::new("study-1").unwrap(),
            Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap(),
            DatumPayload::Sms {
                from_number: Some("555-0100".to_string()),
                to_number: Some("555-0199".to_string()),
                message: Some("call me at 555-0123".to_string()),
                participant_is_sender: Some(true),
            },
        )
        .with_device_id("device-a")
    }

    #[test]
    fn test_no_selection_only_sets_flag() {
        let datum = sms();
        let anonymized = engine().anonymize(&datum).unwrap();

        assert!(anonymized.is_anonymized());
        assert_eq!(anonymized.payload(), datum.payload());
        assert_eq!(anonymized.timestamp(), datum.timestamp());
        assert_eq!(anonymized.id(), datum.id());
    }

    #[test]
    fn test_selected_fields_change() {
        let engine = engine();
        engine
            .select(
                DatumType::Sms,
                "from_number",
                Some(AnonymizerKind::StringHash.instantiate().unwrap()),
            )
            .unwrap();
        engine
            .select(
                DatumType::Sms,
                "message",
                Some(Arc::new(
                    PatternRedactionAnonymizer::new(r"\d{3}-\d{4}", '*').unwrap(),
                )),
            )
            .unwrap();
        engine
            .select(
                DatumType::Sms,
                "timestamp",
                Some(AnonymizerKind::Timeline.instantiate().unwrap()),
            )
            .unwrap();

        let anonymized = engine.anonymize(&sms()).unwrap();
        let DatumPayload::Sms {
            from_number,
            to_number,
            message,
            participant_is_sender,
        } = anonymized.payload()
        else {
            panic!("expected sms");
        };

        assert_eq!(from_number.as_deref(), Some(hash_string("555-0100").as_str()));
        assert_eq!(to_number.as_deref(), Some("555-0199"));
        assert_eq!(message.as_deref(), Some("call me at ********"));
        assert_eq!(*participant_is_sender, Some(true));
        assert_eq!(anonymized.timestamp(), timeline_epoch() + Duration::days(1));
    }

    #[test]
    fn test_source_record_untouched() {
        let engine = engine();
        engine
            .select(
                DatumType::Sms,
                "to_number",
                Some(AnonymizerKind::OmitValue.instantiate().unwrap()),
            )
            .unwrap();

        let datum = sms();
        let before = serde_json::to_string(&datum).unwrap();
        let value = engine.anonymize_value(&datum).unwrap();

        assert_eq!(value["to_number"], Value::Null);
        assert_eq!(serde_json::to_string(&datum).unwrap(), before);
    }

    #[test]
    fn test_already_anonymized_passes_through() {
        let engine = engine();
        engine
            .select(
                DatumType::Sms,
                "from_number",
                Some(AnonymizerKind::StringHash.instantiate().unwrap()),
            )
            .unwrap();

        let once = engine.anonymize(&sms()).unwrap();
        let twice = engine.anonymize(&once).unwrap();
        assert_eq!(once.payload(), twice.payload());
    }

    #[test]
    fn test_select_rejects_non_candidate() {
        let err = engine()
            .select(
                DatumType::Location,
                "latitude",
                Some(AnonymizerKind::StringHash.instantiate().unwrap()),
            )
            .unwrap_err();
        assert!(matches!(err, AnonymizationError::NotACandidate { .. }));
    }

    #[test]
    fn test_unsupported_kind_fails_record() {
        let mut registry = AnonymizationRegistry::standard();
        registry.register(
            DatumType::Speed,
            crate::anonymization::registry::FieldBinding::optional(
                "kph",
                crate::anonymization::value::FieldKind::Number,
                &[AnonymizerKind::StringHash],
                Some(0),
            ),
        );
        let engine = DatumAnonymizer::new(
            Arc::new(registry),
            AnonymizationContext::generate(None, "device"),
        );
        let datum = Datum::new(
            ProtocolId::new("study-1").unwrap(),
            Utc::now(),
            DatumPayload::Speed { kph: Some(12.0) },
        );

        let err = engine.anonymize(&datum).unwrap_err();
        assert!(matches!(err, AnonymizationError::UnsupportedValueKind { .. }));
    }

    #[test]
    fn test_clearing_selection() {
        let engine = engine();
        engine
            .select(
                DatumType::Speed,
                "kph",
                Some(AnonymizerKind::Rounding { places: -1 }.instantiate().unwrap()),
            )
            .unwrap();
        assert!(engine.selected(DatumType::Speed, "kph").is_some());

        engine.select(DatumType::Speed, "kph", None).unwrap();
        assert!(engine.selected(DatumType::Speed, "kph").is_none());
    }
}
