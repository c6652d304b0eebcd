//! Field to anonymizer registration table
//!
//! For every record kind the registry lists the anonymizable fields (by JSON
//! key), the semantic kind of each field, the candidate anonymizers a study
//! may choose from, and the default choice. The table is built once at
//! startup and is read-only afterwards.

use super::anonymizer::{AnonymizerKind, Scope};
use super::value::FieldKind;
use crate::domain::{AnonymizationError, DatumType};
use std::collections::HashMap;

/// Anonymization options for one record field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBinding {
    /// JSON key of the field in the serialized record
    pub field: &'static str,

    /// Human-readable label, when the field has one
    pub display_name: Option<&'static str>,

    /// Semantic type of the value
    pub kind: FieldKind,

    /// Anonymizers that may be selected for the field
    pub candidates: Vec<AnonymizerKind>,

    /// Index into `candidates` of the default selection
    pub default_index: Option<usize>,
}

impl FieldBinding {
    /// Binding for a field that may be null
    ///
    /// Value omission is always offered as the first candidate. The default
    /// index refers to `candidates` as passed in.
    pub fn optional(
        field: &'static str,
        kind: FieldKind,
        candidates: &[AnonymizerKind],
        default_index: Option<usize>,
    ) -> Self {
        let mut all = Vec::with_capacity(candidates.len() + 1);
        all.push(AnonymizerKind::OmitValue);
        all.extend_from_slice(candidates);

        Self {
            field,
            display_name: None,
            kind,
            candidates: all,
            default_index: default_index.map(|i| i + 1),
        }
    }

    /// Binding for a field every record must carry; omission is not offered
    pub fn required(
        field: &'static str,
        kind: FieldKind,
        candidates: &[AnonymizerKind],
        default_index: Option<usize>,
    ) -> Self {
        Self {
            field,
            display_name: None,
            kind,
            candidates: candidates.to_vec(),
            default_index,
        }
    }

    pub fn with_display_name(mut self, display_name: &'static str) -> Self {
        self.display_name = Some(display_name);
        self
    }

    /// Anonymizer applied when nothing else was selected
    pub fn default_anonymizer(&self) -> Option<AnonymizerKind> {
        self.default_index
            .and_then(|i| self.candidates.get(i))
            .copied()
    }

    pub fn is_candidate(&self, kind: &AnonymizerKind) -> bool {
        self.candidates.contains(kind)
    }
}

/// Per-record-kind field bindings
#[derive(Debug, Clone, Default)]
pub struct AnonymizationRegistry {
    bindings: HashMap<DatumType, Vec<FieldBinding>>,
}

const ROUND_TENTHS: AnonymizerKind = AnonymizerKind::Rounding { places: 1 };
const ROUND_HUNDREDTHS: AnonymizerKind = AnonymizerKind::Rounding { places: 2 };
const ROUND_THOUSANDTHS: AnonymizerKind = AnonymizerKind::Rounding { places: 3 };
const ROUND_ONES: AnonymizerKind = AnonymizerKind::Rounding { places: 0 };
const ROUND_TENS: AnonymizerKind = AnonymizerKind::Rounding { places: -1 };
const ROUND_HUNDREDS: AnonymizerKind = AnonymizerKind::Rounding { places: -2 };

impl AnonymizationRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry covering every built-in record kind
    ///
    /// No field is anonymized by default; studies opt in per field through
    /// configuration overrides.
    pub fn standard() -> Self {
        use AnonymizerKind::*;
        use FieldKind::*;

        let mut registry = Self::new();

        let coordinate_rounding = [ROUND_TENTHS, ROUND_HUNDREDTHS, ROUND_THOUSANDTHS];
        let free_text = [StringHash, PatternRedaction];

        for datum_type in DatumType::ALL {
            registry.register(
                datum_type,
                FieldBinding::optional("device_id", Text, &[StringHash], None)
                    .with_display_name("Device ID:"),
            );
            registry.register(
                datum_type,
                FieldBinding::required("timestamp", Timestamp, &[Timeline], None),
            );
        }

        registry.register(
            DatumType::Location,
            FieldBinding::optional(
                "latitude",
                Number,
                &[
                    ROUND_TENTHS,
                    ROUND_HUNDREDTHS,
                    ROUND_THOUSANDTHS,
                    RebaseLatitude {
                        origin: Scope::Participant,
                    },
                    RebaseLatitude {
                        origin: Scope::Study,
                    },
                ],
                None,
            ),
        );
        registry.register(
            DatumType::Location,
            FieldBinding::optional(
                "longitude",
                Number,
                &[
                    LongitudeOffset {
                        scope: Scope::Participant,
                    },
                    LongitudeOffset {
                        scope: Scope::Study,
                    },
                    RebaseLongitude {
                        origin: Scope::Participant,
                    },
                    RebaseLongitude {
                        origin: Scope::Study,
                    },
                    ROUND_TENTHS,
                    ROUND_HUNDREDTHS,
                    ROUND_THOUSANDTHS,
                ],
                None,
            ),
        );
        registry.register(
            DatumType::Location,
            FieldBinding::optional("accuracy", Number, &coordinate_rounding, None),
        );

        for axis in ["x", "y", "z"] {
            registry.register(
                DatumType::Accelerometer,
                FieldBinding::optional(axis, Number, &[ROUND_ONES, ROUND_TENS], None),
            );
        }

        registry.register(
            DatumType::Speed,
            FieldBinding::optional("kph", Number, &[ROUND_TENS, ROUND_HUNDREDS], None),
        );

        registry.register(
            DatumType::Sms,
            FieldBinding::optional("from_number", Text, &[StringHash], None)
                .with_display_name("From #:"),
        );
        registry.register(
            DatumType::Sms,
            FieldBinding::optional("to_number", Text, &[StringHash], None)
                .with_display_name("To #:"),
        );
        registry.register(
            DatumType::Sms,
            FieldBinding::optional("message", Text, &free_text, None),
        );
        registry.register(
            DatumType::Sms,
            FieldBinding::optional("participant_is_sender", Bool, &[], None)
                .with_display_name("Participant Is Sender:"),
        );

        registry.register(
            DatumType::Telephony,
            FieldBinding::optional("phone_number", Text, &[StringHash], None)
                .with_display_name("Phone #:"),
        );
        registry.register(
            DatumType::Telephony,
            FieldBinding::optional("contact_name", Text, &[StringHash], None)
                .with_display_name("Contact name:"),
        );
        registry.register(
            DatumType::Telephony,
            FieldBinding::optional("contact_email", Text, &[StringHash], None)
                .with_display_name("Contact email:"),
        );
        registry.register(
            DatumType::Telephony,
            FieldBinding::optional("is_contact", Bool, &[], None)
                .with_display_name("Is in contacts:"),
        );

        registry.register(
            DatumType::ApplicationUsage,
            FieldBinding::optional("package_name", Text, &[StringHash], None)
                .with_display_name("Package Name:"),
        );
        registry.register(
            DatumType::ApplicationUsage,
            FieldBinding::optional("application_name", Text, &[StringHash], None)
                .with_display_name("Application Name:"),
        );

        registry.register(
            DatumType::Calendar,
            FieldBinding::optional("title", Text, &free_text, None),
        );
        registry.register(
            DatumType::Calendar,
            FieldBinding::optional("location", Text, &free_text, None),
        );
        registry.register(
            DatumType::Calendar,
            FieldBinding::optional("attendees", TextList, &[StringHash], None),
        );

        registry
    }

    /// Adds a binding, replacing any existing binding for the same field
    pub fn register(&mut self, datum_type: DatumType, binding: FieldBinding) {
        let fields = self.bindings.entry(datum_type).or_default();
        match fields.iter_mut().find(|b| b.field == binding.field) {
            Some(existing) => *existing = binding,
            None => fields.push(binding),
        }
    }

    /// All bindings of a record kind, in registration order
    pub fn bindings(&self, datum_type: DatumType) -> &[FieldBinding] {
        self.bindings
            .get(&datum_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Binding of one field
    pub fn binding(
        &self,
        datum_type: DatumType,
        field: &str,
    ) -> Result<&FieldBinding, AnonymizationError> {
        self.bindings(datum_type)
            .iter()
            .find(|b| b.field == field)
            .ok_or_else(|| AnonymizationError::UnknownField {
                datum_type: datum_type.to_string(),
                field: field.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_field_offers_omission_first() {
        let binding = FieldBinding::optional(
            "kph",
            FieldKind::Number,
            &[ROUND_TENS, ROUND_HUNDREDS],
            Some(1),
        );
        assert_eq!(binding.candidates[0], AnonymizerKind::OmitValue);
        assert_eq!(binding.candidates.len(), 3);
        assert_eq!(binding.default_anonymizer(), Some(ROUND_HUNDREDS));
    }

    #[test]
    fn test_required_field_does_not_offer_omission() {
        let registry = AnonymizationRegistry::standard();
        let binding = registry.binding(DatumType::Speed, "timestamp").unwrap();
        assert!(!binding.is_candidate(&AnonymizerKind::OmitValue));
        assert!(binding.is_candidate(&AnonymizerKind::Timeline));
    }

    #[test]
    fn test_every_kind_binds_device_and_timestamp() {
        let registry = AnonymizationRegistry::standard();
        for datum_type in DatumType::ALL {
            assert!(registry.binding(datum_type, "device_id").is_ok());
            assert!(registry.binding(datum_type, "timestamp").is_ok());
        }
    }

    #[test]
    fn test_no_latitude_offset_candidate() {
        let registry = AnonymizationRegistry::standard();
        let latitude = registry.binding(DatumType::Location, "latitude").unwrap();
        assert!(!latitude
            .candidates
            .iter()
            .any(|k| matches!(k, AnonymizerKind::LongitudeOffset { .. })));
    }

    #[test]
    fn test_unknown_field() {
        let registry = AnonymizationRegistry::standard();
        let err = registry
            .binding(DatumType::Location, "altitude")
            .unwrap_err();
        assert!(matches!(err, AnonymizationError::UnknownField { .. }));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = AnonymizationRegistry::new();
        registry.register(
            DatumType::Speed,
            FieldBinding::optional("kph", FieldKind::Number, &[ROUND_TENS], None),
        );
        registry.register(
            DatumType::Speed,
            FieldBinding::optional("kph", FieldKind::Number, &[ROUND_TENS], Some(0)),
        );
        assert_eq!(registry.bindings(DatumType::Speed).len(), 1);
        assert_eq!(
            registry
                .binding(DatumType::Speed, "kph")
                .unwrap()
                .default_anonymizer(),
            Some(ROUND_TENS)
        );
    }
}
