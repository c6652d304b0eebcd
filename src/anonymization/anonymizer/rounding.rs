//! Numeric rounding

use super::{unsupported, Anonymizer, AnonymizerKind};
use crate::anonymization::context::AnonymizationContext;
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;

/// Rounds numbers to a fixed number of decimal places
///
/// Negative place counts round to tens, hundreds and so on.
#[derive(Debug, Clone, Copy)]
pub struct RoundingAnonymizer {
    places: i32,
}

impl RoundingAnonymizer {
    pub fn new(places: i32) -> Self {
        Self { places }
    }

    pub fn places(&self) -> i32 {
        self.places
    }
}

/// Rounds `value` to `places` decimal places
///
/// ```
/// use sensorvault::anonymization::anonymizer::rounding::round_to;
///
/// assert_eq!(round_to(1.2345, 2), 1.23);
/// assert_eq!(round_to(1234.0, -2), 1200.0);
/// ```
pub fn round_to(value: f64, places: i32) -> f64 {
    if places >= 0 {
        let scale = 10f64.powi(places);
        (value * scale).round() / scale
    } else {
        let scale = 10f64.powi(-places);
        (value / scale).round() * scale
    }
}

impl Anonymizer for RoundingAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        AnonymizerKind::Rounding {
            places: self.places,
        }
    }

    fn apply(
        &self,
        value: FieldValue,
        _context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        match value {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Number(n) => Ok(FieldValue::Number(round_to(n, self.places))),
            other => Err(unsupported("rounding", &other)),
        }
    }
}
