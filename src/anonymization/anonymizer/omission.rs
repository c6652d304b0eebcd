//! Value omission

use super::{Anonymizer, AnonymizerKind};
use crate::anonymization::context::AnonymizationContext;
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;

/// Drops the value entirely
///
/// Offered first on every optional field. Never offered on required fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueOmittingAnonymizer;

impl Anonymizer for ValueOmittingAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        AnonymizerKind::OmitValue
    }

    fn apply(
        &self,
        _value: FieldValue,
        _context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        Ok(FieldValue::Null)
    }
}
