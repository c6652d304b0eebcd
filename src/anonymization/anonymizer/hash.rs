//! One-way string hashing

use super::{unsupported, Anonymizer, AnonymizerKind};
use crate::anonymization::context::AnonymizationContext;
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;
use sha2::{Digest, Sha256};

/// Replaces strings with their lowercase hex SHA-256 digest
///
/// Applies to single strings and to each element of a string list.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringHashAnonymizer;

/// Lowercase hex SHA-256 of the UTF-8 bytes of `value`
pub fn hash_string(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl Anonymizer for StringHashAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        AnonymizerKind::StringHash
    }

    fn apply(
        &self,
        value: FieldValue,
        _context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        match value {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Text(s) => Ok(FieldValue::Text(hash_string(&s))),
            FieldValue::TextList(items) => Ok(FieldValue::TextList(
                items.iter().map(|s| hash_string(s)).collect(),
            )),
            other => Err(unsupported("string_hash", &other)),
        }
    }
}
