//! Pattern redaction

use super::{unsupported, Anonymizer, AnonymizerKind};
use crate::anonymization::context::AnonymizationContext;
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;
use regex::Regex;

/// Default replacement glyph
pub const DEFAULT_GLYPH: char = '*';

/// Masks every match of a user-supplied pattern
///
/// Each match is replaced by the glyph repeated once per character of the
/// match, so the text keeps its shape.
#[derive(Debug, Clone)]
pub struct PatternRedactionAnonymizer {
    pattern: Regex,
    glyph: char,
}

impl PatternRedactionAnonymizer {
    /// Compiles the pattern
    ///
    /// # Errors
    ///
    /// Returns [`AnonymizationError::InvalidPattern`] if the pattern is empty
    /// or does not compile.
    pub fn new(pattern: &str, glyph: char) -> Result<Self, AnonymizationError> {
        if pattern.is_empty() {
            return Err(AnonymizationError::InvalidPattern(
                "pattern is empty".to_string(),
            ));
        }

        let pattern = Regex::new(pattern)
            .map_err(|e| AnonymizationError::InvalidPattern(format!("{pattern}: {e}")))?;

        Ok(Self { pattern, glyph })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Redacts all matches in one string
    pub fn redact(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let width = caps[0].chars().count();
                std::iter::repeat(self.glyph).take(width).collect::<String>()
            })
            .into_owned()
    }
}

impl Anonymizer for PatternRedactionAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        AnonymizerKind::PatternRedaction
    }

    fn apply(
        &self,
        value: FieldValue,
        _context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        match value {
            FieldValue::Null => Ok(FieldValue::Null),
            FieldValue::Text(s) => Ok(FieldValue::Text(self.redact(&s))),
            FieldValue::TextList(items) => Ok(FieldValue::TextList(
                items.iter().map(|s| self.redact(s)).collect(),
            )),
            other => Err(unsupported("pattern_redaction", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_to_match_length() {
        let anonymizer = PatternRedactionAnonymizer::new(r"\d{3}-\d{4}", '#').unwrap();
        assert_eq!(
            anonymizer.redact("call 555-0100 or 555-0199"),
            "call ######## or ########"
        );
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let anonymizer = PatternRedactionAnonymizer::new("café", DEFAULT_GLYPH).unwrap();
        assert_eq!(anonymizer.redact("le café"), "le ****");
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = PatternRedactionAnonymizer::new("", DEFAULT_GLYPH).unwrap_err();
        assert!(matches!(err, AnonymizationError::InvalidPattern(_)));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = PatternRedactionAnonymizer::new("(unclosed", DEFAULT_GLYPH).unwrap_err();
        assert!(matches!(err, AnonymizationError::InvalidPattern(_)));
    }

    #[test]
    fn test_rejects_bool() {
        let context = AnonymizationContext::generate(None, "device");
        let anonymizer = PatternRedactionAnonymizer::new("x", DEFAULT_GLYPH).unwrap();
        assert!(anonymizer.apply(FieldValue::Bool(true), &context).is_err());
    }
}
