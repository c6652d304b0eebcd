//! Typed field values handed to anonymizers
//!
//! Anonymizers work on [`FieldValue`]s, not on raw JSON. The registry declares
//! each field's [`FieldKind`] so the engine can convert in both directions
//! without guessing (a timestamp and a free-text field are both JSON strings).

use crate::domain::AnonymizationError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Declared semantic type of an anonymizable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Number,
    Text,
    TextList,
    Timestamp,
}

/// The value of one record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    TextList(Vec<String>),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Short name of the value kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::TextList(_) => "text list",
            Self::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reads a JSON value as a field of the declared kind
    ///
    /// A missing or `null` JSON value is always [`FieldValue::Null`].
    pub fn from_json(value: Option<&Value>, kind: FieldKind) -> Result<Self, AnonymizationError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Self::Null),
            Some(v) => v,
        };

        let mismatch = || {
            AnonymizationError::Json(format!("expected {kind:?} field, found {value}"))
        };

        match kind {
            FieldKind::Bool => value.as_bool().map(Self::Bool).ok_or_else(mismatch),
            FieldKind::Number => value.as_f64().map(Self::Number).ok_or_else(mismatch),
            FieldKind::Text => value
                .as_str()
                .map(|s| Self::Text(s.to_string()))
                .ok_or_else(mismatch),
            FieldKind::TextList => {
                let items = value.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::TextList)
            }
            FieldKind::Timestamp => serde_json::from_value::<DateTime<Utc>>(value.clone())
                .map(Self::Timestamp)
                .map_err(AnonymizationError::from),
        }
    }

    /// Converts the value back to JSON
    ///
    /// Non-finite numbers have no JSON representation and become `null`.
    pub fn into_json(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s),
            Self::TextList(items) => Value::Array(items.into_iter().map(Value::String).collect()),
            Self::Timestamp(ts) => serde_json::to_value(ts).unwrap_or(Value::Null),
        }
    }
}
