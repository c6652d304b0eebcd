//! Field anonymizers
//!
//! Every anonymizer is a stateless transform from one [`FieldValue`] to
//! another, parameterized only by the run's [`AnonymizationContext`].
//! [`AnonymizerKind`] is the serializable description used by the field
//! registry and by configuration overrides; [`AnonymizerKind::instantiate`]
//! turns it into a shareable [`Anonymizer`].

pub mod gps;
pub mod hash;
pub mod omission;
pub mod redaction;
pub mod rounding;
pub mod timeline;

use crate::anonymization::context::AnonymizationContext;
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use gps::{wrap_latitude, wrap_longitude, LongitudeOffsetAnonymizer, RebasingAnonymizer};
pub use hash::StringHashAnonymizer;
pub use omission::ValueOmittingAnonymizer;
pub use redaction::PatternRedactionAnonymizer;
pub use rounding::RoundingAnonymizer;
pub use timeline::TimelineAnonymizer;

/// A pure transform over one field value
pub trait Anonymizer: Send + Sync + fmt::Debug {
    /// Which concrete anonymizer this is
    fn kind(&self) -> AnonymizerKind;

    /// Anonymizes a single value
    fn apply(
        &self,
        value: FieldValue,
        context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError>;
}

impl PartialEq for dyn Anonymizer {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

/// Whose parameters an origin- or offset-based anonymizer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Participant,
    Study,
}

/// Serializable description of an anonymizer
///
/// In TOML overrides it reads as an inline table, e.g.
/// `anonymizer = { kind = "rounding", places = -1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnonymizerKind {
    OmitValue,
    Timeline,
    Rounding { places: i32 },
    RebaseLatitude { origin: Scope },
    RebaseLongitude { origin: Scope },
    LongitudeOffset { scope: Scope },
    StringHash,
    PatternRedaction,
}

impl AnonymizerKind {
    /// Builds the anonymizer
    ///
    /// Pattern redaction needs a user-supplied pattern and cannot be built
    /// from its kind alone; use [`PatternRedactionAnonymizer::new`].
    pub fn instantiate(&self) -> Result<Arc<dyn Anonymizer>, AnonymizationError> {
        let anonymizer: Arc<dyn Anonymizer> = match *self {
            Self::OmitValue => Arc::new(ValueOmittingAnonymizer),
            Self::Timeline => Arc::new(TimelineAnonymizer),
            Self::Rounding { places } => Arc::new(RoundingAnonymizer::new(places)),
            Self::RebaseLatitude { origin } => Arc::new(RebasingAnonymizer::latitude(origin)),
            Self::RebaseLongitude { origin } => Arc::new(RebasingAnonymizer::longitude(origin)),
            Self::LongitudeOffset { scope } => Arc::new(LongitudeOffsetAnonymizer::new(scope)),
            Self::StringHash => Arc::new(StringHashAnonymizer),
            Self::PatternRedaction => {
                return Err(AnonymizationError::MissingParameter(self.to_string()))
            }
        };
        Ok(anonymizer)
    }

    /// Kind name without parameters, as used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::OmitValue => "omit_value",
            Self::Timeline => "timeline",
            Self::Rounding { .. } => "rounding",
            Self::RebaseLatitude { .. } => "rebase_latitude",
            Self::RebaseLongitude { .. } => "rebase_longitude",
            Self::LongitudeOffset { .. } => "longitude_offset",
            Self::StringHash => "string_hash",
            Self::PatternRedaction => "pattern_redaction",
        }
    }
}

impl fmt::Display for AnonymizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rounding { places } => write!(f, "rounding({places})"),
            Self::RebaseLatitude { origin } | Self::RebaseLongitude { origin } => {
                write!(f, "{}({origin:?})", self.name())
            }
            Self::LongitudeOffset { scope } => write!(f, "longitude_offset({scope:?})"),
            _ => f.write_str(self.name()),
        }
    }
}

/// Error for a value the anonymizer has no rule for
pub(crate) fn unsupported(anonymizer: &'static str, value: &FieldValue) -> AnonymizationError {
    AnonymizationError::UnsupportedValueKind {
        anonymizer,
        kind: value.kind_name(),
    }
}
