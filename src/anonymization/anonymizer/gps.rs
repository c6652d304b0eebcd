//! Geographic anonymizers
//!
//! Results that leave the legal coordinate domain are wrapped back into it,
//! never clamped. Latitude reflects over the pole; longitude wraps around the
//! antimeridian.

use super::{unsupported, Anonymizer, AnonymizerKind, Scope};
use crate::anonymization::context::AnonymizationContext;
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;

/// Wraps any latitude into `[-90, 90]` by reflecting over the poles
///
/// ```
/// use sensorvault::anonymization::anonymizer::wrap_latitude;
///
/// assert_eq!(wrap_latitude(109.0), 71.0);
/// assert_eq!(wrap_latitude(-96.0), -84.0);
/// ```
pub fn wrap_latitude(value: f64) -> f64 {
    let t = (value + 90.0).rem_euclid(360.0);
    if t <= 180.0 {
        t - 90.0
    } else {
        270.0 - t
    }
}

/// Wraps any longitude into `[-180, 180]` modulo 360
///
/// ```
/// use sensorvault::anonymization::anonymizer::wrap_longitude;
///
/// assert_eq!(wrap_longitude(190.0), -170.0);
/// assert_eq!(wrap_longitude(-195.0), 165.0);
/// ```
pub fn wrap_longitude(value: f64) -> f64 {
    (value + 180.0).rem_euclid(360.0) - 180.0
}

fn coordinate(anonymizer: &'static str, value: FieldValue) -> Result<Option<f64>, AnonymizationError> {
    match value {
        FieldValue::Null => Ok(None),
        FieldValue::Number(n) if n.is_finite() => Ok(Some(n)),
        FieldValue::Number(_) => Err(AnonymizationError::UnsupportedValueKind {
            anonymizer,
            kind: "non-finite number",
        }),
        other => Err(unsupported(anonymizer, &other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

/// Subtracts a participant or study origin from a coordinate
#[derive(Debug, Clone, Copy)]
pub struct RebasingAnonymizer {
    axis: Axis,
    origin: Scope,
}

impl RebasingAnonymizer {
    pub fn latitude(origin: Scope) -> Self {
        Self {
            axis: Axis::Latitude,
            origin,
        }
    }

    pub fn longitude(origin: Scope) -> Self {
        Self {
            axis: Axis::Longitude,
            origin,
        }
    }
}

impl Anonymizer for RebasingAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        match self.axis {
            Axis::Latitude => AnonymizerKind::RebaseLatitude {
                origin: self.origin,
            },
            Axis::Longitude => AnonymizerKind::RebaseLongitude {
                origin: self.origin,
            },
        }
    }

    fn apply(
        &self,
        value: FieldValue,
        context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        let name = self.kind().name();
        let Some(v) = coordinate(name, value)? else {
            return Ok(FieldValue::Null);
        };

        let origin = match self.origin {
            Scope::Participant => context.participant_origin(),
            Scope::Study => context.study_origin(),
        };

        let rebased = match self.axis {
            Axis::Latitude => wrap_latitude(v - origin.latitude),
            Axis::Longitude => wrap_longitude(v - origin.longitude),
        };
        Ok(FieldValue::Number(rebased))
    }
}

/// Adds a random participant or study offset to a longitude
///
/// Longitude only. Shifting latitude by a constant does not preserve distances.
#[derive(Debug, Clone, Copy)]
pub struct LongitudeOffsetAnonymizer {
    scope: Scope,
}

impl LongitudeOffsetAnonymizer {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

impl Anonymizer for LongitudeOffsetAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        AnonymizerKind::LongitudeOffset { scope: self.scope }
    }

    fn apply(
        &self,
        value: FieldValue,
        context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        let Some(v) = coordinate("longitude_offset", value)? else {
            return Ok(FieldValue::Null);
        };

        let offset = match self.scope {
            Scope::Participant => context.participant_longitude_offset(),
            Scope::Study => context.study_longitude_offset(),
        };
        Ok(FieldValue::Number(wrap_longitude(v + offset)))
    }
}
