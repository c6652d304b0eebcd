//! Time-anchor anonymization

use super::{unsupported, Anonymizer, AnonymizerKind};
use crate::anonymization::context::{timeline_epoch, AnonymizationContext};
use crate::anonymization::value::FieldValue;
use crate::domain::AnonymizationError;
use tracing::warn;

/// Re-expresses timestamps relative to the run's random anchor
///
/// The result is `epoch + (timestamp - anchor)` where the epoch is
/// 0001-01-01T00:00:00Z. Intervals between records are preserved while the
/// absolute dates are not. A timestamp earlier than the anchor maps to the
/// epoch itself, with a warning, so the real date never reaches the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineAnonymizer;

impl Anonymizer for TimelineAnonymizer {
    fn kind(&self) -> AnonymizerKind {
        AnonymizerKind::Timeline
    }

    fn apply(
        &self,
        value: FieldValue,
        context: &AnonymizationContext,
    ) -> Result<FieldValue, AnonymizationError> {
        let timestamp = match value {
            FieldValue::Null => return Ok(FieldValue::Null),
            FieldValue::Timestamp(ts) => ts,
            other => return Err(unsupported("timeline", &other)),
        };

        let anchor = context.random_time_anchor();
        let epoch = timeline_epoch();

        if timestamp < anchor {
            warn!("Timestamp precedes the random time anchor; emitting the timeline epoch");
            return Ok(FieldValue::Timestamp(epoch));
        }

        match epoch.checked_add_signed(timestamp - anchor) {
            Some(shifted) => Ok(FieldValue::Timestamp(shifted)),
            None => {
                warn!("Anonymized timestamp is out of range; emitting the timeline epoch");
                Ok(FieldValue::Timestamp(epoch))
            }
        }
    }
}
