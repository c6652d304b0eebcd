//! Record model
//!
//! A [`Datum`] is one immutable, time-stamped unit of collected data. Records
//! are produced upstream by sensors and are read-only to this crate: the
//! anonymization layer never mutates a record, it produces a new JSON value
//! (and, when needed, a new record deserialized from it).
//!
//! Every record carries the shared envelope (`id`, `device_id`,
//! `protocol_id`, `timestamp`, `anonymized`) plus a kind-specific payload,
//! flattened into the same JSON object and tagged by `"type"`:
//!
//! ```json
//! {"id":"…","device_id":"…","protocol_id":"study-1",
//!  "timestamp":"2024-05-01T12:00:00Z","anonymized":true,
//!  "type":"Location","latitude":38.03,"longitude":-78.48,"accuracy":12.0}
//! ```

use super::ids::{DatumId, ProtocolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Closed set of record kinds understood by the anonymization registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatumType {
    Location,
    Accelerometer,
    Speed,
    Sms,
    Telephony,
    ApplicationUsage,
    Calendar,
}

impl DatumType {
    /// All record kinds, in registration order
    pub const ALL: [DatumType; 7] = [
        DatumType::Location,
        DatumType::Accelerometer,
        DatumType::Speed,
        DatumType::Sms,
        DatumType::Telephony,
        DatumType::ApplicationUsage,
        DatumType::Calendar,
    ];

    /// Type name as it appears in serialized records
    pub fn name(&self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::Accelerometer => "Accelerometer",
            Self::Speed => "Speed",
            Self::Sms => "Sms",
            Self::Telephony => "Telephony",
            Self::ApplicationUsage => "ApplicationUsage",
            Self::Calendar => "Calendar",
        }
    }

    /// Looks a record kind up by its serialized name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for DatumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind-specific fields of a record
///
/// Optional fields are `None` when the sensor could not obtain a value or when
/// the value was omitted by anonymization; they always serialize (as `null`)
/// so every record of a kind has the same columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DatumPayload {
    Location {
        latitude: Option<f64>,
        longitude: Option<f64>,
        accuracy: Option<f64>,
    },
    Accelerometer {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    },
    Speed {
        kph: Option<f64>,
    },
    Sms {
        from_number: Option<String>,
        to_number: Option<String>,
        message: Option<String>,
        participant_is_sender: Option<bool>,
    },
    Telephony {
        phone_number: Option<String>,
        contact_name: Option<String>,
        contact_email: Option<String>,
        is_contact: Option<bool>,
        call_duration_seconds: Option<f64>,
    },
    ApplicationUsage {
        package_name: Option<String>,
        application_name: Option<String>,
        foreground_seconds: Option<f64>,
    },
    Calendar {
        title: Option<String>,
        location: Option<String>,
        attendees: Option<Vec<String>>,
        duration_minutes: Option<f64>,
    },
}

impl DatumPayload {
    /// Record kind of this payload
    pub fn datum_type(&self) -> DatumType {
        match self {
            Self::Location { .. } => DatumType::Location,
            Self::Accelerometer { .. } => DatumType::Accelerometer,
            Self::Speed { .. } => DatumType::Speed,
            Self::Sms { .. } => DatumType::Sms,
            Self::Telephony { .. } => DatumType::Telephony,
            Self::ApplicationUsage { .. } => DatumType::ApplicationUsage,
            Self::Calendar { .. } => DatumType::Calendar,
        }
    }

    /// Convenience constructor for a location fix
    pub fn location(latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self::Location {
            latitude: Some(latitude),
            longitude: Some(longitude),
            accuracy: Some(accuracy),
        }
    }

    /// Convenience constructor for an accelerometer reading
    pub fn accelerometer(x: f64, y: f64, z: f64) -> Self {
        Self::Accelerometer {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

/// One immutable, uniquely identified, time-stamped record
///
/// Equality and hashing are by [`DatumId`] only, so a set of records
/// deduplicates repeated submissions of the same record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datum {
    id: DatumId,
    device_id: Option<String>,
    protocol_id: ProtocolId,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    anonymized: bool,
    #[serde(flatten)]
    payload: DatumPayload,
}

impl Datum {
    /// Creates a new, not-yet-anonymized record with a fresh identifier
    pub fn new(protocol_id: ProtocolId, timestamp: DateTime<Utc>, payload: DatumPayload) -> Self {
        Self {
            id: DatumId::generate(),
            device_id: None,
            protocol_id,
            timestamp,
            anonymized: false,
            payload,
        }
    }

    /// Sets the originating device identifier
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Overrides the generated identifier
    pub fn with_id(mut self, id: DatumId) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> DatumId {
        self.id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn protocol_id(&self) -> &ProtocolId {
        &self.protocol_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this record already went through anonymization
    pub fn is_anonymized(&self) -> bool {
        self.anonymized
    }

    pub fn payload(&self) -> &DatumPayload {
        &self.payload
    }

    pub fn datum_type(&self) -> DatumType {
        self.payload.datum_type()
    }

    /// Parses a record from its JSON form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
