//! Per-run anonymization parameters
//!
//! An [`AnonymizationContext`] holds the secrets and parameters chosen once
//! per data-collection run: the random time anchor, the study and
//! participant geographic origins, and the study and participant longitude
//! offsets. Study parameters are drawn from the thread RNG. Participant
//! parameters come from a generator seeded with the participant id (falling
//! back to the device id), so they stay the same for one participant across
//! runs.

use super::config::AnonymizationConfig;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Draws a uniformly random point
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            latitude: rng.gen_range(-90.0..=90.0),
            longitude: rng.gen_range(-180.0..=180.0),
        }
    }
}

/// Fixed epoch of the anonymized timeline (0001-01-01T00:00:00Z)
///
/// Anonymized timestamps are expressed as this epoch plus the distance from
/// the run's random time anchor. It is also the floor returned when a
/// timestamp falls before the anchor.
pub fn timeline_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Draws a longitude offset uniformly from `[-180, 180]`
pub fn random_longitude_offset<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(-180.0..=180.0)
}

/// Draws a time anchor uniformly from the first 1000 years AD
pub fn random_time_anchor<R: Rng + ?Sized>(rng: &mut R) -> DateTime<Utc> {
    let epoch = timeline_epoch();
    let end = Utc
        .with_ymd_and_hms(1000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(epoch);
    let span = (end - epoch).num_seconds().max(1);
    epoch + Duration::seconds(rng.gen_range(0..span))
}

/// Generator seeded from the participant id, or the device id when the
/// participant is unknown
///
/// The seed is the SHA-256 digest of the identifier, so it does not depend on
/// the process's hasher state.
pub fn participant_seeded_rng(participant_id: Option<&str>, device_id: &str) -> StdRng {
    let seed_source = participant_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(device_id);
    let digest: [u8; 32] = Sha256::digest(seed_source.as_bytes()).into();
    StdRng::from_seed(digest)
}

/// Run-specific anonymization parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnonymizationContext {
    random_time_anchor: DateTime<Utc>,
    study_origin: GeoPoint,
    participant_origin: GeoPoint,
    study_longitude_offset: f64,
    participant_longitude_offset: f64,
}

impl AnonymizationContext {
    /// Draws fresh study parameters and derives the participant parameters
    pub fn generate(participant_id: Option<&str>, device_id: &str) -> Self {
        let mut rng = rand::thread_rng();
        let mut participant_rng = participant_seeded_rng(participant_id, device_id);

        Self {
            random_time_anchor: random_time_anchor(&mut rng),
            study_origin: GeoPoint::random(&mut rng),
            study_longitude_offset: random_longitude_offset(&mut rng),
            participant_longitude_offset: random_longitude_offset(&mut participant_rng),
            participant_origin: GeoPoint::random(&mut participant_rng),
        }
    }

    /// Generates a context, then pins whatever the configuration fixes
    pub fn from_config(
        config: &AnonymizationConfig,
        participant_id: Option<&str>,
        device_id: &str,
    ) -> Self {
        let mut context = Self::generate(participant_id, device_id);
        if let Some(anchor) = config.random_time_anchor {
            context.random_time_anchor = anchor;
        }
        if let Some(origin) = config.study_origin {
            context.study_origin = origin;
        }
        if let Some(offset) = config.study_longitude_offset {
            context.study_longitude_offset = offset;
        }
        context
    }

    pub fn with_random_time_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.random_time_anchor = anchor;
        self
    }

    pub fn with_study_origin(mut self, origin: GeoPoint) -> Self {
        self.study_origin = origin;
        self
    }

    pub fn with_participant_origin(mut self, origin: GeoPoint) -> Self {
        self.participant_origin = origin;
        self
    }

    pub fn with_study_longitude_offset(mut self, offset: f64) -> Self {
        self.study_longitude_offset = offset;
        self
    }

    pub fn with_participant_longitude_offset(mut self, offset: f64) -> Self {
        self.participant_longitude_offset = offset;
        self
    }

    pub fn random_time_anchor(&self) -> DateTime<Utc> {
        self.random_time_anchor
    }

    pub fn study_origin(&self) -> GeoPoint {
        self.study_origin
    }

    pub fn participant_origin(&self) -> GeoPoint {
        self.participant_origin
    }

    pub fn study_longitude_offset(&self) -> f64 {
        self.study_longitude_offset
    }

    pub fn participant_longitude_offset(&self) -> f64 {
        self.participant_longitude_offset
    }
}
