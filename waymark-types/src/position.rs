//! Position types with provenance tagging.
//!
//! A resolved position always records where its value came from: a live
//! fix, a dead-reckoned estimate, the cached last-known position, or a
//! sentinel when no tier could produce anything.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Provenance of a resolved position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSource {
    /// A live fix from the device location provider.
    Live,
    /// Estimated from the last known position, heading, and assumed speed.
    DeadReckoning,
    /// The cached last-known position, returned unchanged.
    Cached,
    /// No position could be resolved from any tier.
    None,
}

impl PositionSource {
    /// Returns the snake_case name used on the wire and in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::DeadReckoning => "dead_reckoning",
            Self::Cached => "cached",
            Self::None => "none",
        }
    }
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position with accuracy, motion data, and provenance.
///
/// `source` always reflects the provenance of the value as returned:
/// a dead-reckoned estimate is never mislabeled as live, and a stale
/// cache hit is never mislabeled as fresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy_m: f64,
    /// Ground speed in meters per second, if known.
    pub speed_mps: Option<f64>,
    /// Heading in degrees clockwise from true north, if known.
    pub heading_deg: Option<f64>,
    /// Altitude in meters above the WGS84 ellipsoid, if known.
    pub altitude_m: Option<f64>,
    pub timestamp: Timestamp,
    pub source: PositionSource,
}

impl Position {
    /// The sentinel returned when no position tier could resolve.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            accuracy_m: f64::MAX,
            speed_mps: None,
            heading_deg: None,
            altitude_m: None,
            timestamp: Timestamp::from_millis(0),
            source: PositionSource::None,
        }
    }

    /// Returns true unless this is the `none` sentinel.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.source != PositionSource::None
    }

    /// Returns the coordinate pair.
    #[must_use]
    pub const fn lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}
