//! Geofence definitions.
//!
//! Geofences are downloaded wholesale from the remote service and cached
//! locally. A definition is either a circle (center + radius) or a
//! polygon (vertex list); alert flags decide which transitions produce
//! events, dwell carries a per-fence threshold.

use crate::{Error, GeofenceId, LatLng, LoadId, Result, Timestamp};
use serde::{Deserialize, Serialize};

/// The geographic shape of a geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum GeofenceShape {
    /// A circle around a center point.
    Circle { center: LatLng, radius_m: f64 },
    /// A closed polygon. The last vertex connects back to the first.
    Polygon { vertices: Vec<LatLng> },
}

/// A named geographic trigger region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: GeofenceId,
    pub name: String,
    #[serde(flatten)]
    pub shape: GeofenceShape,
    /// The load this geofence is attached to, if any.
    #[serde(default)]
    pub load_id: Option<LoadId>,
    #[serde(default)]
    pub alert_on_enter: bool,
    #[serde(default)]
    pub alert_on_exit: bool,
    #[serde(default)]
    pub alert_on_dwell: bool,
    /// Continuous seconds inside before a dwell event fires.
    #[serde(default)]
    pub dwell_threshold_secs: u32,
    /// When this definition was cached locally.
    pub cached_at: Timestamp,
}

impl Geofence {
    /// Creates a circular geofence with enter/exit alerts enabled.
    #[must_use]
    pub fn circle(name: impl Into<String>, center: LatLng, radius_m: f64) -> Self {
        Self {
            id: GeofenceId::new(),
            name: name.into(),
            shape: GeofenceShape::Circle { center, radius_m },
            load_id: None,
            alert_on_enter: true,
            alert_on_exit: true,
            alert_on_dwell: false,
            dwell_threshold_secs: 0,
            cached_at: Timestamp::now(),
        }
    }

    /// Creates a polygonal geofence with enter/exit alerts enabled.
    #[must_use]
    pub fn polygon(name: impl Into<String>, vertices: Vec<LatLng>) -> Self {
        Self {
            id: GeofenceId::new(),
            name: name.into(),
            shape: GeofenceShape::Polygon { vertices },
            load_id: None,
            alert_on_enter: true,
            alert_on_exit: true,
            alert_on_dwell: false,
            dwell_threshold_secs: 0,
            cached_at: Timestamp::now(),
        }
    }

    /// Enables the dwell alert with the given threshold.
    #[must_use]
    pub fn with_dwell(mut self, threshold_secs: u32) -> Self {
        self.alert_on_dwell = true;
        self.dwell_threshold_secs = threshold_secs;
        self
    }

    /// Associates this geofence with a load.
    #[must_use]
    pub fn with_load(mut self, load_id: LoadId) -> Self {
        self.load_id = Some(load_id);
        self
    }

    /// Validates the shape: circles need a positive finite radius,
    /// polygons need at least three vertices.
    pub fn validate(&self) -> Result<()> {
        match &self.shape {
            GeofenceShape::Circle { radius_m, .. } => {
                if !radius_m.is_finite() || *radius_m <= 0.0 {
                    return Err(Error::InvalidGeofence(format!(
                        "circle radius must be positive, got {radius_m}"
                    )));
                }
            }
            GeofenceShape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(Error::InvalidGeofence(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    )));
                }
            }
        }
        Ok(())
    }
}
