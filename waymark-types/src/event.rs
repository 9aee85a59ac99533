//! Geofence events.
//!
//! Events are the unit of delivery to the remote service. Each event is
//! immutable once created; only the `synced` flag mutates, and only the
//! outbox mutates it. The remote service deduplicates on
//! (geofence id, event type, timestamp), so redelivery is safe.

use crate::{Error, EventId, GeofenceId, LoadId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of geofence transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceEventType {
    Enter,
    Exit,
    Approach,
    Dwell,
}

impl GeofenceEventType {
    /// Returns the snake_case name used on the wire and in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
            Self::Approach => "approach",
            Self::Dwell => "dwell",
        }
    }
}

impl fmt::Display for GeofenceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeofenceEventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enter" => Ok(Self::Enter),
            "exit" => Ok(Self::Exit),
            "approach" => Ok(Self::Approach),
            "dwell" => Ok(Self::Dwell),
            other => Err(Error::UnknownEventType(other.to_string())),
        }
    }
}

/// A geofence transition, queued locally until delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceEvent {
    /// Local outbox identifier (UUID v7, creation-ordered).
    pub id: EventId,
    pub geofence_id: GeofenceId,
    pub event_type: GeofenceEventType,
    /// Where the tracked position was when the event fired.
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub load_id: Option<LoadId>,
    /// Accumulated seconds inside, for dwell events only.
    #[serde(default)]
    pub dwell_secs: Option<u32>,
    pub timestamp: Timestamp,
    /// Whether the remote service has acknowledged this event.
    #[serde(default)]
    pub synced: bool,
}

impl GeofenceEvent {
    /// Creates a new unsynced event.
    #[must_use]
    pub fn new(
        geofence_id: GeofenceId,
        event_type: GeofenceEventType,
        latitude: f64,
        longitude: f64,
        load_id: Option<LoadId>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: EventId::new(),
            geofence_id,
            event_type,
            latitude,
            longitude,
            load_id,
            dwell_secs: None,
            timestamp,
            synced: false,
        }
    }

    /// Creates an enter event.
    #[must_use]
    pub fn enter(
        geofence_id: GeofenceId,
        latitude: f64,
        longitude: f64,
        load_id: Option<LoadId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            geofence_id,
            GeofenceEventType::Enter,
            latitude,
            longitude,
            load_id,
            timestamp,
        )
    }

    /// Creates an exit event.
    #[must_use]
    pub fn exit(
        geofence_id: GeofenceId,
        latitude: f64,
        longitude: f64,
        load_id: Option<LoadId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            geofence_id,
            GeofenceEventType::Exit,
            latitude,
            longitude,
            load_id,
            timestamp,
        )
    }

    /// Creates an approach event.
    #[must_use]
    pub fn approach(
        geofence_id: GeofenceId,
        latitude: f64,
        longitude: f64,
        load_id: Option<LoadId>,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            geofence_id,
            GeofenceEventType::Approach,
            latitude,
            longitude,
            load_id,
            timestamp,
        )
    }

    /// Creates a dwell event carrying the accumulated seconds inside.
    #[must_use]
    pub fn dwell(
        geofence_id: GeofenceId,
        latitude: f64,
        longitude: f64,
        load_id: Option<LoadId>,
        dwell_secs: u32,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            dwell_secs: Some(dwell_secs),
            ..Self::new(
                geofence_id,
                GeofenceEventType::Dwell,
                latitude,
                longitude,
                load_id,
                timestamp,
            )
        }
    }
}
