//! Core type definitions for Waymark.
//!
//! This crate defines the fundamental types shared by the geofence
//! monitoring engine:
//! - Geofence, load, and event identifiers (UUID)
//! - Millisecond wall-clock timestamps
//! - Positions with provenance tagging
//! - Geofence definitions (circle or polygon) and their alert flags
//! - Geofence events (enter/exit/approach/dwell)
//!
//! Geometry, persistence, and the engine itself live in their own crates;
//! nothing here performs I/O.

mod event;
mod geofence;
mod ids;
mod position;
mod timestamp;

pub use event::{GeofenceEvent, GeofenceEventType};
pub use geofence::{Geofence, GeofenceShape};
pub use ids::{EventId, GeofenceId, LoadId};
pub use position::{LatLng, Position, PositionSource};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid geofence: {0}")]
    InvalidGeofence(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),
}
