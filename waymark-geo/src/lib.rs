//! Pure geometry for geofence evaluation and dead reckoning.
//!
//! Everything in this crate is a side-effect-free function on coordinates:
//! great-circle distance, the spherical destination-point formula, polygon
//! membership and edge distance, and the dead-reckoning estimator. No I/O,
//! no clock reads, no async.

pub mod dead_reckoning;
pub mod geodesy;
pub mod polygon;

pub use geodesy::{
    clamp_latitude, destination_point, haversine_distance_m, normalize_bearing, wrap_longitude,
    EARTH_RADIUS_M,
};
pub use polygon::{distance_to_polygon_m, point_in_polygon};
