//! Engine configuration.

use std::time::Duration;
use waymark_types::LoadId;

/// Configuration for the geofence monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// A live fix older than this is no longer treated as live.
    pub live_staleness: Duration,
    /// How long the ingest loop waits for a fix before logging a gap.
    pub fix_timeout: Duration,
    /// Interval between evaluation ticks.
    pub eval_interval: Duration,
    /// Interval between sync drain cycles while online.
    pub sync_interval: Duration,
    /// Cache age beyond which a geofence refresh is scheduled.
    pub cache_ttl: Duration,
    /// Radius for nearby-geofence downloads, in meters.
    pub cache_radius_m: f64,
    /// Speed assumed by the dead-reckoning estimator, in m/s.
    pub assumed_speed_mps: f64,
    /// Circle approach band = factor × radius.
    pub approach_band_factor: f64,
    /// Approach band width outside a polygon boundary, in meters.
    pub polygon_approach_margin_m: f64,
    /// The load being tracked, if any.
    pub load_id: Option<LoadId>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            live_staleness: Duration::from_secs(30),
            fix_timeout: Duration::from_secs(15),
            eval_interval: Duration::from_secs(3),
            sync_interval: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(15 * 60),
            cache_radius_m: 25_000.0,
            // ≈50 km/h, a conservative fleet average for highway + yard mix.
            assumed_speed_mps: 13.9,
            approach_band_factor: 2.0,
            polygon_approach_margin_m: 250.0,
            load_id: None,
        }
    }
}
