//! Dead-reckoning position estimation.
//!
//! When live positioning is stale or absent, the engine projects the last
//! known position forward along the current heading at an assumed speed.
//! The estimate's accuracy widens with elapsed time so downstream
//! consumers can discount old projections.

use crate::geodesy::{destination_point, normalize_bearing};
use std::time::Duration;
use waymark_types::{Position, PositionSource};

/// Accuracy widening per elapsed second, in meters.
pub const ACCURACY_GROWTH_MPS: f64 = 1.0;

/// Projects `last` forward along `heading_deg` at `assumed_speed_mps`
/// for `elapsed` time.
///
/// Without a heading there is nothing to project along: the input
/// position is returned unchanged, provenance intact. Otherwise the
/// result is tagged [`PositionSource::DeadReckoning`], its timestamp is
/// advanced by `elapsed`, and its accuracy widens linearly with elapsed
/// time — there is no upper bound, so a projection from a very old fix
/// is still computed but arrives with a correspondingly wide accuracy.
#[must_use]
pub fn estimate(
    last: &Position,
    elapsed: Duration,
    heading_deg: Option<f64>,
    assumed_speed_mps: f64,
) -> Position {
    let Some(heading) = heading_deg else {
        return *last;
    };

    let heading = normalize_bearing(heading);
    let elapsed_secs = elapsed.as_secs_f64();
    let distance_m = assumed_speed_mps * elapsed_secs;
    let destination = destination_point(last.lat_lng(), heading, distance_m);

    Position {
        latitude: destination.latitude,
        longitude: destination.longitude,
        accuracy_m: last.accuracy_m + elapsed_secs * ACCURACY_GROWTH_MPS,
        speed_mps: Some(assumed_speed_mps),
        heading_deg: Some(heading),
        altitude_m: last.altitude_m,
        timestamp: last.timestamp + elapsed,
        source: PositionSource::DeadReckoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_types::Timestamp;

    fn fix_at(latitude: f64, longitude: f64) -> Position {
        Position {
            latitude,
            longitude,
            accuracy_m: 10.0,
            speed_mps: Some(8.0),
            heading_deg: Some(45.0),
            altitude_m: Some(12.0),
            timestamp: Timestamp::from_millis(1_000_000),
            source: PositionSource::Live,
        }
    }

    #[test]
    fn east_displacement_from_equator() {
        // 10 m/s east for 100 s ≈ 1000 m ≈ 1000/111320 degrees of longitude.
        let start = fix_at(0.0, 0.0);
        let est = estimate(&start, Duration::from_secs(100), Some(90.0), 10.0);
        assert_eq!(est.source, PositionSource::DeadReckoning);
        assert!(est.latitude.abs() < 1e-6);
        let expected_delta = 1000.0 / 111_320.0;
        assert!(
            (est.longitude - expected_delta).abs() < 2e-5,
            "longitude {} vs expected {expected_delta}",
            est.longitude
        );
        let travelled = crate::haversine_distance_m(start.lat_lng(), est.lat_lng());
        assert!((travelled - 1000.0).abs() < 2.0, "travelled {travelled}");
    }

    #[test]
    fn no_heading_returns_input_unchanged() {
        let last = fix_at(52.0, 4.0);
        let est = estimate(&last, Duration::from_secs(60), None, 10.0);
        assert_eq!(est, last);
    }

    #[test]
    fn accuracy_widens_linearly() {
        let last = fix_at(52.0, 4.0);
        let est = estimate(&last, Duration::from_secs(90), Some(0.0), 10.0);
        assert!((est.accuracy_m - 100.0).abs() < 1e-9);
    }

    #[test]
    fn long_elapsed_still_computes_with_degraded_accuracy() {
        // Past the ten-minute sanity bound the estimate keeps widening.
        let last = fix_at(52.0, 4.0);
        let est = estimate(&last, Duration::from_secs(1_200), Some(180.0), 10.0);
        assert_eq!(est.source, PositionSource::DeadReckoning);
        assert!(est.accuracy_m >= last.accuracy_m + 1_200.0);
        assert!(est.latitude < last.latitude);
    }

    #[test]
    fn timestamp_advances_by_elapsed() {
        let last = fix_at(52.0, 4.0);
        let est = estimate(&last, Duration::from_secs(30), Some(0.0), 10.0);
        assert_eq!(est.timestamp.as_millis(), last.timestamp.as_millis() + 30_000);
    }

    #[test]
    fn heading_is_normalized() {
        let last = fix_at(10.0, 10.0);
        let est = estimate(&last, Duration::from_secs(10), Some(-90.0), 10.0);
        assert_eq!(est.heading_deg, Some(270.0));
    }

    #[test]
    fn zero_elapsed_keeps_coordinates() {
        let last = fix_at(52.0, 4.0);
        let est = estimate(&last, Duration::ZERO, Some(90.0), 10.0);
        assert!((est.latitude - 52.0).abs() < 1e-12);
        assert!((est.longitude - 4.0).abs() < 1e-12);
        assert_eq!(est.source, PositionSource::DeadReckoning);
    }
}
