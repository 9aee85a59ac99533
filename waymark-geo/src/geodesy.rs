//! Spherical-earth geodesy.
//!
//! Distances and destination points are computed on a sphere of Earth's
//! mean radius. Bearings are degrees clockwise from true north.

use waymark_types::LatLng;

/// Earth's mean radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
#[must_use]
pub fn haversine_distance_m(a: LatLng, b: LatLng) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Normalizes a bearing into `[0, 360)`.
#[must_use]
pub fn normalize_bearing(bearing_deg: f64) -> f64 {
    let wrapped = bearing_deg % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Clamps a latitude into `[-90, 90]`.
#[must_use]
pub fn clamp_latitude(latitude_deg: f64) -> f64 {
    latitude_deg.clamp(-90.0, 90.0)
}

/// Wraps a longitude into `(-180, 180]`.
#[must_use]
pub fn wrap_longitude(longitude_deg: f64) -> f64 {
    let wrapped = longitude_deg % 360.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Destination point given a start, an initial bearing, and a distance,
/// via the standard forward geodesic on a sphere.
#[must_use]
pub fn destination_point(start: LatLng, bearing_deg: f64, distance_m: f64) -> LatLng {
    let theta = normalize_bearing(bearing_deg).to_radians();
    let delta = distance_m / EARTH_RADIUS_M;

    let phi1 = start.latitude.to_radians();
    let lambda1 = start.longitude.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos())
            .atan2(delta.cos() - phi1.sin() * phi2.sin());

    LatLng::new(
        clamp_latitude(phi2.to_degrees()),
        wrap_longitude(lambda2.to_degrees()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Meters spanned by one degree of arc on the mean-radius sphere.
    const ONE_DEGREE_M: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

    #[test]
    fn haversine_same_point_is_zero() {
        let p = LatLng::new(52.0, 4.0);
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn haversine_one_degree_longitude_at_equator() {
        let d = haversine_distance_m(LatLng::new(0.0, 0.0), LatLng::new(0.0, 1.0));
        assert!((d - ONE_DEGREE_M).abs() < 1.0, "got {d}");
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_distance_m(LatLng::new(10.0, 20.0), LatLng::new(11.0, 20.0));
        assert!((d - ONE_DEGREE_M).abs() < 1.0, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = LatLng::new(51.5, -0.13);
        let b = LatLng::new(48.86, 2.35);
        assert_eq!(haversine_distance_m(a, b), haversine_distance_m(b, a));
    }

    #[test]
    fn bearing_normalization() {
        assert_eq!(normalize_bearing(0.0), 0.0);
        assert_eq!(normalize_bearing(360.0), 0.0);
        assert_eq!(normalize_bearing(450.0), 90.0);
        assert_eq!(normalize_bearing(-90.0), 270.0);
        assert_eq!(normalize_bearing(720.0), 0.0);
    }

    #[test]
    fn longitude_wrapping() {
        assert_eq!(wrap_longitude(0.0), 0.0);
        assert_eq!(wrap_longitude(181.0), -179.0);
        assert_eq!(wrap_longitude(-181.0), 179.0);
        assert_eq!(wrap_longitude(180.0), 180.0);
        assert_eq!(wrap_longitude(-180.0), 180.0);
        assert_eq!(wrap_longitude(540.0), 180.0);
    }

    #[test]
    fn latitude_clamping() {
        assert_eq!(clamp_latitude(95.0), 90.0);
        assert_eq!(clamp_latitude(-95.0), -90.0);
        assert_eq!(clamp_latitude(45.0), 45.0);
    }

    #[test]
    fn destination_east_from_equator() {
        let dest = destination_point(LatLng::new(0.0, 0.0), 90.0, ONE_DEGREE_M);
        assert!(dest.latitude.abs() < 1e-6, "latitude {}", dest.latitude);
        assert!((dest.longitude - 1.0).abs() < 1e-6, "longitude {}", dest.longitude);
    }

    #[test]
    fn destination_north() {
        let dest = destination_point(LatLng::new(0.0, 0.0), 0.0, ONE_DEGREE_M);
        assert!((dest.latitude - 1.0).abs() < 1e-6);
        assert!(dest.longitude.abs() < 1e-6);
    }

    #[test]
    fn destination_roundtrips_through_haversine() {
        let start = LatLng::new(52.37, 4.9);
        let dest = destination_point(start, 213.0, 15_000.0);
        let d = haversine_distance_m(start, dest);
        assert!((d - 15_000.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn destination_with_unnormalized_bearing() {
        let straight = destination_point(LatLng::new(10.0, 10.0), 45.0, 5_000.0);
        let wrapped = destination_point(LatLng::new(10.0, 10.0), 405.0, 5_000.0);
        assert!((straight.latitude - wrapped.latitude).abs() < 1e-9);
        assert!((straight.longitude - wrapped.longitude).abs() < 1e-9);
    }
}
