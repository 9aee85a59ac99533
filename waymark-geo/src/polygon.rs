//! Polygon membership and edge distance.

use crate::geodesy::{wrap_longitude, EARTH_RADIUS_M};
use waymark_types::LatLng;

/// Ray-casting point-in-polygon test (even-odd rule).
///
/// The polygon is treated as closed; the last vertex connects back to
/// the first. Fewer than three vertices is never inside.
#[must_use]
pub fn point_in_polygon(point: LatLng, vertices: &[LatLng]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].longitude, vertices[i].latitude);
        let (xj, yj) = (vertices[j].longitude, vertices[j].latitude);
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Distance in meters from a point to a polygon boundary.
///
/// Returns 0 for points inside the polygon; otherwise the minimum
/// point-to-segment distance over all edges, computed in a local
/// equirectangular projection centered on the query point.
#[must_use]
pub fn distance_to_polygon_m(point: LatLng, vertices: &[LatLng]) -> f64 {
    if vertices.is_empty() {
        return f64::INFINITY;
    }
    if point_in_polygon(point, vertices) {
        return 0.0;
    }

    let cos_lat = point.latitude.to_radians().cos();
    let project = |v: LatLng| -> (f64, f64) {
        let x = wrap_longitude(v.longitude - point.longitude).to_radians() * cos_lat * EARTH_RADIUS_M;
        let y = (v.latitude - point.latitude).to_radians() * EARTH_RADIUS_M;
        (x, y)
    };

    let mut min_sq = f64::INFINITY;
    for i in 0..vertices.len() {
        let a = project(vertices[i]);
        let b = project(vertices[(i + 1) % vertices.len()]);
        min_sq = min_sq.min(origin_to_segment_sq(a, b));
    }
    min_sq.sqrt()
}

/// Squared distance from the origin to the segment (a, b).
fn origin_to_segment_sq(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (ax, ay) = a;
    let (bx, by) = b;
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ax * ax + ay * ay;
    }
    let t = (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0);
    let px = ax + t * dx;
    let py = ay + t * dy;
    px * px + py * py
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<LatLng> {
        vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 1.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(1.0, 0.0),
        ]
    }

    #[test]
    fn center_of_square_is_inside() {
        assert!(point_in_polygon(LatLng::new(0.5, 0.5), &unit_square()));
    }

    #[test]
    fn point_outside_square() {
        assert!(!point_in_polygon(LatLng::new(1.5, 0.5), &unit_square()));
        assert!(!point_in_polygon(LatLng::new(0.5, -0.5), &unit_square()));
    }

    #[test]
    fn degenerate_polygon_is_never_inside() {
        let line = vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)];
        assert!(!point_in_polygon(LatLng::new(0.5, 0.5), &line));
    }

    #[test]
    fn concave_polygon_membership() {
        // L-shape: the notch at the top-right is outside.
        let l_shape = vec![
            LatLng::new(0.0, 0.0),
            LatLng::new(0.0, 2.0),
            LatLng::new(1.0, 2.0),
            LatLng::new(1.0, 1.0),
            LatLng::new(2.0, 1.0),
            LatLng::new(2.0, 0.0),
        ];
        assert!(point_in_polygon(LatLng::new(0.5, 0.5), &l_shape));
        assert!(point_in_polygon(LatLng::new(0.5, 1.5), &l_shape));
        assert!(!point_in_polygon(LatLng::new(1.5, 1.5), &l_shape));
    }

    #[test]
    fn distance_inside_is_zero() {
        assert_eq!(
            distance_to_polygon_m(LatLng::new(0.5, 0.5), &unit_square()),
            0.0
        );
    }

    #[test]
    fn distance_to_nearest_edge() {
        // Half a degree east of the lng=1 edge, at lat 0.5.
        let d = distance_to_polygon_m(LatLng::new(0.5, 1.5), &unit_square());
        assert!((55_000.0..56_000.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_to_nearest_corner() {
        // Diagonally off the (1, 1) corner.
        let d = distance_to_polygon_m(LatLng::new(1.1, 1.1), &unit_square());
        let edge = distance_to_polygon_m(LatLng::new(1.1, 0.5), &unit_square());
        assert!(d > edge, "corner distance {d} should exceed edge distance {edge}");
    }
}
