//! Geographic utilities shared by every overlay component.
//!
//! Great-circle distance, polyline length, segment midpoints and the
//! ray-casting point-in-polygon test used for geofence classification.

use geo::{Geometry, LineString, Polygon};

use crate::LngLat;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two points in meters (haversine formula).
///
/// # Example
/// ```
/// use track_overlay::{geo_utils::haversine_distance, LngLat};
///
/// let london = LngLat { lng: -0.1278, lat: 51.5074 };
/// let paris = LngLat { lng: 2.3522, lat: 48.8566 };
/// let distance = haversine_distance(london, paris);
/// assert!((distance / 1000.0 - 344.0).abs() < 2.0);
/// ```
pub fn haversine_distance(a: LngLat, b: LngLat) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Total great-circle length of a polyline in meters.
pub fn polyline_length(points: &[LngLat]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(w[0], w[1]))
        .sum()
}

/// Arithmetic midpoint of a segment.
///
/// This is the mean of the endpoint coordinates, not a geodesic
/// interpolation. At typical GPS fix spacing the difference is negligible;
/// callers that classify long segments must not rely on geodesic accuracy.
pub fn segment_midpoint(a: LngLat, b: LngLat) -> LngLat {
    LngLat {
        lng: (a.lng + b.lng) / 2.0,
        lat: (a.lat + b.lat) / 2.0,
    }
}

/// Ray-casting containment test against a single ring.
///
/// Casts a ray in the +longitude direction and toggles on every edge whose
/// latitude span straddles the test point. The half-open edge convention
/// (`>` on one end, `<=` via negation on the other) keeps shared vertices
/// from being counted twice. Works for open and explicitly closed rings.
pub fn point_in_ring(point: LngLat, ring: &LineString<f64>) -> bool {
    let verts = &ring.0;
    if verts.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = verts.len() - 1;
    for i in 0..verts.len() {
        let (xi, yi) = (verts[i].x, verts[i].y);
        let (xj, yj) = (verts[j].x, verts[j].y);
        let crosses = ((yi > point.lat) != (yj > point.lat))
            && point.lng < (xj - xi) * (point.lat - yi) / (yj - yi) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Containment test against a polygon with hole subtraction.
///
/// A point inside the exterior ring but inside any hole ring is outside.
pub fn point_in_polygon(point: LngLat, polygon: &Polygon<f64>) -> bool {
    if !point_in_ring(point, polygon.exterior()) {
        return false;
    }
    !polygon.interiors().iter().any(|hole| point_in_ring(point, hole))
}

/// Containment test against an arbitrary geometry.
///
/// Only `Polygon` and `MultiPolygon` can contain a point here; every other
/// geometry type answers "not inside" rather than erroring, so malformed
/// geofence conversions degrade safely.
pub fn point_in_geometry(point: LngLat, geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::Polygon(polygon) => point_in_polygon(point, polygon),
        Geometry::MultiPolygon(multi) => {
            multi.0.iter().any(|polygon| point_in_polygon(point, polygon))
        }
        _ => false,
    }
}
