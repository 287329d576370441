//! # Geographic Utilities
//!
//! Distance and geometry helpers shared by the simplifier, the pass detector
//! and the playback engine.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`perpendicular_distance`] | Planar distance from a point to a chord, in degrees |
//! | [`interpolate`] | Linear interpolation between two points |
//! | [`search_window`] | Degree box enclosing a radius in meters |
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 latitude/longitude in degrees. The planar
//! helpers treat degrees as Cartesian units, which only holds for short spans
//! at moderate latitudes. That is the accuracy the simplifier is tuned for.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (spherical Earth,
/// mean radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use route_playback::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 5000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a polyline in meters.
///
/// Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Planar distance from `point` to the infinite line through `start` and `end`.
///
/// Uses the flat-earth approximation with longitude as x and latitude as y,
/// so the result is in decimal degrees. If the chord has zero length the
/// Euclidean distance to `start` is returned.
#[inline]
pub fn perpendicular_distance(point: &GpsPoint, start: &GpsPoint, end: &GpsPoint) -> f64 {
    let dx = end.longitude - start.longitude;
    let dy = end.latitude - start.latitude;
    let chord = (dx * dx + dy * dy).sqrt();

    if chord == 0.0 {
        let ex = point.longitude - start.longitude;
        let ey = point.latitude - start.latitude;
        return (ex * ex + ey * ey).sqrt();
    }

    let numerator = dy * point.longitude - dx * point.latitude + end.longitude * start.latitude
        - end.latitude * start.longitude;
    numerator.abs() / chord
}

/// Linear interpolation in latitude/longitude. `fraction` 0 yields `a`, 1 yields `b`.
#[inline]
pub fn interpolate(a: &GpsPoint, b: &GpsPoint, fraction: f64) -> GpsPoint {
    GpsPoint::new(
        a.latitude + (b.latitude - a.latitude) * fraction,
        a.longitude + (b.longitude - a.longitude) * fraction,
    )
}

// Lower bound on meters per degree along a meridian (or the equator), with
// margin below the spherical 111,195 m used by the haversine
const MIN_METERS_PER_DEGREE: f64 = 110_000.0;

/// Half-widths `(lat_deg, lng_deg)` of a lat/lng box containing every point
/// within `meters` of a point at `latitude`.
///
/// The longitude width is taken at the most poleward latitude in the box, so
/// the box never undercuts the true radius. Returns `None` when the box would
/// reach a pole or span half the globe; callers then fall back to a full scan.
pub fn search_window(meters: f64, latitude: f64) -> Option<(f64, f64)> {
    let lat_deg = meters / MIN_METERS_PER_DEGREE;
    let poleward = latitude.abs() + lat_deg;
    if !lat_deg.is_finite() || poleward >= 90.0 {
        return None;
    }
    let lng_deg = lat_deg / poleward.to_radians().cos();
    if !lng_deg.is_finite() || lng_deg >= 180.0 {
        return None;
    }
    Some((lat_deg, lng_deg))
}

// =============================================================================
// Unit Tests
// =============================================================================
