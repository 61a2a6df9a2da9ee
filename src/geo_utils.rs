//! # Geographic Utilities
//!
//! Distance computations shared by the reducer, the gazetteer and the run
//! summary.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance_km`] | Great-circle distance between two coordinates |
//! | [`track_length_km`] | Total length of a coordinate sequence |
//! | [`radius_bounds`] | Longitude/latitude boxes covering every point within a radius |
//!
//! ## Example
//!
//! ```rust
//! use route_cities::{Coordinate, geo_utils};
//!
//! let albuquerque = Coordinate::new(35.0844, -106.6504);
//! let santa_fe = Coordinate::new(35.6869, -105.9378);
//!
//! let dist = geo_utils::haversine_distance_km(&albuquerque, &santa_fe);
//! assert!(dist > 90.0 && dist < 95.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances assume a spherical Earth of radius [`EARTH_RADIUS_KM`]
//! (6,371.0088 km, the IUGG mean radius used by geo's `Haversine`). The
//! spherical model is off from the WGS84 ellipsoid by up to ~0.5%, which is a
//! few hundred meters over the 25-50 km gazetteer radii and well under the
//! kilometer-scale cluster radii used for sampling. That error is accepted;
//! nothing downstream needs ellipsoidal precision.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)

use geo::{Distance, Haversine, Point};

use crate::Coordinate;

/// Sphere radius behind every distance in this crate, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Relative widening of search boxes against float noise at their edges.
const BOUNDS_MARGIN: f64 = 1.0 + 1e-9;
const BOUNDS_EPSILON_DEG: f64 = 1e-9;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates, in kilometers.
///
/// Symmetric, non-negative, and exactly zero for identical coordinates.
///
/// # Example
///
/// ```rust
/// use route_cities::{Coordinate, geo_utils};
///
/// let tulsa = Coordinate::new(36.1540, -95.9928);
/// assert_eq!(geo_utils::haversine_distance_km(&tulsa, &tulsa), 0.0);
/// ```
#[inline]
pub fn haversine_distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    haversine_km(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Same as [`haversine_distance_km`] on raw latitude/longitude pairs.
#[inline]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    Haversine::distance(p1, p2) / 1000.0
}

/// Total length of a coordinate sequence in kilometers.
///
/// Empty or single-point sequences return 0.0.
pub fn track_length_km(points: &[Coordinate]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance_km(&w[0], &w[1]))
        .sum()
}

/// Axis-aligned `([min_lon, min_lat], [max_lon, max_lat])` boxes that
/// together contain every point within `radius_km` of `center`.
///
/// The longitude half-width is the exact extent of the spherical cap,
/// `asin(sin(r) / cos(lat))`. A cap reaching a pole spans all longitudes. A
/// cap crossing the antimeridian is split into two boxes, so the result has
/// one or two entries.
pub fn radius_bounds(center: &Coordinate, radius_km: f64) -> Vec<([f64; 2], [f64; 2])> {
    let angular = radius_km.max(0.0) / EARTH_RADIUS_KM;
    let dlat = angular.to_degrees() * BOUNDS_MARGIN + BOUNDS_EPSILON_DEG;
    let lat_min = (center.latitude - dlat).max(-90.0);
    let lat_max = (center.latitude + dlat).min(90.0);
    let full = vec![([-180.0, lat_min], [180.0, lat_max])];

    if center.latitude + dlat >= 90.0 || center.latitude - dlat <= -90.0 {
        return full;
    }

    let ratio = angular.sin() / center.latitude.to_radians().cos();
    if ratio >= 1.0 {
        return full;
    }
    let dlon = ratio.asin().to_degrees() * BOUNDS_MARGIN + BOUNDS_EPSILON_DEG;
    if dlon >= 180.0 {
        return full;
    }

    let lon_min = center.longitude - dlon;
    let lon_max = center.longitude + dlon;
    if lon_min < -180.0 {
        vec![
            ([lon_min + 360.0, lat_min], [180.0, lat_max]),
            ([-180.0, lat_min], [lon_max, lat_max]),
        ]
    } else if lon_max > 180.0 {
        vec![
            ([lon_min, lat_min], [180.0, lat_max]),
            ([-180.0, lat_min], [lon_max - 360.0, lat_max]),
        ]
    } else {
        vec![([lon_min, lat_min], [lon_max, lat_max])]
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_distance_same_point_is_zero() {
        let p = Coordinate::new(35.0844, -106.6504);
        assert_eq!(haversine_distance_km(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric_and_non_negative() {
        let pairs = [
            (Coordinate::new(34.0522, -118.2437), Coordinate::new(40.7128, -74.0060)),
            (Coordinate::new(-33.8688, 151.2093), Coordinate::new(51.5074, -0.1278)),
            (Coordinate::new(0.0, 179.9), Coordinate::new(0.0, -179.9)),
        ];
        for (a, b) in &pairs {
            let ab = haversine_distance_km(a, b);
            let ba = haversine_distance_km(b, a);
            assert!(ab >= 0.0);
            assert!(approx_eq(ab, ba, 1e-9));
        }
    }

    #[test]
    fn test_distance_known_value() {
        // Los Angeles to New York is roughly 3,940 km
        let la = Coordinate::new(34.0522, -118.2437);
        let nyc = Coordinate::new(40.7128, -74.0060);
        assert!(approx_eq(haversine_distance_km(&la, &nyc), 3940.0, 20.0));
    }

    #[test]
    fn test_albuquerque_offset_is_about_eight_km() {
        let city = Coordinate::new(35.0844, -106.6504);
        let query = Coordinate::new(35.10, -106.62);
        let d = haversine_distance_km(&city, &query);
        assert!(d > 2.0 && d < 8.5, "got {d}");
    }

    #[test]
    fn test_track_length_short_inputs() {
        assert_eq!(track_length_km(&[]), 0.0);
        assert_eq!(track_length_km(&[Coordinate::new(36.0, -96.0)]), 0.0);
    }

    #[test]
    fn test_track_length_sums_legs() {
        let track = vec![
            Coordinate::new(36.0, -96.0),
            Coordinate::new(36.1, -96.0),
            Coordinate::new(36.2, -96.0),
        ];
        // Two legs of ~11.1 km each
        assert!(approx_eq(track_length_km(&track), 22.24, 0.1));
    }

    #[test]
    fn test_distance_uses_stated_radius() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 1.0);
        let expected = EARTH_RADIUS_KM * 1.0_f64.to_radians();
        assert!(approx_eq(haversine_distance_km(&a, &b), expected, 1e-6));
    }

    fn contains(bounds: &[([f64; 2], [f64; 2])], p: &Coordinate) -> bool {
        bounds.iter().any(|(lo, hi)| {
            p.longitude >= lo[0] && p.longitude <= hi[0] && p.latitude >= lo[1] && p.latitude <= hi[1]
        })
    }

    #[test]
    fn test_radius_bounds_mid_latitude() {
        let center = Coordinate::new(35.0, -106.0);
        let bounds = radius_bounds(&center, 10.0);
        assert_eq!(bounds.len(), 1);
        // Due east and due north at just under 10 km
        assert!(contains(&bounds, &Coordinate::new(35.0, -106.0 + 0.1097)));
        assert!(contains(&bounds, &Coordinate::new(35.0 + 0.0899, -106.0)));
        assert!(!contains(&bounds, &Coordinate::new(35.0, -105.8)));
    }

    #[test]
    fn test_radius_bounds_high_latitude() {
        let center = Coordinate::new(89.0, 0.0);
        let neighbour = Coordinate::new(89.0, 2.5);
        assert!(haversine_distance_km(&center, &neighbour) < 5.0);
        assert!(contains(&radius_bounds(&center, 5.0), &neighbour));

        // Cap over the pole spans every longitude
        let bounds = radius_bounds(&Coordinate::new(89.99, 10.0), 5.0);
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds[0].0[0], -180.0);
        assert_eq!(bounds[0].1[0], 180.0);
        assert_eq!(bounds[0].1[1], 90.0);
    }

    #[test]
    fn test_radius_bounds_wrap_antimeridian() {
        let center = Coordinate::new(0.0, 179.99);
        let across = Coordinate::new(0.0, -179.99);
        assert!(haversine_distance_km(&center, &across) < 5.0);

        let bounds = radius_bounds(&center, 5.0);
        assert_eq!(bounds.len(), 2);
        assert!(contains(&bounds, &across));
        assert!(contains(&bounds, &center));

        let bounds = radius_bounds(&across, 5.0);
        assert_eq!(bounds.len(), 2);
        assert!(contains(&bounds, &center));
    }
}
