//! Spherical web mercator projection (EPSG:3857).
//!
//! The standard web-map projection used by non-polar basemaps.

use std::f64::consts::{FRAC_PI_4, PI};

/// Earth radius used by web mercator (meters)
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Latitude clamp; web mercator is undefined at the poles
const MAX_LAT: f64 = 85.051_128_779_806_59;

/// Forward projection: geographic (degrees) to projected meters.
pub fn project(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MAX_LAT, MAX_LAT);
    let x = EARTH_RADIUS * lon_deg * PI / 180.0;
    let y = EARTH_RADIUS * (FRAC_PI_4 + lat * PI / 360.0).tan().ln();
    (x, y)
}

/// Inverse projection: projected meters to geographic (degrees).
pub fn inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = x / EARTH_RADIUS * 180.0 / PI;
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0) * 180.0 / PI;
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equator_origin() {
        let (x, y) = project(0.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip() {
        for &(lon, lat) in &[(-45.0, 70.0), (0.0, -71.0), (179.0, 45.0), (-122.3, 37.8)] {
            let (x, y) = project(lon, lat);
            let (lon2, lat2) = inverse(x, y);
            assert!((lon - lon2).abs() < 1e-9);
            assert!((lat - lat2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_world_extent() {
        // 180 degrees maps to the canonical web mercator half-width
        let (x, _) = project(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-3);
    }
}
