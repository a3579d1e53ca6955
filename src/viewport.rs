//! Viewport tracking for interactive maps.
//!
//! Converts the map widget's pixel bounds and zoom level into projected and
//! geographic bounding boxes using the projection registry's tile-grid
//! origin and resolution ladder. The geographic bounds are derived from the
//! projected bounds only; the two never disagree once a viewport has
//! stabilized.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::projection::{self, ProjectionDescriptor};

/// Map bounds in screen-pixel units, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelBounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Map bounds in projected coordinates, as southwest/northeast corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedBounds {
    /// Southwest corner (x, y)
    pub sw: (f64, f64),
    /// Northeast corner (x, y)
    pub ne: (f64, f64),
}

/// Map bounds in geographic coordinates (degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeographicBounds {
    /// Corner form used by map widgets: ((south, west), (north, east))
    pub fn corners(&self) -> ((f64, f64), (f64, f64)) {
        ((self.south, self.west), (self.north, self.east))
    }

    pub fn from_corners(corners: ((f64, f64), (f64, f64))) -> Self {
        Self {
            south: corners.0 .0,
            west: corners.0 .1,
            north: corners.1 .0,
            east: corners.1 .1,
        }
    }
}

/// The current view of a map: pixel bounds at a zoom level plus the derived
/// projected and geographic bounding boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub zoom: usize,
    pub pixel_bounds: PixelBounds,
    pub projected: ProjectedBounds,
    pub geographic: GeographicBounds,
    /// Ground resolution at `zoom` (meters per pixel)
    pub resolution: f64,
}

impl Viewport {
    /// Compute a viewport from pixel bounds and a zoom level of a
    /// registered projection.
    pub fn compute(crs: &str, zoom: usize, pixel_bounds: PixelBounds) -> Result<Self> {
        let descriptor = projection::lookup(crs)?;
        let resolution = projection::resolution_for_zoom(crs, zoom)?;
        let projected = projected_bounds(pixel_bounds, descriptor, resolution);
        let geographic = geographic_bounds(projected, descriptor)?;
        Ok(Self {
            zoom,
            pixel_bounds,
            projected,
            geographic,
            resolution,
        })
    }
}

/// Convert pixel bounds to projected coordinates.
///
/// Screen pixels have a top-left origin while ground northing increases
/// upward, hence the sign flip on the y terms.
pub fn projected_bounds(
    pixel_bounds: PixelBounds,
    descriptor: &ProjectionDescriptor,
    resolution: f64,
) -> ProjectedBounds {
    let (ox, oy) = descriptor.origin;
    ProjectedBounds {
        sw: (
            ox + pixel_bounds.left * resolution,
            oy - pixel_bounds.bottom * resolution,
        ),
        ne: (
            ox + pixel_bounds.right * resolution,
            oy - pixel_bounds.top * resolution,
        ),
    }
}

/// Convert projected bounds to geographic bounds.
///
/// Only the SW and NE corners are transformed; north/south/east/west are
/// the max/min of the two transformed points. This matches the map widget's
/// own bounds reporting and is kept even though it is an approximation for
/// strongly curved polar projections.
pub fn geographic_bounds(
    projected: ProjectedBounds,
    descriptor: &ProjectionDescriptor,
) -> Result<GeographicBounds> {
    let (lons, lats) = projection::transform(
        descriptor.name,
        "EPSG:4326",
        &[projected.sw.0, projected.ne.0],
        &[projected.sw.1, projected.ne.1],
    )?;
    Ok(GeographicBounds {
        south: lats[0].min(lats[1]),
        west: lons[0].min(lons[1]),
        north: lats[0].max(lats[1]),
        east: lons[0].max(lons[1]),
    })
}

/// Wrap a longitude into (-180, 180] using an atan2-based wrap.
///
/// Naive modulo produces discontinuities at the antimeridian; the atan2
/// form does not.
pub fn wrap_longitude(lon: f64) -> f64 {
    let rad = lon.to_radians();
    rad.sin().atan2(rad.cos()).to_degrees()
}

/// Whether two geographic bounds agree within a tolerance, the settle test
/// used by the update loop.
pub fn bounds_close(a: &GeographicBounds, b: &GeographicBounds, tol: f64) -> bool {
    (a.south - b.south).abs() <= tol
        && (a.west - b.west).abs() <= tol
        && (a.north - b.north).abs() <= tol
        && (a.east - b.east).abs() <= tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projected_bounds_north_polar() {
        // 256x256 pixel window at zoom 4 (1024 m/px) anchored at the grid origin
        let descriptor = projection::lookup("EPSG:3413").unwrap();
        let pixel_bounds = PixelBounds {
            left: 0.0,
            top: 0.0,
            right: 256.0,
            bottom: 256.0,
        };
        let projected = projected_bounds(pixel_bounds, descriptor, 1024.0);
        assert_eq!(projected.sw, (-4194304.0, 3932160.0));
        assert_eq!(projected.ne, (-3932160.0, 4194304.0));
    }

    #[test]
    fn test_viewport_compute_derives_consistent_bounds() {
        // an off-center window, so the corner latitudes differ
        let pixel_bounds = PixelBounds {
            left: 1024.0,
            top: 512.0,
            right: 1536.0,
            bottom: 1024.0,
        };
        let viewport = Viewport::compute("EPSG:3413", 3, pixel_bounds).unwrap();
        assert_eq!(viewport.resolution, 2048.0);
        // geographic bounds must be re-derivable from the projected bounds
        let descriptor = projection::lookup("EPSG:3413").unwrap();
        let geo = geographic_bounds(viewport.projected, descriptor).unwrap();
        assert!(bounds_close(&viewport.geographic, &geo, 1e-12));
        assert!(viewport.geographic.south < viewport.geographic.north);
    }

    #[test]
    fn test_wrap_longitude_range_and_idempotence() {
        for lon in [-720.0, -541.0, -180.0, -179.999, 0.0, 179.999, 180.0, 359.0, 1234.5] {
            let w = wrap_longitude(lon);
            assert!(w > -180.0 - 1e-9 && w <= 180.0 + 1e-9, "wrap({}) = {}", lon, w);
            let w2 = wrap_longitude(w);
            assert!((w - w2).abs() < 1e-9, "wrap not idempotent at {}", lon);
        }
    }

    #[test]
    fn test_wrap_longitude_antimeridian() {
        // 180 stays 180 (not -180), and 190 wraps to -170
        assert!((wrap_longitude(180.0) - 180.0).abs() < 1e-9);
        assert!((wrap_longitude(190.0) + 170.0).abs() < 1e-9);
        assert!((wrap_longitude(-190.0) - 170.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_close() {
        let a = GeographicBounds {
            south: 60.0,
            west: -50.0,
            north: 80.0,
            east: -10.0,
        };
        let mut b = a;
        assert!(bounds_close(&a, &b, 1e-9));
        b.north += 1e-3;
        assert!(!bounds_close(&a, &b, 1e-6));
        assert!(bounds_close(&a, &b, 1e-2));
    }
}
