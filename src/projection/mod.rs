//! Coordinate reference systems and the tile-grid projection registry.
//!
//! The registry is a static table describing the projections the polar
//! gridded products are served in: the tile-grid origin, the per-zoom
//! resolution ladder, and the projected bounding box. It also provides the
//! coordinate transforms between those systems and geographic coordinates,
//! which the viewport tracker and the resampler rely on.

pub mod mercator;
pub mod stereographic;

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::{IcemapError, Result};
use stereographic::PolarStereographic;

/// Immutable description of a tiled map projection.
///
/// Created once at process start; never mutated.
#[derive(Debug, Clone)]
pub struct ProjectionDescriptor {
    /// CRS identifier, e.g. "EPSG:3413"
    pub name: &'static str,
    /// Projected coordinate of the tile grid's top-left corner
    pub origin: (f64, f64),
    /// Ground resolution per zoom level; higher zoom is finer
    pub resolutions: &'static [f64],
    /// Projected bounding box as (min, max) corners
    pub bounds: ((f64, f64), (f64, f64)),
}

/// Resolution ladder shared by the EPSG:3413 and EPSG:3031 tile grids
const POLAR_RESOLUTIONS: &[f64] = &[16384.0, 8192.0, 4096.0, 2048.0, 1024.0, 512.0, 256.0];

/// Web mercator resolution ladder (zoom 0..=18)
static MERCATOR_RESOLUTIONS: Lazy<Vec<f64>> = Lazy::new(|| {
    let r0 = 2.0 * std::f64::consts::PI * mercator::EARTH_RADIUS / 256.0;
    (0..=18).map(|z| r0 / f64::powi(2.0, z)).collect()
});

static REGISTRY: Lazy<HashMap<&'static str, ProjectionDescriptor>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "EPSG:3413",
        ProjectionDescriptor {
            name: "EPSG:3413",
            origin: (-4194304.0, 4194304.0),
            resolutions: POLAR_RESOLUTIONS,
            bounds: ((-4194304.0, -4194304.0), (4194304.0, 4194304.0)),
        },
    );
    m.insert(
        "EPSG:3031",
        ProjectionDescriptor {
            name: "EPSG:3031",
            origin: (-4194304.0, 4194304.0),
            resolutions: POLAR_RESOLUTIONS,
            bounds: ((-4194304.0, -4194304.0), (4194304.0, 4194304.0)),
        },
    );
    let half_world = 20_037_508.342_789_244;
    m.insert(
        "EPSG:3857",
        ProjectionDescriptor {
            name: "EPSG:3857",
            origin: (-half_world, half_world),
            resolutions: &MERCATOR_RESOLUTIONS,
            bounds: ((-half_world, -half_world), (half_world, half_world)),
        },
    );
    m
});

static NORTH_POLAR: Lazy<PolarStereographic> =
    Lazy::new(|| PolarStereographic::north(-45.0, 70.0));
static SOUTH_POLAR: Lazy<PolarStereographic> =
    Lazy::new(|| PolarStereographic::south(0.0, -71.0));

/// Look up a projection descriptor by CRS name.
pub fn lookup(name: &str) -> Result<&'static ProjectionDescriptor> {
    REGISTRY
        .get(name)
        .ok_or_else(|| IcemapError::UnknownProjection {
            name: name.to_string(),
        })
}

/// Get the ground resolution for a zoom level of a registered projection.
pub fn resolution_for_zoom(name: &str, zoom: usize) -> Result<f64> {
    let descriptor = lookup(name)?;
    descriptor
        .resolutions
        .get(zoom)
        .copied()
        .ok_or_else(|| IcemapError::InvalidParameter {
            param: "zoom".to_string(),
            message: format!(
                "Zoom level {} out of range for {} (max {})",
                zoom,
                name,
                descriptor.resolutions.len() - 1
            ),
        })
}

/// Supported coordinate reference systems for point transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Crs {
    Geographic,
    PolarNorth,
    PolarSouth,
    WebMercator,
}

/// Resolve a CRS identifier, accepting either an "EPSG:xxxx" name or a WKT
/// string carrying the EPSG authority code (the form stored in the product's
/// grid-mapping attributes).
fn parse_crs(name: &str) -> Result<Crs> {
    let compact = name.trim();
    let code = if let Some(code) = compact.strip_prefix("EPSG:") {
        code.to_string()
    } else if compact.contains("PROJCS") || compact.contains("GEOGCS") {
        // WKT: take the last EPSG authority code
        let mut found = None;
        let mut rest = compact;
        while let Some(idx) = rest.find("\"EPSG\",") {
            let tail = &rest[idx + 7..];
            let digits: String = tail
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                found = Some(digits);
            }
            rest = tail;
        }
        found.ok_or_else(|| IcemapError::UnknownProjection {
            name: compact.chars().take(64).collect(),
        })?
    } else {
        return Err(IcemapError::UnknownProjection {
            name: compact.to_string(),
        });
    };

    match code.as_str() {
        "4326" => Ok(Crs::Geographic),
        "3413" => Ok(Crs::PolarNorth),
        "3031" => Ok(Crs::PolarSouth),
        "3857" => Ok(Crs::WebMercator),
        other => Err(IcemapError::UnknownProjection {
            name: format!("EPSG:{}", other),
        }),
    }
}

fn to_geographic(crs: Crs, x: f64, y: f64) -> (f64, f64) {
    match crs {
        Crs::Geographic => (x, y),
        Crs::PolarNorth => NORTH_POLAR.inverse(x, y),
        Crs::PolarSouth => SOUTH_POLAR.inverse(x, y),
        Crs::WebMercator => mercator::inverse(x, y),
    }
}

fn from_geographic(crs: Crs, lon: f64, lat: f64) -> (f64, f64) {
    match crs {
        Crs::Geographic => (lon, lat),
        Crs::PolarNorth => NORTH_POLAR.project(lon, lat),
        Crs::PolarSouth => SOUTH_POLAR.project(lon, lat),
        Crs::WebMercator => mercator::project(lon, lat),
    }
}

/// Transform coordinate arrays between two CRSs, pivoting through
/// geographic coordinates.
pub fn transform(src: &str, dst: &str, xs: &[f64], ys: &[f64]) -> Result<(Vec<f64>, Vec<f64>)> {
    let src = parse_crs(src)?;
    let dst = parse_crs(dst)?;
    let mut out_x = Vec::with_capacity(xs.len());
    let mut out_y = Vec::with_capacity(ys.len());
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let (lon, lat) = to_geographic(src, x, y);
        let (tx, ty) = from_geographic(dst, lon, lat);
        out_x.push(tx);
        out_y.push(ty);
    }
    Ok((out_x, out_y))
}

/// Whether two CRS identifiers resolve to the same system.
pub fn same_crs(a: &str, b: &str) -> Result<bool> {
    Ok(parse_crs(a)? == parse_crs(b)?)
}

/// Transform a single point between two CRSs.
pub fn transform_point(src: &str, dst: &str, x: f64, y: f64) -> Result<(f64, f64)> {
    let (xs, ys) = transform(src, dst, &[x], &[y])?;
    Ok((xs[0], ys[0]))
}

/// Transform a bounding box between two CRSs.
///
/// Only the four corner points are transformed and their envelope taken;
/// for strongly curved projections this under-estimates the true envelope.
/// The approximation matches the behavior the gridded products were
/// designed around and is kept deliberately.
pub fn transform_bounds(
    src: &str,
    dst: &str,
    minx: f64,
    miny: f64,
    maxx: f64,
    maxy: f64,
) -> Result<[f64; 4]> {
    let xs = [minx, minx, maxx, maxx];
    let ys = [miny, maxy, miny, maxy];
    let (tx, ty) = transform(src, dst, &xs, &ys)?;
    let fold = |acc: (f64, f64), v: &f64| (acc.0.min(*v), acc.1.max(*v));
    let (minx, maxx) = tx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), fold);
    let (miny, maxy) = ty.iter().fold((f64::INFINITY, f64::NEG_INFINITY), fold);
    Ok([minx, miny, maxx, maxy])
}
