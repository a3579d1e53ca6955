//! Raster containers and grid geometry.
//!
//! A source raster is a 2D array of f32 values tied to a CRS through an
//! affine grid transform; NaN is the nodata value throughout.

pub mod resample;

use ndarray::Array2;

pub use resample::{align, Resampling};

/// Affine transform mapping pixel indices to projected coordinates.
///
/// Uses the GDAL/rasterio coefficient order:
/// `x = c + col*a + row*b`, `y = f + col*d + row*e`, with `e` negative for
/// north-up rasters. Shear terms (`b`, `d`) are carried but all product
/// grids are axis-aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GridTransform {
    /// North-up transform from the upper-left corner and cell sizes.
    pub fn from_origin(west: f64, north: f64, xres: f64, yres: f64) -> Self {
        Self {
            a: xres,
            b: 0.0,
            c: west,
            d: 0.0,
            e: -yres,
            f: north,
        }
    }

    /// Projected coordinates of a pixel's upper-left corner.
    pub fn corner(&self, row: f64, col: f64) -> (f64, f64) {
        (
            self.c + col * self.a + row * self.b,
            self.f + col * self.d + row * self.e,
        )
    }

    /// Projected coordinates of a pixel center.
    pub fn center(&self, row: usize, col: usize) -> (f64, f64) {
        self.corner(row as f64 + 0.5, col as f64 + 0.5)
    }

    /// Fractional (row, col) of a projected coordinate.
    ///
    /// Only valid for axis-aligned transforms, which is all the gridded
    /// products use.
    pub fn rowcol(&self, x: f64, y: f64) -> (f64, f64) {
        ((y - self.f) / self.e, (x - self.c) / self.a)
    }

    /// Ground resolution in the x direction (always positive).
    pub fn resolution(&self) -> f64 {
        self.a.abs()
    }
}

/// A 2D data window tied to a CRS by its grid transform.
#[derive(Debug, Clone)]
pub struct SourceRaster {
    pub data: Array2<f32>,
    pub transform: GridTransform,
    /// CRS identifier ("EPSG:xxxx" or WKT with an EPSG authority code)
    pub crs: String,
}

impl SourceRaster {
    pub fn new(data: Array2<f32>, transform: GridTransform, crs: impl Into<String>) -> Self {
        Self {
            data,
            transform,
            crs: crs.into(),
        }
    }

    /// Ground resolution of the source grid.
    pub fn resolution(&self) -> f64 {
        self.transform.resolution()
    }
}

/// A raster aligned to a viewport request, plus the projected extent it
/// actually covers (which may differ from the request due to pixel-grid
/// snapping).
#[derive(Debug, Clone)]
pub struct AlignedRaster {
    pub data: Array2<f32>,
    pub transform: GridTransform,
    /// Covered extent as [minx, miny, maxx, maxy]
    pub extent: [f64; 4],
}

impl AlignedRaster {
    /// Degenerate or fully-nodata output; callers skip rendering these.
    pub fn is_blank(&self) -> bool {
        self.data.is_empty() || self.data.iter().all(|v| !v.is_finite())
    }
}
