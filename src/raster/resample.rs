//! Aligning source rasters to a viewport request.
//!
//! The decision rule: when the source grid is coarser than the viewport's
//! ground resolution, the source pixels are kept exactly and only padded or
//! clipped to the requested box; when the source is finer or equal, the
//! window is warped onto a regular grid at the viewport resolution.

use ndarray::Array2;
use tracing::debug;

use crate::error::Result;
use crate::projection;
use crate::raster::{AlignedRaster, GridTransform, SourceRaster};

/// Sampling method used by the warp path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampling {
    /// Nearest grid point; preserves original data values
    #[default]
    Nearest,
    /// Distance-weighted average of the four surrounding points,
    /// skipping nodata neighbors
    Bilinear,
}

impl Resampling {
    /// Sample a grid at a fractional (row, col) index. Returns NaN outside
    /// the grid.
    fn sample(&self, data: &Array2<f32>, row: f64, col: f64) -> f32 {
        let (nrows, ncols) = data.dim();
        if nrows == 0 || ncols == 0 {
            return f32::NAN;
        }
        match self {
            Resampling::Nearest => {
                let r = row.floor();
                let c = col.floor();
                if r < 0.0 || c < 0.0 || r >= nrows as f64 || c >= ncols as f64 {
                    return f32::NAN;
                }
                data[[r as usize, c as usize]]
            }
            Resampling::Bilinear => {
                let r = row - 0.5;
                let c = col - 0.5;
                let r0 = r.floor();
                let c0 = c.floor();
                let fr = r - r0;
                let fc = c - c0;
                let mut num = 0.0f64;
                let mut den = 0.0f64;
                for (dr, wr) in [(0.0, 1.0 - fr), (1.0, fr)] {
                    for (dc, wc) in [(0.0, 1.0 - fc), (1.0, fc)] {
                        let rr = r0 + dr;
                        let cc = c0 + dc;
                        if rr < 0.0 || cc < 0.0 || rr >= nrows as f64 || cc >= ncols as f64 {
                            continue;
                        }
                        let v = data[[rr as usize, cc as usize]];
                        if v.is_finite() {
                            let w = wr * wc;
                            num += v as f64 * w;
                            den += w;
                        }
                    }
                }
                if den > 0.0 {
                    (num / den) as f32
                } else {
                    f32::NAN
                }
            }
        }
    }
}

/// Align a source raster to a viewport bounding box.
///
/// `bbox` is the viewport's projected bounding box `[minx, miny, maxx, maxy]`
/// in `map_crs`; `target_resolution` is the ground resolution of the current
/// zoom level. A box entirely outside the source yields a degenerate raster
/// rather than an error; callers check [`AlignedRaster::is_blank`].
pub fn align(
    source: &SourceRaster,
    map_crs: &str,
    bbox: [f64; 4],
    target_resolution: f64,
    resampling: Resampling,
) -> Result<AlignedRaster> {
    // viewport box in the source raster's CRS; matching CRSs skip the
    // transform so grid-line snapping stays exact
    let [minx, miny, maxx, maxy] = if projection::same_crs(map_crs, &source.crs)? {
        bbox
    } else {
        projection::transform_bounds(map_crs, &source.crs, bbox[0], bbox[1], bbox[2], bbox[3])?
    };

    let source_resolution = source.resolution();
    if source_resolution > target_resolution {
        debug!(
            source_resolution,
            target_resolution, "Source coarser than viewport, padding/clipping"
        );
        Ok(pad_clip(source, minx, miny, maxx, maxy))
    } else {
        debug!(
            source_resolution,
            target_resolution, "Source finer than viewport, warping"
        );
        Ok(warp(source, minx, miny, maxx, maxy, target_resolution, resampling))
    }
}

/// Pad or clip the source to the box on its own grid.
///
/// The box is snapped outward to source grid lines; pixels outside the
/// source are NaN, pixels inside keep their values exactly.
fn pad_clip(source: &SourceRaster, minx: f64, miny: f64, maxx: f64, maxy: f64) -> AlignedRaster {
    let t = source.transform;
    let (nrows, ncols) = source.data.dim();

    // integer pixel-index window derived from the affine transform
    let col_start = ((minx - t.c) / t.a).floor() as i64;
    let col_end = ((maxx - t.c) / t.a).floor() as i64 + 1;
    let row_start = ((maxy - t.f) / t.e).floor() as i64;
    let row_end = ((miny - t.f) / t.e).floor() as i64 + 1;

    let out_rows = (row_end - row_start).max(0) as usize;
    let out_cols = (col_end - col_start).max(0) as usize;

    let mut data = Array2::from_elem((out_rows, out_cols), f32::NAN);
    for out_r in 0..out_rows {
        let src_r = row_start + out_r as i64;
        if src_r < 0 || src_r >= nrows as i64 {
            continue;
        }
        for out_c in 0..out_cols {
            let src_c = col_start + out_c as i64;
            if src_c < 0 || src_c >= ncols as i64 {
                continue;
            }
            data[[out_r, out_c]] = source.data[[src_r as usize, src_c as usize]];
        }
    }

    let (west, north) = t.corner(row_start as f64, col_start as f64);
    let (east, south) = t.corner(row_end as f64, col_end as f64);
    AlignedRaster {
        data,
        transform: GridTransform {
            c: west,
            f: north,
            ..t
        },
        extent: [west, south, east, north],
    }
}

/// Warp the source onto a regular grid at the target resolution covering
/// the box.
fn warp(
    source: &SourceRaster,
    minx: f64,
    miny: f64,
    maxx: f64,
    maxy: f64,
    resolution: f64,
    resampling: Resampling,
) -> AlignedRaster {
    let out_cols = (((maxx - minx) / resolution).floor()).max(0.0) as usize;
    let out_rows = (((maxy - miny) / resolution).floor()).max(0.0) as usize;
    let transform = GridTransform::from_origin(minx, maxy, resolution, resolution);

    let mut data = Array2::from_elem((out_rows, out_cols), f32::NAN);
    for row in 0..out_rows {
        for col in 0..out_cols {
            let (x, y) = transform.center(row, col);
            let (src_row, src_col) = source.transform.rowcol(x, y);
            data[[row, col]] = resampling.sample(&source.data, src_row, src_col);
        }
    }

    let extent = [
        minx,
        maxy - out_rows as f64 * resolution,
        minx + out_cols as f64 * resolution,
        maxy,
    ];
    AlignedRaster {
        data,
        transform,
        extent,
    }
}
