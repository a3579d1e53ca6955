//! Rendering aligned rasters into overlay images.
//!
//! Values pass through a clipped linear normalization, a colormap lookup,
//! and a rasterization step that draws only the data region with a
//! transparent background where nodata.

pub mod colorbar;
pub mod encode;

use image::{ImageBuffer, Rgba, RgbaImage};
use ndarray::ArrayView2;

pub use colorbar::{Colorbar, Orientation};
pub use encode::{encode_png, image_to_data_url, to_data_url, DATA_URL_PREFIX};

use crate::colormaps::Colormap;

/// Sentinel bounds that mean "not set"; they trigger dynamic recomputation
/// like the original product viewer's float extremes.
const UNSET_MIN: f64 = f64::MIN;
const UNSET_MAX: f64 = f64::MAX;

/// Fallback normalization range when bounds cannot be derived from data
const FALLBACK_RANGE: (f64, f64) = (-5.0, 5.0);

/// Normalization state for colormap lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub vmin: f64,
    pub vmax: f64,
    /// Recompute bounds from data percentiles before every render
    pub dynamic: bool,
}

impl Normalization {
    /// Build from optional user bounds and the current selection.
    ///
    /// Missing (or sentinel) bounds switch on dynamic mode and take the
    /// 2nd/98th percentile of the data.
    pub fn from_bounds(vmin: Option<f64>, vmax: Option<f64>, data: ArrayView2<f32>) -> Self {
        let clim = percentile_bounds(data);
        let mut dynamic = false;

        let vmin = match vmin {
            Some(v) if v != UNSET_MIN => v,
            _ => {
                dynamic = true;
                clim.map(|c| c.0).unwrap_or(UNSET_MIN)
            }
        };
        let vmax = match vmax {
            Some(v) if v != UNSET_MAX => v,
            _ => {
                dynamic = true;
                clim.map(|c| c.1).unwrap_or(UNSET_MAX)
            }
        };

        let mut norm = Self {
            vmin,
            vmax,
            dynamic,
        };
        norm.validate();
        norm
    }

    /// Recompute percentile bounds from a new selection if dynamic.
    pub fn refresh(&mut self, data: ArrayView2<f32>) {
        if !self.dynamic {
            return;
        }
        if let Some((lo, hi)) = percentile_bounds(data) {
            self.vmin = lo;
            self.vmax = hi;
        }
        self.validate();
    }

    /// Replace sentinel bounds with the fallback range and drop out of
    /// dynamic mode, as the original viewer does.
    pub fn validate(&mut self) {
        if self.vmin == UNSET_MIN {
            self.vmin = FALLBACK_RANGE.0;
            self.dynamic = false;
        }
        if self.vmax == UNSET_MAX {
            self.vmax = FALLBACK_RANGE.1;
            self.dynamic = false;
        }
    }

    /// Set explicit user bounds; disables dynamic mode.
    pub fn set_range(&mut self, vmin: f64, vmax: f64) {
        self.vmin = vmin;
        self.vmax = vmax;
        self.dynamic = false;
        self.validate();
    }

    /// Clipped linear scaling of a raw value into [0, 1].
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.vmax - self.vmin;
        if span <= 0.0 {
            return 0.5;
        }
        (((value as f64 - self.vmin) / span) as f32).clamp(0.0, 1.0)
    }
}

/// 2nd/98th percentile of the finite values, or None if there are none.
pub fn percentile_bounds(data: ArrayView2<f32>) -> Option<(f64, f64)> {
    let mut finite: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let quantile = |q: f64| -> f64 {
        let idx = (q * (finite.len() - 1) as f64).round() as usize;
        finite[idx.min(finite.len() - 1)] as f64
    };
    Some((quantile(0.02), quantile(0.98)))
}

/// Rasterize an aligned data window to an RGBA image.
///
/// One pixel per grid cell; no axes, labels, or margins. Nodata cells are
/// fully transparent, everything else gets the colormap color with the
/// layer opacity applied.
pub fn render_image(
    data: ArrayView2<f32>,
    colormap: &dyn Colormap,
    norm: &Normalization,
    opacity: f64,
) -> RgbaImage {
    let (rows, cols) = data.dim();
    let alpha_scale = opacity.clamp(0.0, 1.0);
    let mut img: RgbaImage = ImageBuffer::new(cols as u32, rows as u32);
    for ((r, c), &value) in data.indexed_iter() {
        let pixel = if value.is_finite() {
            let mut rgba = colormap.map_normalized(norm.normalize(value));
            rgba[3] = (rgba[3] as f64 * alpha_scale).round() as u8;
            rgba
        } else {
            [0, 0, 0, 0]
        };
        img.put_pixel(c as u32, r as u32, Rgba(pixel));
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormaps::get_colormap;
    use ndarray::Array2;

    #[test]
    fn test_normalize_is_clipped_linear() {
        let norm = Normalization {
            vmin: 0.0,
            vmax: 10.0,
            dynamic: false,
        };
        assert_eq!(norm.normalize(-5.0), 0.0);
        assert_eq!(norm.normalize(5.0), 0.5);
        assert_eq!(norm.normalize(25.0), 1.0);
    }

    #[test]
    fn test_dynamic_bounds_from_percentiles() {
        // 0..=100 so the 2nd/98th percentiles are easy to read off
        let data = Array2::from_shape_fn((1, 101), |(_, c)| c as f32);
        let norm = Normalization::from_bounds(None, None, data.view());
        assert!(norm.dynamic);
        assert_eq!(norm.vmin, 2.0);
        assert_eq!(norm.vmax, 98.0);
    }

    #[test]
    fn test_explicit_bounds_are_static() {
        let data = Array2::from_shape_fn((1, 101), |(_, c)| c as f32);
        let norm = Normalization::from_bounds(Some(-3.0), Some(3.0), data.view());
        assert!(!norm.dynamic);
        assert_eq!((norm.vmin, norm.vmax), (-3.0, 3.0));
    }

    #[test]
    fn test_refresh_only_when_dynamic() {
        let first = Array2::from_shape_fn((1, 101), |(_, c)| c as f32);
        let second = Array2::from_shape_fn((1, 101), |(_, c)| c as f32 * 10.0);

        let mut dynamic = Normalization::from_bounds(None, None, first.view());
        dynamic.refresh(second.view());
        assert_eq!(dynamic.vmax, 980.0);

        let mut fixed = Normalization::from_bounds(Some(0.0), Some(1.0), first.view());
        fixed.refresh(second.view());
        assert_eq!((fixed.vmin, fixed.vmax), (0.0, 1.0));
    }

    #[test]
    fn test_sentinel_bounds_fall_back() {
        let empty = Array2::from_elem((2, 2), f32::NAN);
        let norm = Normalization::from_bounds(None, None, empty.view());
        assert_eq!((norm.vmin, norm.vmax), FALLBACK_RANGE);
        assert!(!norm.dynamic);
    }

    #[test]
    fn test_render_image_transparent_nodata() {
        let mut data = Array2::from_elem((2, 3), 1.0f32);
        data[[0, 1]] = f32::NAN;
        let cmap = get_colormap("viridis", false).unwrap();
        let norm = Normalization {
            vmin: 0.0,
            vmax: 2.0,
            dynamic: false,
        };
        let img = render_image(data.view(), cmap.as_ref(), &norm, 1.0);
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 0).0[3], 0);
        assert_eq!(img.get_pixel(0, 0).0[3], 255);
    }

    #[test]
    fn test_render_image_applies_opacity() {
        let data = Array2::from_elem((1, 1), 1.0f32);
        let cmap = get_colormap("viridis", false).unwrap();
        let norm = Normalization {
            vmin: 0.0,
            vmax: 2.0,
            dynamic: false,
        };
        let img = render_image(data.view(), cmap.as_ref(), &norm, 0.5);
        assert_eq!(img.get_pixel(0, 0).0[3], 128);
    }
}
