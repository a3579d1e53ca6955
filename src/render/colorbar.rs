//! Colorbar ramp generation.
//!
//! Emits a gradient ramp image plus the metadata a widget layer needs to
//! draw labels and tick marks; text layout is left to the presentation
//! side.

use image::{ImageBuffer, Rgba, RgbaImage};

use crate::colormaps::Colormap;
use crate::error::Result;
use crate::render::encode::image_to_data_url;
use crate::render::Normalization;

/// Ramp direction on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// vmin at the bottom, vmax at the top
    #[default]
    Vertical,
    /// vmin at the left, vmax at the right
    Horizontal,
}

/// Length of the ramp along its gradient axis, in pixels
const RAMP_LENGTH: u32 = 256;
/// Thickness of the ramp across its gradient axis, in pixels
const RAMP_WIDTH: u32 = 20;

/// A rendered colorbar ready to hand to the map surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Colorbar {
    /// Data-URL PNG of the gradient ramp
    pub url: String,
    pub label: String,
    pub orientation: Orientation,
    pub vmin: f64,
    pub vmax: f64,
    pub colormap: String,
}

impl Colorbar {
    /// Render a ramp for the given colormap and normalization.
    pub fn build(
        colormap: &dyn Colormap,
        norm: &Normalization,
        label: impl Into<String>,
        orientation: Orientation,
    ) -> Result<Self> {
        let image = ramp_image(colormap, orientation);
        Ok(Self {
            url: image_to_data_url(&image)?,
            label: label.into(),
            orientation,
            vmin: norm.vmin,
            vmax: norm.vmax,
            colormap: colormap.name().to_string(),
        })
    }
}

fn ramp_image(colormap: &dyn Colormap, orientation: Orientation) -> RgbaImage {
    let (width, height) = match orientation {
        Orientation::Vertical => (RAMP_WIDTH, RAMP_LENGTH),
        Orientation::Horizontal => (RAMP_LENGTH, RAMP_WIDTH),
    };
    ImageBuffer::from_fn(width, height, |x, y| {
        let t = match orientation {
            // row 0 is the top of the image, which carries vmax
            Orientation::Vertical => 1.0 - y as f32 / (RAMP_LENGTH - 1) as f32,
            Orientation::Horizontal => x as f32 / (RAMP_LENGTH - 1) as f32,
        };
        Rgba(colormap.map_normalized(t))
    })
}
