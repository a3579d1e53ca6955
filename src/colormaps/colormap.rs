//! Colormap trait and the named-gradient registry.

use crate::error::{IcemapError, Result};

/// Colormaps available to overlay and colorbar rendering
pub const COLORMAP_NAMES: &[&str] = &[
    "viridis", "plasma", "inferno", "magma", "cividis", "turbo", "spectral", "rdbu", "rdylbu",
];

/// Trait for color mapping implementations
pub trait Colormap: Send + Sync {
    /// Map a normalized value (0.0 to 1.0) to an RGBA color
    fn map_normalized(&self, value: f32) -> [u8; 4];

    /// Map a value to an RGBA color given the data range
    fn map(&self, value: f32, min: f32, max: f32) -> [u8; 4] {
        let normalized = if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        self.map_normalized(normalized)
    }

    /// Get the name of this colormap
    fn name(&self) -> &str;

    /// Whether the gradient is applied end-to-start
    fn is_reversed(&self) -> bool;
}

/// A colormap backed by a sampled gradient lookup table.
///
/// Sampling at construction keeps lookups allocation-free and the table
/// trivially shareable across render tasks.
struct GradientColormap {
    name: String,
    reversed: bool,
    table: Vec<[u8; 4]>,
}

const TABLE_SIZE: usize = 256;

impl Colormap for GradientColormap {
    fn map_normalized(&self, value: f32) -> [u8; 4] {
        let t = value.clamp(0.0, 1.0);
        let t = if self.reversed { 1.0 - t } else { t };
        let idx = (t * (TABLE_SIZE - 1) as f32).round() as usize;
        self.table[idx.min(TABLE_SIZE - 1)]
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_reversed(&self) -> bool {
        self.reversed
    }
}

/// Get a colormap by name, optionally reversed.
pub fn get_colormap(name: &str, reversed: bool) -> Result<Box<dyn Colormap>> {
    let gradient = match name.to_lowercase().as_str() {
        "viridis" => colorgrad::viridis(),
        "plasma" => colorgrad::plasma(),
        "inferno" => colorgrad::inferno(),
        "magma" => colorgrad::magma(),
        "cividis" => colorgrad::cividis(),
        "turbo" => colorgrad::turbo(),
        "spectral" => colorgrad::spectral(),
        "rdbu" => colorgrad::rd_bu(),
        "rdylbu" => colorgrad::rd_yl_bu(),
        _ => {
            return Err(IcemapError::InvalidParameter {
                param: "colormap".to_string(),
                message: format!("Unknown colormap: {}", name),
            })
        }
    };

    let table = (0..TABLE_SIZE)
        .map(|i| {
            let t = i as f64 / (TABLE_SIZE - 1) as f64;
            gradient.at(t).to_rgba8()
        })
        .collect();

    Ok(Box::new(GradientColormap {
        name: name.to_lowercase(),
        reversed,
        table,
    }))
}
