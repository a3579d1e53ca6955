//! Colormap implementations for overlay rendering.
//!
//! Matplotlib-style colormaps for visualizing elevation-change data,
//! backed by `colorgrad` gradients sampled into lookup tables.

pub mod colormap;

pub use colormap::{get_colormap, Colormap, COLORMAP_NAMES};
