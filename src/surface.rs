//! The boundary between the session and whatever draws the map.
//!
//! A [`MapSurface`] is the embedding widget, web view, or test double the
//! session controls. The surface owns the slippy-map state (zoom, pixel
//! window) and reports the bounds it is actually showing through a watch
//! channel; the session pushes rendered artifacts back through the
//! `ensure_*` calls.

use tokio::sync::watch;

use crate::error::Result;
use crate::render::Colorbar;
use crate::viewport::{GeographicBounds, PixelBounds};

/// Outcome of an idempotent add or remove.
///
/// Both outcomes of each pair are successes; callers that care whether the
/// call changed anything inspect the status instead of catching errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerStatus {
    Installed,
    AlreadyPresent,
    Removed,
    AlreadyAbsent,
}

impl LayerStatus {
    /// Whether the call changed the surface.
    pub fn changed(&self) -> bool {
        matches!(self, LayerStatus::Installed | LayerStatus::Removed)
    }
}

/// A rendered overlay ready to install on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLayer {
    /// Layer name; one layer per variable
    pub name: String,
    /// Self-contained PNG data URL
    pub url: String,
    /// Projected extent the image covers, [minx, miny, maxx, maxy]
    pub extent: [f64; 4],
    pub opacity: f64,
    /// Colormap the image was generated with
    pub colormap: String,
    /// Normalization bounds the image was generated with
    pub vmin: f64,
    pub vmax: f64,
}

/// Surface contract the session drives.
pub trait MapSurface: Send + Sync {
    /// CRS the surface's map is projected in, e.g. "EPSG:3413".
    fn crs_name(&self) -> String;

    /// Current discrete zoom level.
    fn zoom(&self) -> u8;

    /// Current pixel window in world pixel coordinates.
    fn pixel_bounds(&self) -> PixelBounds;

    /// Stream of geographic bounds the surface reports as the user pans
    /// and zooms. The session never trusts a single report; it waits for
    /// agreement between its own computation and this stream.
    fn reported_bounds(&self) -> watch::Receiver<GeographicBounds>;

    /// Install or refresh an overlay. Installing a layer that is already
    /// present with the same content is a no-op.
    fn ensure_overlay(&self, layer: &RenderedLayer) -> Result<LayerStatus>;

    /// Remove an overlay if present.
    fn ensure_overlay_absent(&self, name: &str) -> Result<LayerStatus>;

    /// Swap the image of an installed overlay without reinstalling it.
    fn set_overlay_url(&self, name: &str, url: &str, extent: [f64; 4]) -> Result<()>;

    /// Install or refresh the colorbar.
    fn ensure_colorbar(&self, colorbar: &Colorbar) -> Result<LayerStatus>;

    /// Remove the colorbar if present.
    fn ensure_colorbar_absent(&self) -> Result<LayerStatus>;

    /// Show a popup at a geographic position.
    fn show_popup(&self, lat: f64, lon: f64, text: &str) -> Result<()>;

    /// Update the cursor-position readout.
    fn set_cursor_label(&self, text: &str) -> Result<()>;
}
