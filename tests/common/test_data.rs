//! Synthetic grid sources and a scripted map surface for session tests.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{Array2, Array3};
use parking_lot::Mutex;
use tokio::sync::watch;

use icemap::dataset::{InMemorySource, VariableKind, VariableMeta};
use icemap::error::Result;
use icemap::raster::GridTransform;
use icemap::render::Colorbar;
use icemap::surface::{LayerStatus, MapSurface, RenderedLayer};
use icemap::viewport::{GeographicBounds, PixelBounds, Viewport};

/// Viewport the fake surface shows: a 256x256 pixel window at zoom 4
/// (1024 m/px) in EPSG:3413, projected box x [-2097152, -1835008],
/// y [1835008, 2097152].
pub const TEST_CRS: &str = "EPSG:3413";
pub const TEST_ZOOM: u8 = 4;

pub fn test_pixel_bounds() -> PixelBounds {
    PixelBounds {
        left: 2048.0,
        top: 2048.0,
        right: 2304.0,
        bottom: 2304.0,
    }
}

/// A source whose grid exactly covers the fake surface's projected box:
/// 64x64 cells at 4096 m, so the clip path is taken at zoom 4.
///
/// Variables:
/// - "delta_h": (3, 64, 64) time series, epoch t cell (r, c) holds
///   `t*10000 + r*64 + c`, so epochs have disjoint value ranges
/// - "ice_mask": static 64x64 grid of ones
pub fn test_source() -> InMemorySource {
    let transform = GridTransform::from_origin(-2_097_152.0, 2_097_152.0, 4096.0, 4096.0);
    let mut source = InMemorySource::new(transform, Some(TEST_CRS.to_string()));

    let stack = Array3::from_shape_fn((3, 64, 64), |(t, r, c)| (t * 10_000 + r * 64 + c) as f32);
    source.add_stack(
        "delta_h",
        VariableMeta {
            kind: VariableKind::TimeSeries,
            units: "meters".to_string(),
            long_name: "height change".to_string(),
            grid_mapping_crs: Some(TEST_CRS.to_string()),
        },
        stack,
    );

    source.add_grid(
        "ice_mask",
        VariableMeta {
            kind: VariableKind::Static,
            units: "1".to_string(),
            long_name: "ice mask".to_string(),
            grid_mapping_crs: None,
        },
        Array2::from_elem((64, 64), 1.0),
    );

    source
}

/// A scripted surface that records everything the session does to it.
pub struct FakeSurface {
    zoom: Mutex<u8>,
    pixel_bounds: Mutex<PixelBounds>,
    bounds_tx: watch::Sender<GeographicBounds>,
    pub overlays: Mutex<HashMap<String, RenderedLayer>>,
    pub overlay_installs: Mutex<Vec<String>>,
    pub url_swaps: Mutex<Vec<String>>,
    pub colorbar: Mutex<Option<Colorbar>>,
    pub popups: Mutex<Vec<(f64, f64, String)>>,
    pub cursor_labels: Mutex<Vec<String>>,
}

impl FakeSurface {
    /// Surface that starts already settled: its reported bounds match the
    /// bounds computed from its zoom and pixel window.
    pub fn settled() -> Arc<Self> {
        let pixel_bounds = test_pixel_bounds();
        let viewport =
            Viewport::compute(TEST_CRS, TEST_ZOOM as usize, pixel_bounds).expect("test viewport");
        let (bounds_tx, _) = watch::channel(viewport.geographic);
        Arc::new(Self {
            zoom: Mutex::new(TEST_ZOOM),
            pixel_bounds: Mutex::new(pixel_bounds),
            bounds_tx,
            overlays: Mutex::new(HashMap::new()),
            overlay_installs: Mutex::new(Vec::new()),
            url_swaps: Mutex::new(Vec::new()),
            colorbar: Mutex::new(None),
            popups: Mutex::new(Vec::new()),
            cursor_labels: Mutex::new(Vec::new()),
        })
    }

    /// Move the viewport and report the matching bounds, as a widget does
    /// once a pan or zoom completes.
    pub fn move_to(&self, zoom: u8, pixel_bounds: PixelBounds) {
        *self.zoom.lock() = zoom;
        *self.pixel_bounds.lock() = pixel_bounds;
        let viewport =
            Viewport::compute(TEST_CRS, zoom as usize, pixel_bounds).expect("test viewport");
        self.bounds_tx.send_replace(viewport.geographic);
    }

    /// Report bounds that do not match the current pixel window, as a
    /// widget does mid-pan.
    pub fn report_stale_bounds(&self, bounds: GeographicBounds) {
        self.bounds_tx.send_replace(bounds);
    }

    pub fn overlay_url(&self, name: &str) -> Option<String> {
        self.overlays.lock().get(name).map(|l| l.url.clone())
    }

    /// Total overlay publications: fresh installs plus in-place image swaps.
    pub fn publish_count(&self) -> usize {
        self.overlay_installs.lock().len() + self.url_swaps.lock().len()
    }
}

impl MapSurface for FakeSurface {
    fn crs_name(&self) -> String {
        TEST_CRS.to_string()
    }

    fn zoom(&self) -> u8 {
        *self.zoom.lock()
    }

    fn pixel_bounds(&self) -> PixelBounds {
        *self.pixel_bounds.lock()
    }

    fn reported_bounds(&self) -> watch::Receiver<GeographicBounds> {
        self.bounds_tx.subscribe()
    }

    fn ensure_overlay(&self, layer: &RenderedLayer) -> Result<LayerStatus> {
        self.overlay_installs.lock().push(layer.name.clone());
        let previous = self
            .overlays
            .lock()
            .insert(layer.name.clone(), layer.clone());
        Ok(match previous {
            Some(p) if p == *layer => LayerStatus::AlreadyPresent,
            _ => LayerStatus::Installed,
        })
    }

    fn ensure_overlay_absent(&self, name: &str) -> Result<LayerStatus> {
        Ok(match self.overlays.lock().remove(name) {
            Some(_) => LayerStatus::Removed,
            None => LayerStatus::AlreadyAbsent,
        })
    }

    fn set_overlay_url(&self, name: &str, url: &str, extent: [f64; 4]) -> Result<()> {
        self.url_swaps.lock().push(name.to_string());
        if let Some(layer) = self.overlays.lock().get_mut(name) {
            layer.url = url.to_string();
            layer.extent = extent;
        }
        Ok(())
    }

    fn ensure_colorbar(&self, colorbar: &Colorbar) -> Result<LayerStatus> {
        let previous = self.colorbar.lock().replace(colorbar.clone());
        Ok(match previous {
            Some(p) if p == *colorbar => LayerStatus::AlreadyPresent,
            _ => LayerStatus::Installed,
        })
    }

    fn ensure_colorbar_absent(&self) -> Result<LayerStatus> {
        Ok(match self.colorbar.lock().take() {
            Some(_) => LayerStatus::Removed,
            None => LayerStatus::AlreadyAbsent,
        })
    }

    fn show_popup(&self, lat: f64, lon: f64, text: &str) -> Result<()> {
        self.popups.lock().push((lat, lon, text.to_string()));
        Ok(())
    }

    fn set_cursor_label(&self, text: &str) -> Result<()> {
        self.cursor_labels.lock().push(text.to_string());
        Ok(())
    }
}
