//! The update orchestrator driving a map surface.
//!
//! A [`MapSession`] owns the mutable visualization state (selected
//! variable, time slice, colormap, normalization) and runs a single async
//! loop that reacts to control events and viewport movement. All rendering
//! happens inline in that loop, so at most one render cycle is ever in
//! flight, and queued control events are folded together before the next
//! cycle so only the final state is rendered.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::colormaps::get_colormap;
use crate::dataset::{GridSource, RasterSelection, TimeSlice, VariableKind};
use crate::error::{IcemapError, Result};
use crate::geometry::{cursor_label, Feature, GeometrySet};
use crate::logging::{generate_render_id, log_error, log_render_stats};
use crate::raster::{align, Resampling};
use crate::render::{image_to_data_url, render_image, Colorbar, Normalization, Orientation};
use crate::surface::{MapSurface, RenderedLayer};
use crate::viewport::{bounds_close, GeographicBounds, Viewport};

/// Agreement tolerance, in degrees, between the session's computed bounds
/// and the bounds the surface reports
const SETTLE_TOLERANCE: f64 = 1e-6;

/// Control events sent to a running session.
#[derive(Debug, Clone)]
pub enum ControlEvent {
    /// Select the variable to display
    SetVariable(String),
    /// Select the time lag or band of the current variable
    SetTimeSlice(TimeSlice),
    SetColormap(String),
    SetReversed(bool),
    /// Fix the normalization range
    SetRange { vmin: f64, vmax: f64 },
    /// Recompute normalization bounds from the data on every render
    SetDynamicRange(bool),
    SetOpacity(f64),
    SetResampling(Resampling),
    /// Pointer click; shows a value popup if the click hits valid data
    Click { lat: f64, lon: f64 },
    /// Pointer movement; updates the cursor readout
    CursorMoved { lat: f64, lon: f64 },
    AddFeature(Feature),
    RemoveFeature(usize),
    /// Write the drawn features to a GeoJSON file
    ExportFeatures(PathBuf),
    /// Remove all session artifacts from the surface
    Reset,
    Shutdown,
}

/// Where the session loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    AwaitingViewportStable,
    Rendering,
}

/// Counters reported when a session shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Render cycles that produced an overlay
    pub renders: u64,
    /// Render cycles skipped without a visual change
    pub render_skips: u64,
}

/// Mutable display state folded from control events.
#[derive(Debug, Clone)]
struct DisplayState {
    variable: Option<String>,
    slice: TimeSlice,
    colormap: String,
    reversed: bool,
    opacity: f64,
    resampling: Resampling,
    vmin: Option<f64>,
    vmax: Option<f64>,
}

enum Action {
    None,
    Render,
    Shutdown,
}

/// The session loop driving one map surface from one grid source.
pub struct MapSession {
    surface: Arc<dyn MapSurface>,
    source: Arc<dyn GridSource>,
    config: Config,
    events: mpsc::Receiver<ControlEvent>,
    state: DisplayState,
    /// Most recent successful selection; kept across failed updates so a
    /// bad time index degrades to no visual change
    selection: Option<RasterSelection>,
    norm: Option<Normalization>,
    /// Overlay name currently installed on the surface
    installed_layer: Option<String>,
    geometries: GeometrySet,
    phase: RenderPhase,
    stats: SessionStats,
}

impl MapSession {
    /// Create a session and the sender used to control it.
    pub fn new(
        surface: Arc<dyn MapSurface>,
        source: Arc<dyn GridSource>,
        config: Config,
    ) -> (Self, mpsc::Sender<ControlEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let state = DisplayState {
            variable: None,
            slice: TimeSlice::Lag(0),
            colormap: config.render.colormap.clone(),
            reversed: config.render.reversed,
            opacity: config.render.opacity,
            resampling: Resampling::default(),
            vmin: config.render.vmin,
            vmax: config.render.vmax,
        };
        let session = Self {
            surface,
            source,
            config,
            events: rx,
            state,
            selection: None,
            norm: None,
            installed_layer: None,
            geometries: GeometrySet::new(),
            phase: RenderPhase::Idle,
            stats: SessionStats::default(),
        };
        (session, tx)
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Run until shutdown, reacting to control events and viewport
    /// movement. Returns the session counters.
    pub async fn run(mut self) -> Result<SessionStats> {
        let mut bounds_rx = self.surface.reported_bounds();
        info!(
            crs = %self.surface.crs_name(),
            variables = self.source.variable_names().len(),
            "Session started"
        );

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(first) = event else { break };
                    let (render, shutdown) = self.fold_events(first);
                    if render {
                        self.render_cycle("control", &mut bounds_rx).await;
                    }
                    if shutdown {
                        break;
                    }
                }
                changed = bounds_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if self.state.variable.is_some() {
                        self.render_cycle("viewport", &mut bounds_rx).await;
                    }
                }
            }
        }

        info!(
            renders = self.stats.renders,
            render_skips = self.stats.render_skips,
            "Session stopped"
        );
        Ok(self.stats)
    }

    /// Apply the first event and every event already queued behind it, so
    /// a burst of slider changes renders once with the final state.
    ///
    /// Returns (render, shutdown); a shutdown queued behind state changes
    /// still flushes one final render before the loop exits.
    fn fold_events(&mut self, first: ControlEvent) -> (bool, bool) {
        let mut render = false;
        let mut event = first;
        loop {
            match self.apply_event(event) {
                Action::Render => render = true,
                Action::Shutdown => return (render, true),
                Action::None => {}
            }
            match self.events.try_recv() {
                Ok(next) => event = next,
                Err(_) => return (render, false),
            }
        }
    }

    fn apply_event(&mut self, event: ControlEvent) -> Action {
        match event {
            ControlEvent::SetVariable(name) => {
                if self.state.variable.as_deref() == Some(name.as_str()) {
                    return Action::None;
                }
                let meta = match self.source.variable(&name) {
                    Ok(meta) => meta,
                    Err(e) => {
                        log_error(&e, "set variable");
                        return Action::None;
                    }
                };
                debug!(variable = %name, kind = ?meta.kind, "Variable selected");
                // the slice axis follows the variable's layout; a lag from a
                // time series means nothing on a static grid
                self.state.slice =
                    coerce_slice(self.state.slice, meta.kind, self.source.time_len());
                self.state.variable = Some(name);
                self.selection = None;
                // dynamic normalization is per-variable; fixed bounds persist
                self.norm = None;
                Action::Render
            }
            ControlEvent::SetTimeSlice(slice) => {
                self.state.slice = slice;
                Action::Render
            }
            ControlEvent::SetColormap(name) => match get_colormap(&name, self.state.reversed) {
                Ok(_) => {
                    self.state.colormap = name;
                    Action::Render
                }
                Err(e) => {
                    log_error(&e, "set colormap");
                    Action::None
                }
            },
            ControlEvent::SetReversed(reversed) => {
                self.state.reversed = reversed;
                Action::Render
            }
            ControlEvent::SetRange { vmin, vmax } => {
                if vmin >= vmax {
                    log_error(
                        &IcemapError::InvalidParameter {
                            param: "range".to_string(),
                            message: format!("vmin {} must be below vmax {}", vmin, vmax),
                        },
                        "set range",
                    );
                    return Action::None;
                }
                self.state.vmin = Some(vmin);
                self.state.vmax = Some(vmax);
                match &mut self.norm {
                    Some(norm) => norm.set_range(vmin, vmax),
                    None => {
                        self.norm = Some(Normalization {
                            vmin,
                            vmax,
                            dynamic: false,
                        })
                    }
                }
                Action::Render
            }
            ControlEvent::SetDynamicRange(dynamic) => {
                if dynamic {
                    self.state.vmin = None;
                    self.state.vmax = None;
                    self.norm = None;
                } else if let Some(norm) = &mut self.norm {
                    // freezing records the bounds so they survive a later
                    // variable switch
                    norm.dynamic = false;
                    self.state.vmin = Some(norm.vmin);
                    self.state.vmax = Some(norm.vmax);
                }
                Action::Render
            }
            ControlEvent::SetOpacity(opacity) => {
                if !(0.0..=1.0).contains(&opacity) {
                    log_error(
                        &IcemapError::InvalidParameter {
                            param: "opacity".to_string(),
                            message: format!("Opacity {} outside [0, 1]", opacity),
                        },
                        "set opacity",
                    );
                    return Action::None;
                }
                self.state.opacity = opacity;
                Action::Render
            }
            ControlEvent::SetResampling(resampling) => {
                self.state.resampling = resampling;
                Action::Render
            }
            ControlEvent::Click { lat, lon } => {
                self.handle_click(lat, lon);
                Action::None
            }
            ControlEvent::CursorMoved { lat, lon } => {
                if let Err(e) = self.surface.set_cursor_label(&cursor_label(lat, lon)) {
                    log_error(&e, "cursor label");
                }
                Action::None
            }
            ControlEvent::AddFeature(feature) => {
                self.geometries.append(feature);
                Action::None
            }
            ControlEvent::RemoveFeature(index) => {
                self.geometries.remove(index);
                Action::None
            }
            ControlEvent::ExportFeatures(path) => {
                if let Err(e) = self.geometries.write_geojson(&path) {
                    log_error(&e, "export features");
                }
                Action::None
            }
            ControlEvent::Reset => {
                self.reset();
                Action::None
            }
            ControlEvent::Shutdown => Action::Shutdown,
        }
    }

    /// Remove every artifact the session installed and return to the
    /// initial state. Idempotent.
    fn reset(&mut self) {
        if let Some(name) = self.installed_layer.take() {
            if let Err(e) = self.surface.ensure_overlay_absent(&name) {
                log_error(&e, "reset overlay");
            }
        }
        if let Err(e) = self.surface.ensure_colorbar_absent() {
            log_error(&e, "reset colorbar");
        }
        self.geometries.clear();
        self.state.variable = None;
        self.selection = None;
        self.norm = None;
        self.phase = RenderPhase::Idle;
        info!("Session reset");
    }

    /// One complete render cycle: wait for the viewport to settle, pull
    /// the selection, align, colorize, and install the overlay.
    ///
    /// Every failure path degrades to "no visual change": the previous
    /// overlay stays up, the skip counter increments, and the cause is
    /// logged at a level matching its severity.
    async fn render_cycle(
        &mut self,
        trigger: &str,
        bounds_rx: &mut watch::Receiver<GeographicBounds>,
    ) {
        let start = Instant::now();
        let render_id = generate_render_id();
        debug!(trigger, render_id = %render_id, "Starting render cycle");

        self.phase = RenderPhase::AwaitingViewportStable;
        let viewport = match self.settled_viewport(bounds_rx).await {
            Ok(viewport) => viewport,
            Err(e) => {
                log_error(&e, "viewport");
                self.skip();
                return;
            }
        };

        self.phase = RenderPhase::Rendering;
        let outcome = self.render_to_surface(&viewport, start);
        match outcome {
            Ok(()) => {
                self.stats.renders += 1;
                info!(
                    trigger,
                    render_id = %render_id,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Render cycle completed"
                );
            }
            Err(e) if e.is_skippable() => {
                debug!(render_id = %render_id, reason = %e, "Render cycle skipped");
                self.skip();
            }
            Err(e) => {
                log_error(&e, "render cycle");
                self.skip();
            }
        }
        self.phase = RenderPhase::Idle;
    }

    fn skip(&mut self) {
        self.stats.render_skips += 1;
        self.phase = RenderPhase::Idle;
    }

    /// Wait until the surface's reported bounds agree with the bounds
    /// computed from its zoom and pixel window, then return that viewport.
    ///
    /// Transitional bounds reported mid-pan never reach the render step.
    /// An optional timeout bounds the wait; on expiry the computed
    /// viewport is used as-is.
    async fn settled_viewport(
        &self,
        bounds_rx: &mut watch::Receiver<GeographicBounds>,
    ) -> Result<Viewport> {
        let crs = self.surface.crs_name();
        let settle = async {
            loop {
                let viewport = Viewport::compute(
                    &crs,
                    self.surface.zoom() as usize,
                    self.surface.pixel_bounds(),
                )?;
                let reported = *bounds_rx.borrow_and_update();
                if bounds_close(&viewport.geographic, &reported, SETTLE_TOLERANCE) {
                    return Ok(viewport);
                }
                debug!("Viewport not settled, waiting for next report");
                if bounds_rx.changed().await.is_err() {
                    // surface dropped its sender; use what we have
                    return Ok(viewport);
                }
            }
        };

        match self.config.map.settle_timeout_ms {
            None => settle.await,
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), settle).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = ms, "Viewport did not settle, rendering anyway");
                    Viewport::compute(
                        &crs,
                        self.surface.zoom() as usize,
                        self.surface.pixel_bounds(),
                    )
                }
            },
        }
    }

    fn render_to_surface(&mut self, viewport: &Viewport, start: Instant) -> Result<()> {
        let Some(variable) = self.state.variable.clone() else {
            return Err(IcemapError::EmptySelection {
                message: "No variable selected".to_string(),
            });
        };

        match self.source.slice(&variable, self.state.slice) {
            Ok(selection) => self.selection = Some(selection),
            Err(e @ IcemapError::InvalidTimeIndex { .. }) => {
                // keep showing the previous slice
                warn!(error = %e, "Time index rejected, keeping previous selection");
                if self.selection.is_none() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
        let selection = self
            .selection
            .as_ref()
            .ok_or_else(|| IcemapError::EmptySelection {
                message: format!("No selection available for '{}'", variable),
            })?;

        let crs = self.surface.crs_name();
        let bbox = [
            viewport.projected.sw.0,
            viewport.projected.sw.1,
            viewport.projected.ne.0,
            viewport.projected.ne.1,
        ];
        let aligned = align(
            &selection.raster,
            &crs,
            bbox,
            viewport.resolution,
            self.state.resampling,
        )?;
        if aligned.is_blank() {
            return Err(IcemapError::EmptySelection {
                message: format!("Viewport holds no valid data for '{}'", selection.variable),
            });
        }

        // normalization bounds come from the whole selection, not the
        // visible window, so panning does not recolor the overlay
        let norm = match &mut self.norm {
            Some(norm) => {
                norm.refresh(selection.raster.data.view());
                *norm
            }
            None => {
                let norm = Normalization::from_bounds(
                    self.state.vmin,
                    self.state.vmax,
                    selection.raster.data.view(),
                );
                self.norm = Some(norm);
                norm
            }
        };

        let colormap = get_colormap(&self.state.colormap, self.state.reversed)?;
        let image = render_image(aligned.data.view(), colormap.as_ref(), &norm, self.state.opacity);
        let url = image_to_data_url(&image)?;

        let layer = RenderedLayer {
            name: selection.variable.clone(),
            url,
            extent: aligned.extent,
            opacity: self.state.opacity,
            colormap: colormap.name().to_string(),
            vmin: norm.vmin,
            vmax: norm.vmax,
        };

        // a refresh of the installed layer swaps its image in place; a
        // different layer replaces the previous one wholesale
        match self.installed_layer.as_deref() {
            Some(current) if current == layer.name => {
                self.surface
                    .set_overlay_url(&layer.name, &layer.url, layer.extent)?;
                debug!(layer = %layer.name, "Overlay image swapped");
            }
            Some(previous) => {
                let status = self.surface.ensure_overlay_absent(previous)?;
                debug!(layer = %previous, ?status, "Previous overlay removed");
                let status = self.surface.ensure_overlay(&layer)?;
                debug!(layer = %layer.name, ?status, "Overlay installed");
            }
            None => {
                let status = self.surface.ensure_overlay(&layer)?;
                debug!(layer = %layer.name, ?status, "Overlay installed");
            }
        }
        self.installed_layer = Some(layer.name.clone());

        let colorbar = Colorbar::build(
            colormap.as_ref(),
            &norm,
            format!("{} ({})", selection.meta.long_name, selection.meta.units),
            Orientation::Vertical,
        )?;
        let status = self.surface.ensure_colorbar(&colorbar)?;
        debug!(?status, "Colorbar refreshed");

        log_render_stats(
            &selection.variable,
            aligned.data.dim(),
            aligned.extent,
            layer.url.len(),
            start,
        );
        Ok(())
    }

    /// Show a value popup at a clicked position, if the click hits a cell
    /// with valid data in the current selection.
    fn handle_click(&self, lat: f64, lon: f64) {
        let Some(selection) = &self.selection else {
            return;
        };
        let value = match sample_at(selection, lat, lon) {
            Ok(value) => value,
            Err(e) => {
                log_error(&e, "click lookup");
                return;
            }
        };
        let Some(value) = value else {
            debug!(lat, lon, "Click outside valid data");
            return;
        };
        let text = format!("{:.1} {}", value, selection.meta.units);
        if let Err(e) = self.surface.show_popup(lat, lon, &text) {
            log_error(&e, "popup");
        }
    }
}

/// Carry a slice selection over to a variable with a different layout.
///
/// Layer indices transfer between time-series and banded variables (clamped
/// to the time axis where its length is known); a static grid takes no
/// index at all.
fn coerce_slice(slice: TimeSlice, kind: VariableKind, time_len: Option<usize>) -> TimeSlice {
    match kind {
        VariableKind::TimeSeries => {
            let lag = match slice {
                TimeSlice::Lag(i) | TimeSlice::Band(i) => i,
                TimeSlice::Static => 0,
            };
            match time_len {
                Some(len) if len > 0 => TimeSlice::Lag(lag.min(len - 1)),
                _ => TimeSlice::Lag(lag),
            }
        }
        VariableKind::Banded => match slice {
            TimeSlice::Lag(i) | TimeSlice::Band(i) => TimeSlice::Band(i),
            TimeSlice::Static => TimeSlice::Band(0),
        },
        VariableKind::Static => TimeSlice::Static,
    }
}

/// Nearest-cell value of a selection at a geographic position, or None if
/// the position falls outside the grid or on nodata.
fn sample_at(selection: &RasterSelection, lat: f64, lon: f64) -> Result<Option<f32>> {
    let (x, y) = crate::projection::transform_point("EPSG:4326", &selection.raster.crs, lon, lat)?;
    let (row, col) = selection.raster.transform.rowcol(x, y);
    let (nrows, ncols) = selection.raster.data.dim();
    if row < 0.0 || col < 0.0 || row >= nrows as f64 || col >= ncols as f64 {
        return Ok(None);
    }
    let value = selection.raster.data[[row as usize, col as usize]];
    Ok(value.is_finite().then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{VariableKind, VariableMeta};
    use crate::raster::{GridTransform, SourceRaster};
    use ndarray::Array2;

    fn selection_over_greenland() -> RasterSelection {
        // 4x4 grid in EPSG:3413 south of the pole center
        let mut data = Array2::from_shape_fn((4, 4), |(r, c)| (r * 10 + c) as f32);
        data[[3, 3]] = f32::NAN;
        RasterSelection {
            raster: SourceRaster::new(
                data,
                GridTransform::from_origin(-1_000_000.0, 0.0, 500_000.0, 500_000.0),
                "EPSG:3413",
            ),
            variable: "delta_h".to_string(),
            slice: TimeSlice::Lag(0),
            meta: VariableMeta {
                kind: VariableKind::TimeSeries,
                units: "meters".to_string(),
                long_name: "height change".to_string(),
                grid_mapping_crs: Some("EPSG:3413".to_string()),
            },
        }
    }

    #[test]
    fn test_coerce_slice_to_static_grid() {
        assert_eq!(
            coerce_slice(TimeSlice::Lag(5), VariableKind::Static, Some(12)),
            TimeSlice::Static
        );
        assert_eq!(
            coerce_slice(TimeSlice::Band(2), VariableKind::Static, None),
            TimeSlice::Static
        );
    }

    #[test]
    fn test_coerce_slice_keeps_and_clamps_lag() {
        assert_eq!(
            coerce_slice(TimeSlice::Lag(2), VariableKind::TimeSeries, Some(12)),
            TimeSlice::Lag(2)
        );
        assert_eq!(
            coerce_slice(TimeSlice::Lag(20), VariableKind::TimeSeries, Some(12)),
            TimeSlice::Lag(11)
        );
        assert_eq!(
            coerce_slice(TimeSlice::Static, VariableKind::TimeSeries, Some(12)),
            TimeSlice::Lag(0)
        );
    }

    #[test]
    fn test_coerce_slice_to_banded() {
        assert_eq!(
            coerce_slice(TimeSlice::Lag(3), VariableKind::Banded, Some(12)),
            TimeSlice::Band(3)
        );
        assert_eq!(
            coerce_slice(TimeSlice::Static, VariableKind::Banded, None),
            TimeSlice::Band(0)
        );
    }

    #[test]
    fn test_sample_outside_grid_is_none() {
        let selection = selection_over_greenland();
        // near the pole, far north of the grid's coverage
        assert_eq!(sample_at(&selection, 85.0, 135.0).unwrap(), None);
    }

    #[test]
    fn test_sample_inside_grid_returns_value() {
        let selection = selection_over_greenland();
        // grid center in projected coordinates, back to geographic
        let (lon, lat) =
            crate::projection::transform_point("EPSG:3413", "EPSG:4326", -900_000.0, -100_000.0)
                .unwrap();
        let value = sample_at(&selection, lat, lon).unwrap();
        assert_eq!(value, Some(0.0));
    }
}
