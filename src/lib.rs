//! # icemap
//!
//! A map-synchronization and raster-reprojection engine for gridded polar
//! elevation-change products.
//!
//! This library keeps an interactive slippy map and a gridded dataset in
//! agreement: it tracks the map's viewport, pulls the matching window out
//! of the dataset, reprojects it onto the map's grid, colorizes it, and
//! installs the result as a self-contained PNG overlay.
//!
//! ## Key Features
//!
//! - **Polar tile grids**: Built-in registry for the EPSG:3413 and
//!   EPSG:3031 polar stereographic grids plus web mercator
//! - **Resolution-aware resampling**: Coarse sources are padded and
//!   clipped without resampling; fine sources are warped to the viewport
//! - **Settled-viewport rendering**: Transitional bounds reported mid-pan
//!   never reach the render step
//! - **Single-flight updates**: One async loop owns all state, so at most
//!   one render cycle is ever in flight and bursts of control events
//!   collapse to a single render
//!
//! ## Architecture
//!
//! - **Projection Layer**: CRS registry and coordinate transforms
//! - **Raster Layer**: Viewport tracking, alignment, and resampling
//! - **Render Layer**: Normalization, colormaps, and PNG overlay encoding
//! - **Session Layer**: The async orchestrator driving a map surface

pub mod colormaps;
pub mod config;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod projection;
pub mod raster;
pub mod render;
pub mod session;
pub mod surface;
pub mod viewport;

pub use config::{Config, MapConfig, RenderConfig};
pub use dataset::{
    GridSource, InMemorySource, RasterSelection, SourceOptions, TimeSlice, VariableKind,
    VariableMeta,
};
pub use error::{IcemapError, Result};
pub use logging::{generate_render_id, init_tracing, log_error, log_render_stats};
pub use raster::{align, AlignedRaster, GridTransform, Resampling, SourceRaster};
pub use render::{Colorbar, Normalization, Orientation};
pub use session::{ControlEvent, MapSession, RenderPhase, SessionStats};
pub use surface::{LayerStatus, MapSurface, RenderedLayer};
pub use viewport::{GeographicBounds, PixelBounds, ProjectedBounds, Viewport};
