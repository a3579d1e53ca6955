//! Session configuration.
//!
//! Loaded from a JSON file or built in code; every field has a default so
//! partial files work, and [`Config::validate`] rejects values the session
//! cannot run with.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::colormaps::COLORMAP_NAMES;
use crate::dataset::SourceOptions;
use crate::error::{IcemapError, Result};
use crate::projection;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub map: MapConfig,
    pub render: RenderConfig,
    pub source: SourceOptions,
    /// Log level when RUST_LOG is not set
    pub log_level: String,
}

/// Map-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map projection the surface is expected to use
    pub projection: String,
    /// Give up waiting for the viewport to settle after this many
    /// milliseconds; None waits indefinitely
    pub settle_timeout_ms: Option<u64>,
}

/// Overlay rendering defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub colormap: String,
    pub reversed: bool,
    /// Overlay opacity in [0, 1]
    pub opacity: f64,
    /// Fixed normalization bounds; omit either one for dynamic
    /// percentile bounds
    pub vmin: Option<f64>,
    pub vmax: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            render: RenderConfig::default(),
            source: SourceOptions::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            projection: "EPSG:3413".to_string(),
            settle_timeout_ms: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colormap: "viridis".to_string(),
            reversed: false,
            opacity: 1.0,
            vmin: None,
            vmax: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Check that the configuration can drive a session.
    pub fn validate(&self) -> Result<()> {
        projection::lookup(&self.map.projection)?;

        if !COLORMAP_NAMES.contains(&self.render.colormap.as_str()) {
            return Err(IcemapError::Config {
                message: format!("Unknown colormap '{}'", self.render.colormap),
            });
        }
        if !(0.0..=1.0).contains(&self.render.opacity) {
            return Err(IcemapError::Config {
                message: format!("Opacity {} outside [0, 1]", self.render.opacity),
            });
        }
        if let (Some(vmin), Some(vmax)) = (self.render.vmin, self.render.vmax) {
            if vmin >= vmax {
                return Err(IcemapError::Config {
                    message: format!("vmin {} must be below vmax {}", vmin, vmax),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"map": {{"projection": "EPSG:3031"}}, "render": {{"colormap": "rdbu"}}}}"#
        )
        .unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.map.projection, "EPSG:3031");
        assert_eq!(config.render.colormap, "rdbu");
        assert_eq!(config.render.opacity, 1.0);
        assert!(config.source.anonymous);
    }

    #[test]
    fn test_unknown_projection_rejected() {
        let config = Config {
            map: MapConfig {
                projection: "EPSG:4978".to_string(),
                settle_timeout_ms: None,
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = Config::default();
        config.render.vmin = Some(5.0);
        config.render.vmax = Some(-5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_opacity_rejected() {
        let mut config = Config::default();
        config.render.opacity = 1.5;
        assert!(config.validate().is_err());
    }
}
