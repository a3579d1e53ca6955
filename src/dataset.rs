//! Dataset boundary: how gridded products expose variables to the session.
//!
//! The session only ever talks to a [`GridSource`]; the in-memory
//! implementation here backs tests and small workflows, while remote or
//! file-backed stores can implement the same trait.

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IcemapError, Result};
use crate::raster::{GridTransform, SourceRaster};

/// How a variable is laid out along its non-spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// A (time, y, x) stack sampled at regular intervals
    TimeSeries,
    /// A (band, y, x) stack of named quality or component bands
    Banded,
    /// A single (y, x) grid
    Static,
}

/// Which slice of a variable to pull.
///
/// Time-series variables are indexed by lag from the first epoch; banded
/// variables by band position; static variables take no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSlice {
    Lag(usize),
    Band(usize),
    Static,
}

/// Descriptive metadata attached to a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMeta {
    pub kind: VariableKind,
    /// Physical units, e.g. "meters" or "meters/year"
    pub units: String,
    /// Human-readable name for colorbar labels and popups
    pub long_name: String,
    /// CRS recorded in the variable's grid-mapping metadata, if any
    pub grid_mapping_crs: Option<String>,
}

/// A concrete slice pulled out of a source, ready for alignment.
#[derive(Debug, Clone)]
pub struct RasterSelection {
    pub raster: SourceRaster,
    pub variable: String,
    pub slice: TimeSlice,
    pub meta: VariableMeta,
}

/// Access options for opening sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Access object stores without credentials
    pub anonymous: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self { anonymous: true }
    }
}

/// A gridded product exposing named variables over a shared grid.
pub trait GridSource: Send + Sync {
    /// Names of all plottable variables, in a stable order.
    fn variable_names(&self) -> Vec<String>;

    /// Metadata for one variable.
    fn variable(&self, name: &str) -> Result<VariableMeta>;

    /// Number of epochs along the time axis, if the source has one.
    fn time_len(&self) -> Option<usize>;

    /// CRS the source's grids are referenced to.
    ///
    /// Per-variable grid-mapping metadata wins over the dataset-level
    /// CRS; a source with neither cannot be displayed.
    fn crs(&self, variable: &str) -> Result<String> {
        if let Some(crs) = self.variable(variable)?.grid_mapping_crs {
            return Ok(crs);
        }
        self.dataset_crs()
            .ok_or_else(|| IcemapError::MissingCrsMetadata {
                variable: variable.to_string(),
            })
    }

    /// Dataset-level CRS fallback.
    fn dataset_crs(&self) -> Option<String>;

    /// Pull one 2D slice of a variable.
    fn slice(&self, variable: &str, slice: TimeSlice) -> Result<RasterSelection>;
}

enum Stack {
    Layered(Array3<f32>),
    Single(Array2<f32>),
}

struct InMemoryVariable {
    meta: VariableMeta,
    stack: Stack,
}

/// A source holding all of its grids in memory.
pub struct InMemorySource {
    variables: BTreeMap<String, InMemoryVariable>,
    transform: GridTransform,
    dataset_crs: Option<String>,
    options: SourceOptions,
}

impl InMemorySource {
    pub fn new(transform: GridTransform, dataset_crs: Option<String>) -> Self {
        Self {
            variables: BTreeMap::new(),
            transform,
            dataset_crs,
            options: SourceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SourceOptions) -> Self {
        debug!(anonymous = options.anonymous, "Configuring source access");
        self.options = options;
        self
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Register a (time, y, x) or (band, y, x) stack.
    pub fn add_stack(&mut self, name: impl Into<String>, meta: VariableMeta, data: Array3<f32>) {
        self.variables.insert(
            name.into(),
            InMemoryVariable {
                meta,
                stack: Stack::Layered(data),
            },
        );
    }

    /// Register a single (y, x) grid.
    pub fn add_grid(&mut self, name: impl Into<String>, meta: VariableMeta, data: Array2<f32>) {
        self.variables.insert(
            name.into(),
            InMemoryVariable {
                meta,
                stack: Stack::Single(data),
            },
        );
    }
}

impl GridSource for InMemorySource {
    fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    fn variable(&self, name: &str) -> Result<VariableMeta> {
        self.variables
            .get(name)
            .map(|v| v.meta.clone())
            .ok_or_else(|| IcemapError::DataNotFound {
                message: format!("No variable named '{}'", name),
            })
    }

    fn time_len(&self) -> Option<usize> {
        self.variables.values().find_map(|v| match (&v.stack, v.meta.kind) {
            (Stack::Layered(data), VariableKind::TimeSeries) => Some(data.len_of(Axis(0))),
            _ => None,
        })
    }

    fn dataset_crs(&self) -> Option<String> {
        self.dataset_crs.clone()
    }

    fn slice(&self, variable: &str, slice: TimeSlice) -> Result<RasterSelection> {
        let var = self
            .variables
            .get(variable)
            .ok_or_else(|| IcemapError::DataNotFound {
                message: format!("No variable named '{}'", variable),
            })?;
        let crs = self.crs(variable)?;

        let data = match (&var.stack, slice) {
            (Stack::Layered(stack), TimeSlice::Lag(i)) | (Stack::Layered(stack), TimeSlice::Band(i)) => {
                let len = stack.len_of(Axis(0));
                if i >= len {
                    return Err(IcemapError::InvalidTimeIndex {
                        variable: variable.to_string(),
                        index: i,
                        len,
                    });
                }
                stack.index_axis(Axis(0), i).to_owned()
            }
            (Stack::Single(grid), TimeSlice::Static) => grid.clone(),
            (Stack::Single(_), _) => {
                return Err(IcemapError::InvalidParameter {
                    param: "slice".to_string(),
                    message: format!("Variable '{}' has no layer axis", variable),
                })
            }
            (Stack::Layered(_), TimeSlice::Static) => {
                return Err(IcemapError::InvalidParameter {
                    param: "slice".to_string(),
                    message: format!("Variable '{}' requires a layer index", variable),
                })
            }
        };

        if data.iter().all(|v| !v.is_finite()) {
            return Err(IcemapError::EmptySelection {
                message: format!("Selection of '{}' contains no valid data", variable),
            });
        }

        Ok(RasterSelection {
            raster: SourceRaster::new(data, self.transform, crs),
            variable: variable.to_string(),
            slice,
            meta: var.meta.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn time_meta() -> VariableMeta {
        VariableMeta {
            kind: VariableKind::TimeSeries,
            units: "meters".to_string(),
            long_name: "height change".to_string(),
            grid_mapping_crs: Some("EPSG:3413".to_string()),
        }
    }

    fn sample_source() -> InMemorySource {
        let mut source = InMemorySource::new(
            GridTransform::from_origin(0.0, 400.0, 100.0, 100.0),
            Some("EPSG:3413".to_string()),
        );
        let stack = Array3::from_shape_fn((3, 4, 4), |(t, r, c)| (t * 100 + r * 10 + c) as f32);
        source.add_stack("delta_h", time_meta(), stack);
        source.add_grid(
            "ice_area",
            VariableMeta {
                kind: VariableKind::Static,
                units: "km^2".to_string(),
                long_name: "ice area".to_string(),
                grid_mapping_crs: None,
            },
            Array2::from_elem((4, 4), 1.0),
        );
        source
    }

    #[test]
    fn test_slice_by_lag() {
        let source = sample_source();
        let sel = source.slice("delta_h", TimeSlice::Lag(2)).unwrap();
        assert_eq!(sel.raster.data[[1, 3]], 213.0);
        assert_eq!(sel.raster.crs, "EPSG:3413");
    }

    #[test]
    fn test_lag_out_of_range() {
        let source = sample_source();
        let err = source.slice("delta_h", TimeSlice::Lag(3)).unwrap_err();
        assert!(matches!(
            err,
            IcemapError::InvalidTimeIndex { index: 3, len: 3, .. }
        ));
    }

    #[test]
    fn test_static_variable_uses_dataset_crs() {
        let source = sample_source();
        let sel = source.slice("ice_area", TimeSlice::Static).unwrap();
        assert_eq!(sel.raster.crs, "EPSG:3413");
    }

    #[test]
    fn test_missing_crs_is_an_error() {
        let mut source = InMemorySource::new(GridTransform::from_origin(0.0, 400.0, 100.0, 100.0), None);
        source.add_grid(
            "orphan",
            VariableMeta {
                kind: VariableKind::Static,
                units: "m".to_string(),
                long_name: "orphan".to_string(),
                grid_mapping_crs: None,
            },
            Array2::from_elem((2, 2), 0.0),
        );
        assert!(matches!(
            source.slice("orphan", TimeSlice::Static),
            Err(IcemapError::MissingCrsMetadata { .. })
        ));
    }

    #[test]
    fn test_all_nodata_selection_rejected() {
        let mut source = sample_source();
        source.add_grid(
            "void",
            VariableMeta {
                kind: VariableKind::Static,
                units: "m".to_string(),
                long_name: "void".to_string(),
                grid_mapping_crs: Some("EPSG:3413".to_string()),
            },
            Array2::from_elem((2, 2), f32::NAN),
        );
        let err = source.slice("void", TimeSlice::Static).unwrap_err();
        assert!(err.is_skippable());
    }

    #[test]
    fn test_time_len_from_time_series() {
        let source = sample_source();
        assert_eq!(source.time_len(), Some(3));
    }

    #[test]
    fn test_access_options() {
        let source = sample_source().with_options(SourceOptions { anonymous: false });
        assert!(!source.options().anonymous);
        assert!(InMemorySource::new(
            GridTransform::from_origin(0.0, 0.0, 1.0, 1.0),
            None
        )
        .options()
        .anonymous);
    }

    #[test]
    fn test_unknown_variable() {
        let source = sample_source();
        assert!(matches!(
            source.slice("nope", TimeSlice::Static),
            Err(IcemapError::DataNotFound { .. })
        ));
    }
}
