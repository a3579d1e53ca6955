//! Error types for the icemap library.
//!
//! A single error enum covers every failure mode; the session layer decides
//! which of these abort a render cycle and which merely skip it.

use thiserror::Error;

/// The main error type for icemap operations.
#[derive(Error, Debug)]
pub enum IcemapError {
    /// Requested coordinate reference system is not in the registry
    #[error("Unknown projection: {name}")]
    UnknownProjection { name: String },

    /// Source dataset carries no retrievable CRS information
    #[error("Missing CRS metadata for variable: {variable}")]
    MissingCrsMetadata { variable: String },

    /// Requested time lag is out of range for the selected variable
    #[error("Invalid time index {index} for variable {variable} (length {len})")]
    InvalidTimeIndex {
        variable: String,
        index: usize,
        len: usize,
    },

    /// Clipped or warped raster contains no finite values
    #[error("Selection is empty: {message}")]
    EmptySelection { message: String },

    /// Coordinate transform errors
    #[error("Transform error: {message}")]
    Transform { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// Data not found errors
    #[error("Data not found: {message}")]
    DataNotFound { message: String },

    /// Image encoding errors
    #[error("Image encoding error: {message}")]
    ImageEncoding { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results with IcemapError
pub type Result<T> = std::result::Result<T, IcemapError>;

impl IcemapError {
    /// Whether the failure should quietly skip a render cycle rather than
    /// be reported as an error.
    pub fn is_skippable(&self) -> bool {
        matches!(self, IcemapError::EmptySelection { .. })
    }
}
