//! Error types for raster generation and storage

use flowscape_grid::GridError;
use std::path::PathBuf;

/// Raster layer errors
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// IO error at a path
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// GeoTIFF encode/decode failure
    #[error("tiff error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// JSON parse or write failure
    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Grid derivation failed
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Data shape differs from its grid
    #[error("shape mismatch: grid {expected:?}, data {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Nothing left to rasterize
    #[error("no usable features for {0} layer")]
    EmptyFeatureSet(String),

    /// GeoJSON structure not understood
    #[error("invalid geojson: {0}")]
    InvalidGeoJson(String),

    /// Raster layout or sample type not supported
    #[error("unsupported raster: {0}")]
    Unsupported(String),
}

impl RasterError {
    /// IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// JSON error for path
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// Input-data error: the caller supplied nothing usable
    #[inline]
    #[must_use]
    pub fn is_input_data(&self) -> bool {
        matches!(
            self,
            Self::EmptyFeatureSet(_) | Self::Grid(GridError::NoInputGeometry)
        )
    }
}
