//! Error types for grid geometry

use crate::region::RegionTile;

/// Errors raised while deriving grids or partitioning them into tiles
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    /// Reference geometry set was empty
    #[error("no input geometry to derive a grid from")]
    NoInputGeometry,

    /// Pixel size was zero, negative or not finite
    #[error("invalid pixel size: {0}")]
    InvalidPixelSize(f64),

    /// Grid would have a zero dimension
    #[error("grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },

    /// Extent contains non-finite or inverted bounds
    #[error("invalid extent: {0}")]
    InvalidExtent(String),

    /// Tile matrix with a zero dimension
    #[error("tile matrix must be at least 1x1, got {rows}x{cols}")]
    InvalidMatrix { rows: usize, cols: usize },

    /// Tile lies outside its matrix
    #[error("tile {tile} outside {rows}x{cols} matrix")]
    TileOutOfRange {
        tile: RegionTile,
        rows: usize,
        cols: usize,
    },

    /// No points to derive tile membership from
    #[error("point set is empty")]
    EmptyPointSet,

    /// Points collapse onto a line or a single location
    #[error("point set extent is degenerate ({width} x {height})")]
    DegeneratePointExtent { width: f64, height: f64 },
}
