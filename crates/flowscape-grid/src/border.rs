//! Border and opening arithmetic
//!
//! Pure functions over raster shapes. A padded raster of shape
//! `(rows + 2b, cols + 2b)` carries the original data in its interior and a
//! ring of `b` padding pixels around it. An edge-region case cuts one
//! opening into that ring: the part of the ring lying inside one border
//! tile of the tile matrix.
//!
//! Tile spans use integer floor division, `[k·n/count, (k+1)·n/count)`, so
//! the last tile absorbs any remainder.

use crate::region::{RegionTile, TileMatrix};
use std::ops::Range;

/// Half-open rectangle of raster cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl CellWindow {
    #[inline]
    #[must_use]
    pub const fn new(rows: (usize, usize), cols: (usize, usize)) -> Self {
        Self {
            row_start: rows.0,
            row_end: rows.1,
            col_start: cols.0,
            col_end: cols.1,
        }
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        self.row_start..self.row_end
    }

    #[inline]
    #[must_use]
    pub fn cols(&self) -> Range<usize> {
        self.col_start..self.col_end
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_start >= self.row_end || self.col_start >= self.col_end
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows().contains(&row) && self.cols().contains(&col)
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.row_end - self.row_start) * (self.col_end - self.col_start)
        }
    }

    /// Clip to a `(rows, cols)` raster
    #[must_use]
    pub fn clamp(self, shape: (usize, usize)) -> Self {
        Self {
            row_start: self.row_start.min(shape.0),
            row_end: self.row_end.min(shape.0),
            col_start: self.col_start.min(shape.1),
            col_end: self.col_end.min(shape.1),
        }
    }
}

/// Shape after padding `b` pixels on every side
#[inline]
#[must_use]
pub fn padded_shape(shape: (usize, usize), buffer: usize) -> (usize, usize) {
    (shape.0 + 2 * buffer, shape.1 + 2 * buffer)
}

/// Where the unpadded data sits inside the padded raster
#[inline]
#[must_use]
pub fn interior_window(shape: (usize, usize), buffer: usize) -> CellWindow {
    CellWindow::new((buffer, buffer + shape.0), (buffer, buffer + shape.1))
}

/// Cell lies in the outer `buffer`-wide ring of a raster
#[inline]
#[must_use]
pub fn in_padding_ring(row: usize, col: usize, shape: (usize, usize), buffer: usize) -> bool {
    row < buffer
        || col < buffer
        || row >= shape.0.saturating_sub(buffer)
        || col >= shape.1.saturating_sub(buffer)
}

/// `[k·extent/count, (k+1)·extent/count)`
#[inline]
#[must_use]
pub fn tile_span(index: usize, count: usize, extent: usize) -> (usize, usize) {
    (index * extent / count, (index + 1) * extent / count)
}

/// Cells covered by a tile of the matrix laid over a raster
#[must_use]
pub fn tile_window(tile: RegionTile, matrix: TileMatrix, shape: (usize, usize)) -> CellWindow {
    CellWindow::new(
        tile_span(tile.i, matrix.rows, shape.0),
        tile_span(tile.j, matrix.cols, shape.1),
    )
}

/// Windows to zero for an edge-region opening
///
/// `shape` is the padded raster shape. Within the tile's column span the
/// top (`i == 0`) or bottom (`i == rows − 1`) `buffer` rows are opened;
/// within its row span the left (`j == 0`) or right (`j == cols − 1`)
/// `buffer` columns are. Corner tiles get two windows. Interior tiles and
/// `buffer == 0` yield nothing non-empty.
#[must_use]
pub fn opening_windows(
    tile: RegionTile,
    matrix: TileMatrix,
    shape: (usize, usize),
    buffer: usize,
) -> Vec<CellWindow> {
    let span = tile_window(tile, matrix, shape);
    let mut windows = Vec::with_capacity(2);

    if tile.i == 0 {
        windows.push(CellWindow::new(
            (span.row_start, span.row_start + buffer),
            (span.col_start, span.col_end),
        ));
    }
    if tile.i + 1 == matrix.rows {
        windows.push(CellWindow::new(
            (span.row_end.saturating_sub(buffer), span.row_end),
            (span.col_start, span.col_end),
        ));
    }
    if tile.j == 0 {
        windows.push(CellWindow::new(
            (span.row_start, span.row_end),
            (span.col_start, span.col_start + buffer),
        ));
    }
    if tile.j + 1 == matrix.cols {
        windows.push(CellWindow::new(
            (span.row_start, span.row_end),
            (span.col_end.saturating_sub(buffer), span.col_end),
        ));
    }

    windows
        .into_iter()
        .map(|w| w.clamp(shape))
        .filter(|w| !w.is_empty())
        .collect()
}
