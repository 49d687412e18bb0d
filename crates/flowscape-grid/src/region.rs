//! Region tiles
//!
//! An `h × w` tile matrix is laid over the (padded) grid. Tiles touching the
//! matrix's outer edge are border tiles; each one becomes a candidate
//! opening for an edge-region case.

use crate::error::GridError;
use crate::grid::Extent;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

/// Tile coordinate: row `i`, column `j`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionTile {
    pub i: usize,
    pub j: usize,
}

impl RegionTile {
    #[inline]
    #[must_use]
    pub const fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }
}

impl Display for RegionTile {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.i, self.j)
    }
}

impl From<(usize, usize)> for RegionTile {
    fn from((i, j): (usize, usize)) -> Self {
        Self::new(i, j)
    }
}

/// Shape of the tile matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileMatrix {
    pub rows: usize,
    pub cols: usize,
}

impl TileMatrix {
    /// Create a matrix of `rows × cols` tiles
    ///
    /// # Errors
    /// `GridError::InvalidMatrix` if either dimension is zero
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::InvalidMatrix { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, tile: RegionTile) -> bool {
        tile.i < self.rows && tile.j < self.cols
    }

    /// Tile inside the matrix and on its outer ring
    #[inline]
    #[must_use]
    pub fn is_border(&self, tile: RegionTile) -> bool {
        self.contains(tile)
            && (tile.i == 0 || tile.i == self.rows - 1 || tile.j == 0 || tile.j == self.cols - 1)
    }

    /// Reject tiles outside the matrix
    ///
    /// # Errors
    /// `GridError::TileOutOfRange`
    pub fn check(&self, tile: RegionTile) -> Result<(), GridError> {
        if self.contains(tile) {
            Ok(())
        } else {
            Err(GridError::TileOutOfRange {
                tile,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Number of border tiles
    #[must_use]
    pub fn border_count(&self) -> usize {
        let inner = self.rows.saturating_sub(2) * self.cols.saturating_sub(2);
        self.rows * self.cols - inner
    }

    /// Border tiles in row-major order
    #[must_use]
    pub fn border_tiles(&self) -> Vec<RegionTile> {
        let mut tiles = Vec::with_capacity(self.border_count());
        for i in 0..self.rows {
            for j in 0..self.cols {
                let tile = RegionTile::new(i, j);
                if self.is_border(tile) {
                    tiles.push(tile);
                }
            }
        }
        tiles
    }
}

/// Border tiles of an `h × w` matrix, row-major
///
/// # Errors
/// `GridError::InvalidMatrix` if `h` or `w` is zero
pub fn partition(h: usize, w: usize) -> Result<Vec<RegionTile>, GridError> {
    Ok(TileMatrix::new(h, w)?.border_tiles())
}

/// Restrict border tiles to those holding at least one point
///
/// Tile membership is computed against the extent of the point set itself,
/// not the grid: `i = floor(h·(y − y_min)/height)`,
/// `j = floor(w·(x − x_min)/width)`. Points landing on index `h` or `w`
/// (the set's maximum edge) match no tile. Output keeps the order of
/// `tiles`.
///
/// # Errors
/// - `GridError::EmptyPointSet` with no points
/// - `GridError::InvalidExtent` for non-finite coordinates
/// - `GridError::DegeneratePointExtent` when the points span zero width or height
pub fn filter_by_points(
    tiles: &[RegionTile],
    matrix: TileMatrix,
    points: &[(f64, f64)],
) -> Result<Vec<RegionTile>, GridError> {
    let extent =
        Extent::from_points(points.iter().copied()).ok_or(GridError::EmptyPointSet)?;
    if !extent.is_valid() {
        return Err(GridError::InvalidExtent(format!("{extent:?}")));
    }
    let (width, height) = (extent.width(), extent.height());
    if width <= 0.0 || height <= 0.0 {
        return Err(GridError::DegeneratePointExtent { width, height });
    }

    let rows = matrix.rows as f64;
    let cols = matrix.cols as f64;
    let hits: HashSet<RegionTile> = points
        .iter()
        .filter_map(|&(x, y)| {
            let i = (rows * (y - extent.min_y) / height).floor();
            let j = (cols * (x - extent.min_x) / width).floor();
            (i < rows && j < cols).then(|| RegionTile::new(i as usize, j as usize))
        })
        .filter(|tile| matrix.is_border(*tile))
        .collect();

    Ok(tiles
        .iter()
        .copied()
        .filter(|tile| hits.contains(tile))
        .collect())
}
