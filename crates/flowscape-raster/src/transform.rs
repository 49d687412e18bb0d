//! Case-type border transforms
//!
//! Applied to a base raster after it is rasterized on the unpadded grid:
//! - [`BorderTransform::None`]: the no-border case, data unchanged
//! - [`BorderTransform::Pad`]: a ring of `buffer` pixels set to `value`
//! - [`BorderTransform::Opening`]: the same ring with one tile's stretch zeroed
//!
//! All window arithmetic comes from [`flowscape_grid::border`].

use crate::error::RasterError;
use crate::raster::{RasterBand, RasterLayer};
use flowscape_grid::border::{interior_window, opening_windows, padded_shape};
use flowscape_grid::{CellWindow, GridError, RegionTile, SpatialGrid, TileMatrix};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

/// Border handling of one case
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum BorderTransform {
    None,
    Pad {
        buffer: usize,
        value: f32,
    },
    Opening {
        buffer: usize,
        value: f32,
        tile: RegionTile,
        matrix: TileMatrix,
    },
}

impl BorderTransform {
    /// Padding width added on each side
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Pad { buffer, .. } | Self::Opening { buffer, .. } => *buffer,
        }
    }

    /// Grid the transformed raster lives on
    #[must_use]
    pub fn apply_to_grid(&self, grid: &SpatialGrid) -> SpatialGrid {
        grid.padded(self.buffer())
    }

    /// Windows zeroed in the padded raster
    ///
    /// # Errors
    /// `GridError::TileOutOfRange` for a tile outside its matrix
    pub fn openings(&self, padded: (usize, usize)) -> Result<Vec<CellWindow>, GridError> {
        match *self {
            Self::Opening {
                buffer,
                tile,
                matrix,
                ..
            } => {
                matrix.check(tile)?;
                Ok(opening_windows(tile, matrix, padded, buffer))
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Transform a base layer
    ///
    /// Float32 bands are padded with the transform's value and then opened.
    /// Int8 bands are padded with zero.
    ///
    /// # Errors
    /// `RasterError::Grid` for a tile outside its matrix
    pub fn apply(&self, layer: RasterLayer) -> Result<RasterLayer, RasterError> {
        let buffer = self.buffer();
        if matches!(self, Self::None) {
            return Ok(layer);
        }
        let (grid, band, nodata) = layer.into_parts();
        let padded_grid = self.apply_to_grid(&grid);
        let windows = self.openings(padded_grid.shape())?;

        let band = match band {
            RasterBand::Float32(data) => {
                let mut out = pad(&data, buffer, self.value());
                fill_windows(&mut out, &windows, 0.0);
                RasterBand::Float32(out)
            }
            RasterBand::Int8(data) => {
                let mut out = pad(&data, buffer, 0);
                fill_windows(&mut out, &windows, 0);
                RasterBand::Int8(out)
            }
        };
        RasterLayer::new(padded_grid, band, nodata)
    }

    fn value(&self) -> f32 {
        match self {
            Self::None => 0.0,
            Self::Pad { value, .. } | Self::Opening { value, .. } => *value,
        }
    }
}

/// Copy `data` into the interior of a raster grown by `buffer` on each side
#[must_use]
pub fn pad<T: Clone>(data: &Array2<T>, buffer: usize, value: T) -> Array2<T> {
    let mut out = Array2::from_elem(padded_shape(data.dim(), buffer), value);
    let inner = interior_window(data.dim(), buffer);
    out.slice_mut(s![inner.rows(), inner.cols()]).assign(data);
    out
}

/// Set every cell of `windows` to `value`
pub fn fill_windows<T: Clone>(data: &mut Array2<T>, windows: &[CellWindow], value: T) {
    let shape = data.dim();
    for window in windows.iter().map(|w| w.clamp(shape)) {
        if !window.is_empty() {
            data.slice_mut(s![window.rows(), window.cols()])
                .fill(value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowscape_grid::SpatialReference;
    use ndarray::array;

    fn layer() -> RasterLayer {
        let grid =
            SpatialGrid::new(0.0, 60.0, 30.0, 3, 2, SpatialReference::default()).unwrap();
        let band = RasterBand::Float32(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        RasterLayer::new(grid, band, None).unwrap()
    }

    #[test]
    fn none_is_identity() {
        let base = layer();
        assert_eq!(BorderTransform::None.apply(base.clone()).unwrap(), base);
    }

    #[test]
    fn pad_grows_grid_and_keeps_interior() {
        let out = BorderTransform::Pad {
            buffer: 2,
            value: 9.0,
        }
        .apply(layer())
        .unwrap();

        let grid = out.grid();
        assert_eq!((grid.width, grid.height), (7, 6));
        assert_eq!((grid.origin_x, grid.origin_y), (-60.0, 120.0));

        let data = out.band().as_f32().unwrap();
        assert_eq!(
            data.slice(s![2..4, 2..5]),
            array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]
        );
        assert_eq!(data[[0, 0]], 9.0);
        assert_eq!(data[[5, 6]], 9.0);
    }

    #[test]
    fn zero_buffer_pad_equals_data() {
        let base = layer();
        let out = BorderTransform::Pad {
            buffer: 0,
            value: 9.0,
        }
        .apply(base.clone())
        .unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn int8_bands_pad_with_zero() {
        let grid =
            SpatialGrid::new(0.0, 30.0, 30.0, 1, 1, SpatialReference::default()).unwrap();
        let base = RasterLayer::filled_i8(grid, 1);
        let out = BorderTransform::Pad {
            buffer: 1,
            value: 9.0,
        }
        .apply(base)
        .unwrap();
        assert_eq!(
            out.band().as_i8().unwrap(),
            &array![[0, 0, 0], [0, 1, 0], [0, 0, 0]]
        );
    }

    #[test]
    fn opening_rejects_tile_outside_matrix() {
        let transform = BorderTransform::Opening {
            buffer: 1,
            value: 1.0,
            tile: RegionTile::new(3, 0),
            matrix: TileMatrix::new(3, 3).unwrap(),
        };
        assert!(matches!(
            transform.apply(layer()),
            Err(RasterError::Grid(GridError::TileOutOfRange { .. }))
        ));
    }

    #[test]
    fn fill_windows_clamps() {
        let mut data = Array2::from_elem((3, 3), 1u8);
        fill_windows(&mut data, &[CellWindow::new((2, 10), (0, 10))], 0);
        assert_eq!(data, array![[1, 1, 1], [1, 1, 1], [0, 0, 0]]);
    }
}
