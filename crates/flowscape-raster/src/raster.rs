//! Raster layers
//!
//! A [`RasterLayer`] is a single band of samples on a [`SpatialGrid`]. The
//! band's shape always equals the grid's `(rows, cols)`; constructors refuse
//! anything else.

use crate::error::RasterError;
use flowscape_grid::SpatialGrid;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Sample type of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericKind {
    /// Boundary-condition layers
    Int8,
    /// Density and capacity layers
    Float32,
}

impl Display for NumericKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int8 => f.write_str("int8"),
            Self::Float32 => f.write_str("float32"),
        }
    }
}

/// Sample storage, row-major `(rows, cols)`
#[derive(Debug, Clone, PartialEq)]
pub enum RasterBand {
    Int8(Array2<i8>),
    Float32(Array2<f32>),
}

impl RasterBand {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NumericKind {
        match self {
            Self::Int8(_) => NumericKind::Int8,
            Self::Float32(_) => NumericKind::Float32,
        }
    }

    /// `(rows, cols)`
    #[inline]
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Int8(a) => a.dim(),
            Self::Float32(a) => a.dim(),
        }
    }

    /// Sample widened to `f64`
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            Self::Int8(a) => a.get((row, col)).map(|v| f64::from(*v)),
            Self::Float32(a) => a.get((row, col)).map(|v| f64::from(*v)),
        }
    }

    #[must_use]
    pub fn as_f32(&self) -> Option<&Array2<f32>> {
        match self {
            Self::Float32(a) => Some(a),
            Self::Int8(_) => None,
        }
    }

    #[must_use]
    pub fn as_i8(&self) -> Option<&Array2<i8>> {
        match self {
            Self::Int8(a) => Some(a),
            Self::Float32(_) => None,
        }
    }
}

/// Summary of the finite samples of a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of finite, non-nodata samples
    pub count: usize,
}

/// One band on a grid
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayer {
    grid: SpatialGrid,
    band: RasterBand,
    nodata: Option<f64>,
}

impl RasterLayer {
    /// Create a layer, checking the band against the grid
    ///
    /// # Errors
    /// `RasterError::ShapeMismatch` if the band shape is not the grid shape
    pub fn new(
        grid: SpatialGrid,
        band: RasterBand,
        nodata: Option<f64>,
    ) -> Result<Self, RasterError> {
        if band.shape() != grid.shape() {
            return Err(RasterError::ShapeMismatch {
                expected: grid.shape(),
                actual: band.shape(),
            });
        }
        Ok(Self { grid, band, nodata })
    }

    /// Float32 layer filled with `value`
    #[must_use]
    pub fn filled_f32(grid: SpatialGrid, value: f32, nodata: Option<f64>) -> Self {
        let band = RasterBand::Float32(Array2::from_elem(grid.shape(), value));
        Self { grid, band, nodata }
    }

    /// Int8 layer filled with `value`
    #[must_use]
    pub fn filled_i8(grid: SpatialGrid, value: i8) -> Self {
        let band = RasterBand::Int8(Array2::from_elem(grid.shape(), value));
        Self {
            grid,
            band,
            nodata: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    #[inline]
    #[must_use]
    pub fn band(&self) -> &RasterBand {
        &self.band
    }

    #[inline]
    #[must_use]
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> NumericKind {
        self.band.kind()
    }

    /// Split into parts
    #[must_use]
    pub fn into_parts(self) -> (SpatialGrid, RasterBand, Option<f64>) {
        (self.grid, self.band, self.nodata)
    }

    /// Sample at a projected point, `None` outside the grid
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let (row, col) = self.grid.cell_of(x, y)?;
        self.band.get(row, col)
    }

    /// Min, max and mean over finite samples that are not nodata
    ///
    /// `None` when no sample qualifies.
    #[must_use]
    pub fn stats(&self) -> Option<LayerStats> {
        let values: Box<dyn Iterator<Item = f64> + '_> = match &self.band {
            RasterBand::Int8(a) => Box::new(a.iter().map(|v| f64::from(*v))),
            RasterBand::Float32(a) => Box::new(a.iter().map(|v| f64::from(*v))),
        };
        let nodata = self.nodata;

        let mut acc: Option<LayerStats> = None;
        let mut sum = 0.0;
        for v in values.filter(|v| v.is_finite() && Some(*v) != nodata) {
            sum += v;
            acc = Some(match acc {
                None => LayerStats {
                    min: v,
                    max: v,
                    mean: 0.0,
                    count: 1,
                },
                Some(s) => LayerStats {
                    min: s.min.min(v),
                    max: s.max.max(v),
                    mean: 0.0,
                    count: s.count + 1,
                },
            });
        }
        acc.map(|s| LayerStats {
            mean: sum / s.count as f64,
            ..s
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowscape_grid::SpatialReference;
    use ndarray::array;

    fn grid(width: usize, height: usize) -> SpatialGrid {
        SpatialGrid::new(0.0, 90.0, 30.0, width, height, SpatialReference::default()).unwrap()
    }

    #[test]
    fn rejects_mismatched_band() {
        let band = RasterBand::Float32(Array2::zeros((2, 3)));
        let err = RasterLayer::new(grid(2, 3), band, None).unwrap_err();
        assert!(matches!(
            err,
            RasterError::ShapeMismatch {
                expected: (3, 2),
                actual: (2, 3)
            }
        ));
    }

    #[test]
    fn stats_skip_nan_and_nodata() {
        let band = RasterBand::Float32(array![[1.0, f32::NAN, 3.0], [-9999.0, 5.0, 7.0]]);
        let layer = RasterLayer::new(grid(3, 2), band, Some(-9999.0)).unwrap();
        let stats = layer.stats().unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 7.0);
        assert_eq!(stats.mean, 4.0);
    }

    #[test]
    fn stats_of_all_nan_layer_is_none() {
        let layer = RasterLayer::filled_f32(grid(2, 2), f32::NAN, Some(f64::NAN));
        assert!(layer.stats().is_none());
    }

    #[test]
    fn sample_reads_cell_under_point() {
        let band = RasterBand::Int8(array![[1, 2], [3, 4]]);
        let layer = RasterLayer::new(grid(2, 2), band, None).unwrap();
        // origin (0, 90), 30 m cells
        assert_eq!(layer.sample(45.0, 40.0), Some(4.0));
        assert_eq!(layer.sample(5.0, 85.0), Some(1.0));
        assert_eq!(layer.sample(61.0, 85.0), None);
        assert_eq!(layer.kind(), NumericKind::Int8);
    }
}
