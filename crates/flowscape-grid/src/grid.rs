//! Spatial grid model
//!
//! A [`SpatialGrid`] is the coordinate frame every raster of a case is
//! written on. Layers are only composable when their grids are identical,
//! origin included.

use crate::error::GridError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Spatial reference identifier, e.g. `EPSG:3310`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpatialReference(String);

impl SpatialReference {
    /// Create from an identifier string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as given
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// EPSG code, when the identifier has the `EPSG:<code>` form
    ///
    /// GeoTIFF stores the code in a 16-bit key, so larger codes are
    /// reported as `None`.
    #[must_use]
    pub fn epsg_code(&self) -> Option<u16> {
        let (authority, code) = self.0.split_once(':')?;
        if !authority.eq_ignore_ascii_case("epsg") {
            return None;
        }
        code.trim().parse().ok()
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::new("EPSG:3310")
    }
}

impl Display for SpatialReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Axis-aligned bounding box in projected units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create from bounds
    #[inline]
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Degenerate extent around a single point
    #[inline]
    #[must_use]
    pub const fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Bounding box of a point sequence, `None` when empty
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut extent = Self::point(x, y);
        for (x, y) in iter {
            extent.include(x, y);
        }
        Some(extent)
    }

    /// Grow to include a point
    #[inline]
    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Smallest extent covering both
    #[inline]
    #[must_use]
    pub fn union(mut self, other: &Extent) -> Self {
        self.include(other.min_x, other.min_y);
        self.include(other.max_x, other.max_y);
        self
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// All bounds finite and ordered
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    /// Point inside or on the boundary
    #[inline]
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Aligned raster coordinate frame
///
/// Origin is the top-left corner; rows grow southward, columns eastward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
    pub spatial_reference: SpatialReference,
}

impl SpatialGrid {
    /// Create a validated grid
    ///
    /// # Errors
    /// - `GridError::InvalidPixelSize` unless `pixel_size` is finite and positive
    /// - `GridError::EmptyGrid` if either dimension is zero
    /// - `GridError::InvalidExtent` if the origin is not finite
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        pixel_size: f64,
        width: usize,
        height: usize,
        spatial_reference: SpatialReference,
    ) -> Result<Self, GridError> {
        if !pixel_size.is_finite() || pixel_size <= 0.0 {
            return Err(GridError::InvalidPixelSize(pixel_size));
        }
        if width == 0 || height == 0 {
            return Err(GridError::EmptyGrid { width, height });
        }
        if !origin_x.is_finite() || !origin_y.is_finite() {
            return Err(GridError::InvalidExtent(format!(
                "origin ({origin_x}, {origin_y})"
            )));
        }
        Ok(Self {
            origin_x,
            origin_y,
            pixel_size,
            width,
            height,
            spatial_reference,
        })
    }

    /// `(rows, cols)`, the shape of any raster on this grid
    #[inline]
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Area of one pixel in squared projected units
    #[inline]
    #[must_use]
    pub fn pixel_area(&self) -> f64 {
        self.pixel_size * self.pixel_size
    }

    /// Covered extent
    #[must_use]
    pub fn extent(&self) -> Extent {
        Extent::new(
            self.origin_x,
            self.origin_y - self.height as f64 * self.pixel_size,
            self.origin_x + self.width as f64 * self.pixel_size,
            self.origin_y,
        )
    }

    /// Same pixel size, shape and reference system; origin may differ
    #[must_use]
    pub fn is_compatible(&self, other: &SpatialGrid) -> bool {
        self.pixel_size == other.pixel_size
            && self.width == other.width
            && self.height == other.height
            && self.spatial_reference == other.spatial_reference
    }

    /// Full equality: rasters on both grids overlay cell for cell
    #[inline]
    #[must_use]
    pub fn is_composable(&self, other: &SpatialGrid) -> bool {
        self == other
    }

    /// Grid grown by `buffer` pixels on every side
    ///
    /// The origin moves `buffer * pixel_size` west and north.
    #[must_use]
    pub fn padded(&self, buffer: usize) -> SpatialGrid {
        let shift = buffer as f64 * self.pixel_size;
        SpatialGrid {
            origin_x: self.origin_x - shift,
            origin_y: self.origin_y + shift,
            pixel_size: self.pixel_size,
            width: self.width + 2 * buffer,
            height: self.height + 2 * buffer,
            spatial_reference: self.spatial_reference.clone(),
        }
    }

    /// Centre of a cell in projected coordinates
    #[inline]
    #[must_use]
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_size,
            self.origin_y - (row as f64 + 0.5) * self.pixel_size,
        )
    }

    /// Cell holding a point, `None` outside the grid
    #[must_use]
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.origin_x) / self.pixel_size).floor();
        let row = ((self.origin_y - y) / self.pixel_size).floor();
        if !(col.is_finite() && row.is_finite()) || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.height && col < self.width).then_some((row, col))
    }

    /// Fractional `(row, col)` of a point, unbounded
    #[inline]
    #[must_use]
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (self.origin_y - y) / self.pixel_size,
            (x - self.origin_x) / self.pixel_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SpatialGrid {
        SpatialGrid::new(1000.0, 2000.0, 30.0, 100, 50, SpatialReference::default()).unwrap()
    }

    #[test]
    fn grid_rejects_bad_pixel_size() {
        let sr = SpatialReference::default();
        assert!(matches!(
            SpatialGrid::new(0.0, 0.0, 0.0, 1, 1, sr.clone()),
            Err(GridError::InvalidPixelSize(_))
        ));
        assert!(matches!(
            SpatialGrid::new(0.0, 0.0, f64::NAN, 1, 1, sr.clone()),
            Err(GridError::InvalidPixelSize(_))
        ));
        assert!(matches!(
            SpatialGrid::new(0.0, 0.0, 1.0, 0, 1, sr),
            Err(GridError::EmptyGrid { .. })
        ));
    }

    #[test]
    fn grid_extent_and_cells() {
        let g = grid();
        let e = g.extent();
        assert_eq!(e, Extent::new(1000.0, 500.0, 4000.0, 2000.0));

        assert_eq!(g.cell_of(1000.0, 2000.0), Some((0, 0)));
        assert_eq!(g.cell_of(1031.0, 1969.0), Some((1, 1)));
        assert_eq!(g.cell_of(999.0, 2000.0), None);
        assert_eq!(g.cell_of(4000.0, 1000.0), None);

        let (x, y) = g.cell_center(0, 0);
        assert_eq!((x, y), (1015.0, 1985.0));
        assert_eq!(g.cell_of(x, y), Some((0, 0)));
    }

    #[test]
    fn padded_grid_shifts_origin_outward() {
        let g = grid();
        let p = g.padded(5);
        assert_eq!(p.width, 110);
        assert_eq!(p.height, 60);
        assert_eq!(p.origin_x, 1000.0 - 150.0);
        assert_eq!(p.origin_y, 2000.0 + 150.0);
        assert_eq!(p.pixel_size, g.pixel_size);
        assert!(!p.is_compatible(&g));
        assert_eq!(g.padded(0), g);
    }

    #[test]
    fn compatibility_ignores_origin_only() {
        let g = grid();
        let mut shifted = g.clone();
        shifted.origin_x += 30.0;
        assert!(g.is_compatible(&shifted));
        assert!(!g.is_composable(&shifted));
        assert!(g.is_composable(&g.clone()));
    }

    #[test]
    fn epsg_code_parsing() {
        assert_eq!(SpatialReference::new("EPSG:3310").epsg_code(), Some(3310));
        assert_eq!(SpatialReference::new("epsg:4326").epsg_code(), Some(4326));
        assert_eq!(SpatialReference::new("ESRI:102003").epsg_code(), None);
        assert_eq!(SpatialReference::new("local").epsg_code(), None);
    }

    #[test]
    fn extent_from_points() {
        assert!(Extent::from_points(std::iter::empty()).is_none());
        let e = Extent::from_points([(1.0, 5.0), (-2.0, 3.0), (4.0, 9.0)]).unwrap();
        assert_eq!(e, Extent::new(-2.0, 3.0, 4.0, 9.0));
        assert_eq!(e.width(), 6.0);
        assert!(e.is_valid());
        assert!(!Extent::new(0.0, 0.0, f64::INFINITY, 1.0).is_valid());
    }
}
