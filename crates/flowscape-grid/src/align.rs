//! Grid alignment
//!
//! Derives the canonical grid of a case from the bounding extent of its
//! reference geometry. Every layer of the case is written on this grid (or
//! on a padded copy of it), which is what keeps them byte-aligned.

use crate::error::GridError;
use crate::grid::{Extent, SpatialGrid, SpatialReference};

/// Align a grid to an extent
///
/// Width and height are `max(1, floor(span / pixel_size))` per axis; the
/// origin is the extent's top-left corner. Floor truncation means the
/// east and south edges may fall short of the extent by less than one pixel.
///
/// # Errors
/// - `GridError::InvalidPixelSize` for a non-positive or non-finite pixel size
/// - `GridError::InvalidExtent` for non-finite or inverted bounds
pub fn align(
    extent: &Extent,
    pixel_size: f64,
    spatial_reference: SpatialReference,
) -> Result<SpatialGrid, GridError> {
    if !pixel_size.is_finite() || pixel_size <= 0.0 {
        return Err(GridError::InvalidPixelSize(pixel_size));
    }
    if !extent.is_valid() {
        return Err(GridError::InvalidExtent(format!("{extent:?}")));
    }

    let width = cells_along(extent.width(), pixel_size);
    let height = cells_along(extent.height(), pixel_size);

    SpatialGrid::new(
        extent.min_x,
        extent.max_y,
        pixel_size,
        width,
        height,
        spatial_reference,
    )
}

/// Align a grid to the bounding extent of a point cloud
///
/// # Errors
/// - `GridError::NoInputGeometry` when `points` is empty
/// - anything [`align`] reports
pub fn align_to_points<I>(
    points: I,
    pixel_size: f64,
    spatial_reference: SpatialReference,
) -> Result<SpatialGrid, GridError>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let extent = Extent::from_points(points).ok_or(GridError::NoInputGeometry)?;
    align(&extent, pixel_size, spatial_reference)
}

#[inline]
fn cells_along(span: f64, pixel_size: f64) -> usize {
    let cells = (span / pixel_size).floor();
    if cells < 1.0 {
        1
    } else {
        cells as usize
    }
}
