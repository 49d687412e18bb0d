//! Burning vector features onto a grid
//!
//! Pixels are tested at their centre. Rows are processed in parallel with
//! `rayon`; within a row features are visited in caller order, so where
//! features overlap the last one wins.

use crate::vector::{polyline_distance, Coord, Geometry, ValueFeature};
use flowscape_grid::{CellWindow, Extent, SpatialGrid};
use ndarray::Array2;
use rayon::prelude::*;

/// Density surface: each polygon spreads its value evenly over its area
///
/// A pixel whose centre lies in a feature gets
/// `value × pixel_area / feature_area`. Features with zero area are
/// skipped. Untouched pixels hold `fill`.
#[must_use]
pub fn burn_density(grid: &SpatialGrid, features: &[ValueFeature], fill: f32) -> Array2<f32> {
    let shapes: Vec<(CellWindow, &Geometry, f32)> = features
        .iter()
        .filter_map(|f| {
            let area = f.geometry.area();
            if area <= 0.0 || !f.value.is_finite() {
                return None;
            }
            let window = pixel_window(grid, &f.geometry.extent()?, 0.0)?;
            #[allow(clippy::cast_possible_truncation)]
            let density = (f.value * grid.pixel_area() / area) as f32;
            Some((window, &f.geometry, density))
        })
        .collect();

    burn_rows(grid, fill, |row, col, x, y| {
        shapes
            .iter()
            .rev()
            .find(|(w, g, _)| w.contains(row, col) && g.contains(x, y))
            .map(|(_, _, v)| *v)
    })
}

/// Line burn: pixels within `reach` of an edge take its value
///
/// `reach` is clamped up to half a pixel, which burns every cell whose centre
/// lies within half a pixel of the line. A line that only clips a cell's
/// corner can stay further than that from the centre (up to `px / √2`) and
/// leaves the cell untouched. Untouched pixels hold `fill`.
#[must_use]
pub fn burn_lines(
    grid: &SpatialGrid,
    lines: &[(Vec<&[Coord]>, f32)],
    reach: f64,
    fill: f32,
) -> Array2<f32> {
    let reach = reach.max(grid.pixel_size / 2.0);
    let shapes: Vec<(CellWindow, &Vec<&[Coord]>, f32)> = lines
        .iter()
        .filter_map(|(parts, value)| {
            let extent = Extent::from_points(
                parts.iter().flat_map(|p| p.iter()).map(|c| (c.x, c.y)),
            )?;
            let window = pixel_window(grid, &extent, reach)?;
            Some((window, parts, *value))
        })
        .collect();

    burn_rows(grid, fill, |row, col, x, y| {
        shapes
            .iter()
            .rev()
            .find(|(w, parts, _)| {
                w.contains(row, col)
                    && parts.iter().any(|p| polyline_distance(x, y, p) <= reach)
            })
            .map(|(_, _, v)| *v)
    })
}

fn burn_rows<F>(grid: &SpatialGrid, fill: f32, value_at: F) -> Array2<f32>
where
    F: Fn(usize, usize, f64, f64) -> Option<f32> + Sync,
{
    let (rows, cols) = grid.shape();
    let mut data = vec![fill; rows * cols];
    data.par_chunks_mut(cols)
        .enumerate()
        .for_each(|(row, line)| {
            for (col, cell) in line.iter_mut().enumerate() {
                let (x, y) = grid.cell_center(row, col);
                if let Some(v) = value_at(row, col, x, y) {
                    *cell = v;
                }
            }
        });
    // rows * cols elements by construction
    Array2::from_shape_vec((rows, cols), data).unwrap_or_else(|_| Array2::from_elem((rows, cols), fill))
}

/// Cells whose centres may fall within `margin` of an extent, clamped to
/// the grid; `None` when disjoint
fn pixel_window(grid: &SpatialGrid, extent: &Extent, margin: f64) -> Option<CellWindow> {
    let (rows, cols) = grid.shape();
    let (top, left) = grid.to_pixel(extent.min_x - margin, extent.max_y + margin);
    let (bottom, right) = grid.to_pixel(extent.max_x + margin, extent.min_y - margin);

    let clamp = |v: f64, hi: usize| -> usize {
        if v.is_nan() || v <= 0.0 {
            0
        } else {
            (v as usize).min(hi)
        }
    };
    let window = CellWindow::new(
        (clamp(top.floor(), rows), clamp(bottom.ceil(), rows)),
        (clamp(left.floor(), cols), clamp(right.ceil(), cols)),
    );
    (!window.is_empty()).then_some(window)
}
