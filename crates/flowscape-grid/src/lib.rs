//! Flowscape Grid - shared raster geometry
//!
//! Everything a case needs to agree on before any pixel is written:
//! - [`SpatialGrid`]: the aligned coordinate frame shared by every layer
//! - [`align`]: deriving that frame from a reference extent
//! - [`region`]: the tile matrix laid over the grid and its border tiles
//! - [`border`]: pure padding and opening arithmetic on raster shapes
//!
//! Nothing in this crate performs I/O.
//!
//! # Example
//!
//! ```rust
//! use flowscape_grid::{align, partition, Extent, SpatialReference};
//!
//! let extent = Extent::new(0.0, 0.0, 3000.0, 1500.0);
//! let grid = align(&extent, 30.0, SpatialReference::default()).unwrap();
//! assert_eq!((grid.width, grid.height), (100, 50));
//!
//! let tiles = partition(3, 3).unwrap();
//! assert_eq!(tiles.len(), 8);
//! ```

#![warn(unreachable_pub)]

pub mod align;
pub mod border;
pub mod error;
pub mod grid;
pub mod region;

pub use align::{align, align_to_points};
pub use border::CellWindow;
pub use error::GridError;
pub use grid::{Extent, SpatialGrid, SpatialReference};
pub use region::{filter_by_points, partition, RegionTile, TileMatrix};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
