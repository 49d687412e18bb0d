//! Flowscape Raster - layers on a shared grid
//!
//! Turns vector inputs into the aligned rasters a solver case needs.
//!
//! # Core Concepts
//!
//! - [`RasterLayer`]: one band on a [`flowscape_grid::SpatialGrid`]
//! - [`BorderTransform`]: no border, padded border, or padded border with one opening
//! - [`LayerGenerator`]: density, capacity and condition layers, memoized
//! - [`ArtifactStore`]: where layers and grids are cached
//! - [`RoadNetwork`]: nodes and capacity-weighted edges read from GeoJSON
//!
//! # Example
//!
//! ```rust
//! use flowscape_grid::{SpatialGrid, SpatialReference};
//! use flowscape_raster::{BorderTransform, RasterLayer};
//!
//! let grid = SpatialGrid::new(0.0, 300.0, 30.0, 10, 10, SpatialReference::default()).unwrap();
//! let layer = RasterLayer::filled_f32(grid, 1.0, None);
//! let padded = BorderTransform::Pad { buffer: 5, value: 0.5 }.apply(layer).unwrap();
//! assert_eq!(padded.grid().shape(), (20, 20));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod capacity;
pub mod error;
pub mod geotiff;
pub mod layer;
pub mod network;
pub mod raster;
pub mod rasterize;
pub mod store;
pub mod transform;
pub mod vector;

pub use error::RasterError;
pub use layer::{LayerArtifact, LayerGenerator, LayerInputs, LayerKind, LayerRequest};
pub use network::{RoadEdge, RoadNetwork, RoadNode};
pub use raster::{LayerStats, NumericKind, RasterBand, RasterLayer};
pub use store::{ArtifactKey, ArtifactKind, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use transform::BorderTransform;
pub use vector::{Coord, Feature, FeatureCollection, Geometry, ValueFeature};
