//! Layer generation
//!
//! Produces the three solver inputs of a case on one shared grid:
//! - density: population spread over the unpadded grid, then border-transformed
//! - capacity: road capacity burned onto the transformed grid, NaN elsewhere
//! - condition: `Int8` ones with the added padding ring set to 2
//!
//! Every output goes through an [`ArtifactStore`]; an artifact already in the
//! store is returned as is.

use crate::error::RasterError;
use crate::network::RoadNetwork;
use crate::raster::{RasterBand, RasterLayer};
use crate::rasterize::{burn_density, burn_lines};
use crate::store::{ArtifactKey, ArtifactKind, ArtifactStore};
use crate::transform::BorderTransform;
use crate::vector::{Coord, ValueFeature};
use flowscape_grid::border::in_padding_ring;
use flowscape_grid::{align, GridError, SpatialGrid, SpatialReference};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Span};

/// Solver input layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Source strength (population density)
    Density,
    /// Conductance (road capacity)
    Capacity,
    /// Boundary condition
    Condition,
}

impl LayerKind {
    pub const ALL: [Self; 3] = [Self::Density, Self::Capacity, Self::Condition];

    #[must_use]
    pub fn artifact_kind(self) -> ArtifactKind {
        match self {
            Self::Density => ArtifactKind::Density,
            Self::Capacity => ArtifactKind::Capacity,
            Self::Condition => ArtifactKind::Condition,
        }
    }
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.artifact_kind().fmt(f)
    }
}

/// Identity of one case as far as its layers are concerned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRequest {
    pub city_group: String,
    pub pixel_size: u32,
    pub population_edge_buffer: u32,
    pub population_edge_buffer_value: f32,
    pub conductance_edge_buffer: u32,
    /// `i_j` for edge-region cases, `full` otherwise
    pub region_label: String,
    pub transform: BorderTransform,
    pub spatial_reference: SpatialReference,
}

impl LayerRequest {
    /// Artifact key of the grid shared by all layers of the case
    #[must_use]
    pub fn grid_key(&self) -> ArtifactKey {
        ArtifactKey::new(
            ArtifactKind::Grid,
            format!("{}_grid_{}m.json", self.city_group, self.pixel_size),
        )
    }

    /// Artifact key of one layer
    #[must_use]
    pub fn layer_key(&self, kind: LayerKind) -> ArtifactKey {
        let (city, px, region) = (&self.city_group, self.pixel_size, &self.region_label);
        let name = match kind {
            LayerKind::Density => format!(
                "{city}_population_{px}m_border{}_value{}_region{region}.tif",
                self.population_edge_buffer, self.population_edge_buffer_value
            ),
            LayerKind::Capacity => format!(
                "{city}_conductance_{px}m_buffer{}_region{region}.tif",
                self.conductance_edge_buffer
            ),
            LayerKind::Condition => format!(
                "{city}_condition_{px}m_buffer{}_region{region}.tif",
                self.population_edge_buffer
            ),
        };
        ArtifactKey::new(kind.artifact_kind(), name)
    }
}

/// Vector inputs shared by all cases of a city group
#[derive(Debug, Clone, Copy)]
pub struct LayerInputs<'a> {
    pub network: &'a RoadNetwork,
    pub population: &'a [ValueFeature],
}

/// Result of a generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerArtifact {
    pub path: PathBuf,
    /// Served from the store without recomputation
    pub reused: bool,
}

/// Memoizing layer generator over an artifact store
#[derive(Clone)]
pub struct LayerGenerator {
    store: Arc<dyn ArtifactStore>,
}

impl fmt::Debug for LayerGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerGenerator").finish_non_exhaustive()
    }
}

impl LayerGenerator {
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Unpadded grid of the case, aligned to the road network's extent
    ///
    /// # Errors
    /// - `RasterError::Grid(GridError::NoInputGeometry)` for an empty network
    /// - store failures
    pub fn grid(
        &self,
        span: &Span,
        request: &LayerRequest,
        network: &RoadNetwork,
    ) -> Result<SpatialGrid, RasterError> {
        let key = request.grid_key();
        if let Some(grid) = self.store.get_grid(&key)? {
            debug!(parent: span, artifact = %key, "grid reused");
            return Ok(grid);
        }
        let extent = network.extent().ok_or(GridError::NoInputGeometry)?;
        let grid = align(
            &extent,
            f64::from(request.pixel_size),
            request.spatial_reference.clone(),
        )?;
        let path = self.store.put_grid(&key, &grid)?;
        info!(
            parent: span,
            width = grid.width,
            height = grid.height,
            path = %path.display(),
            "grid aligned"
        );
        Ok(grid)
    }

    /// Generate one layer, or return the stored one
    ///
    /// # Errors
    /// - `RasterError::EmptyFeatureSet` when the layer's inputs are empty
    /// - grid and store failures
    pub fn generate(
        &self,
        span: &Span,
        request: &LayerRequest,
        kind: LayerKind,
        inputs: LayerInputs<'_>,
    ) -> Result<LayerArtifact, RasterError> {
        let key = request.layer_key(kind);
        if self.store.contains(&key) {
            debug!(parent: span, layer = %kind, artifact = %key, "layer reused");
            return Ok(LayerArtifact {
                path: self.store.locate(&key),
                reused: true,
            });
        }

        let started = Instant::now();
        let base = self.grid(span, request, inputs.network)?;
        let layer = match kind {
            LayerKind::Density => density_layer(&base, &request.transform, inputs.population)?,
            LayerKind::Capacity => capacity_layer(
                &base,
                &request.transform,
                inputs.network,
                f64::from(request.conductance_edge_buffer),
            )?,
            LayerKind::Condition => condition_layer(&base, &request.transform)?,
        };
        let path = self.store.put_raster(&key, &layer)?;

        let stats = layer.stats();
        info!(
            parent: span,
            layer = %kind,
            width = layer.grid().width,
            height = layer.grid().height,
            min = stats.map(|s| s.min),
            max = stats.map(|s| s.max),
            mean = stats.map(|s| s.mean),
            elapsed_ms = started.elapsed().as_millis() as u64,
            path = %path.display(),
            "layer generated"
        );
        Ok(LayerArtifact {
            path,
            reused: false,
        })
    }
}

/// Density on the base grid, then the case's border transform
///
/// # Errors
/// `RasterError::EmptyFeatureSet` without population features
pub fn density_layer(
    base: &SpatialGrid,
    transform: &BorderTransform,
    population: &[ValueFeature],
) -> Result<RasterLayer, RasterError> {
    if population.is_empty() {
        return Err(RasterError::EmptyFeatureSet("density".into()));
    }
    let data = burn_density(base, population, 0.0);
    let layer = RasterLayer::new(base.clone(), RasterBand::Float32(data), None)?;
    transform.apply(layer)
}

/// Road capacity on the transformed grid
///
/// # Errors
/// `RasterError::EmptyFeatureSet` when no edge has a positive capacity
pub fn capacity_layer(
    base: &SpatialGrid,
    transform: &BorderTransform,
    network: &RoadNetwork,
    edge_buffer: f64,
) -> Result<RasterLayer, RasterError> {
    let lines: Vec<(Vec<&[Coord]>, f32)> = network
        .burnable_edges()
        .map(|e| {
            #[allow(clippy::cast_possible_truncation)]
            let capacity = e.capacity as f32;
            (e.parts.iter().map(Vec::as_slice).collect(), capacity)
        })
        .collect();
    if lines.is_empty() {
        return Err(RasterError::EmptyFeatureSet("capacity".into()));
    }
    let grid = transform.apply_to_grid(base);
    let data = burn_lines(&grid, &lines, edge_buffer, f32::NAN);
    RasterLayer::new(grid, RasterBand::Float32(data), Some(f64::NAN))
}

/// Ones on the transformed grid, twos on the ring the transform added
///
/// # Errors
/// `RasterError::ShapeMismatch` if the band disagrees with the padded grid
pub fn condition_layer(
    base: &SpatialGrid,
    transform: &BorderTransform,
) -> Result<RasterLayer, RasterError> {
    let grid = transform.apply_to_grid(base);
    let shape = grid.shape();
    let ring = transform.buffer();
    let data = Array2::from_shape_fn(shape, |(row, col)| {
        if in_padding_ring(row, col, shape, ring) {
            2
        } else {
            1
        }
    });
    RasterLayer::new(grid, RasterBand::Int8(data), None)
}
