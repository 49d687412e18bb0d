//! Input sources
//!
//! Road networks, population features and exit-node points are produced by
//! acquisition steps outside this crate. These traits are the seam; the
//! GeoJSON implementations read what those steps left on disk.

use crate::config::FlowscapeConfig;
use crate::context::CaseContext;
use flowscape_grid::{filter_by_points, GridError, RegionTile, TileMatrix};
use flowscape_raster::{FeatureCollection, RasterError, RoadNetwork, ValueFeature};
use std::path::PathBuf;
use tracing::{info, warn};

/// Road network of a city group at an expansion distance
pub trait NetworkSource: Send + Sync {
    /// # Errors
    /// Unreadable or empty network
    fn load(&self, city_group: &str, expand_distance: u32) -> Result<RoadNetwork, RasterError>;
}

/// Areal features carrying population totals
pub trait FeatureSource: Send + Sync {
    /// # Errors
    /// Unreadable input
    fn population(&self, city_group: &str) -> Result<Vec<ValueFeature>, RasterError>;
}

/// Points deciding which border tiles get an edge-region case
pub trait PointSource: Send + Sync {
    /// # Errors
    /// Unreadable or malformed input
    fn points(&self) -> Result<Vec<(f64, f64)>, RasterError>;
}

/// Networks read from `data_dir/network_path`
#[derive(Debug, Clone)]
pub struct GeoJsonNetworkSource {
    config: FlowscapeConfig,
}

impl GeoJsonNetworkSource {
    #[must_use]
    pub fn new(config: FlowscapeConfig) -> Self {
        Self { config }
    }
}

impl NetworkSource for GeoJsonNetworkSource {
    fn load(&self, city_group: &str, expand_distance: u32) -> Result<RoadNetwork, RasterError> {
        RoadNetwork::load(&self.config.network_file(city_group, expand_distance))
    }
}

/// Population read from `data_dir/population_path`
#[derive(Debug, Clone)]
pub struct GeoJsonFeatureSource {
    config: FlowscapeConfig,
}

impl GeoJsonFeatureSource {
    #[must_use]
    pub fn new(config: FlowscapeConfig) -> Self {
        Self { config }
    }
}

impl FeatureSource for GeoJsonFeatureSource {
    fn population(&self, city_group: &str) -> Result<Vec<ValueFeature>, RasterError> {
        let collection = FeatureCollection::read(&self.config.population_file(city_group))?;
        Ok(ValueFeature::from_collection(
            &collection,
            &self.config.population_value_property,
        ))
    }
}

/// Point features of one GeoJSON file
#[derive(Debug, Clone)]
pub struct GeoJsonPointSource {
    path: PathBuf,
}

impl GeoJsonPointSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PointSource for GeoJsonPointSource {
    fn points(&self) -> Result<Vec<(f64, f64)>, RasterError> {
        Ok(FeatureCollection::read(&self.path)?.points())
    }
}

/// Border tiles to open, restricted to those holding a point when a source
/// is given
///
/// Any failure of the point source or of the tile filter is logged and
/// answered with the full border set.
pub fn select_regions(
    ctx: &CaseContext,
    matrix: TileMatrix,
    points: Option<&dyn PointSource>,
) -> Vec<RegionTile> {
    let all = matrix.border_tiles();
    let Some(source) = points else {
        return all;
    };

    let filtered = source
        .points()
        .map_err(|e| e.to_string())
        .and_then(|pts| {
            filter_by_points(&all, matrix, &pts).map_err(|e: GridError| e.to_string())
        });
    match filtered {
        Ok(tiles) => {
            info!(
                parent: ctx.span(),
                selected = tiles.len(),
                border = all.len(),
                "border tiles restricted to exit nodes"
            );
            tiles
        }
        Err(reason) => {
            warn!(
                parent: ctx.span(),
                %reason,
                "exit nodes unusable, opening every border tile"
            );
            all
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedPoints(Vec<(f64, f64)>);

    impl PointSource for FixedPoints {
        fn points(&self) -> Result<Vec<(f64, f64)>, RasterError> {
            Ok(self.0.clone())
        }
    }

    fn ctx() -> CaseContext {
        CaseContext::detached("regions")
    }

    #[test]
    fn no_source_opens_every_border_tile() {
        let matrix = TileMatrix::new(3, 3).unwrap();
        assert_eq!(select_regions(&ctx(), matrix, None).len(), 8);
    }

    #[test]
    fn points_restrict_tiles() {
        let matrix = TileMatrix::new(3, 3).unwrap();
        // extent 0..90 both ways; (10,10) -> (0,0), (50,50) -> centre, (89,10) -> (0,2)
        let source = FixedPoints(vec![
            (0.0, 0.0),
            (90.0, 90.0),
            (10.0, 10.0),
            (50.0, 50.0),
            (89.0, 10.0),
        ]);
        let tiles = select_regions(&ctx(), matrix, Some(&source));
        assert_eq!(tiles, vec![RegionTile::new(0, 0), RegionTile::new(0, 2)]);
    }

    #[test]
    fn degenerate_points_fall_back() {
        let matrix = TileMatrix::new(3, 3).unwrap();
        let source = FixedPoints(vec![(5.0, 5.0)]);
        assert_eq!(select_regions(&ctx(), matrix, Some(&source)).len(), 8);
    }

    #[test]
    fn unreadable_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let matrix = TileMatrix::new(2, 4).unwrap();
        let source = GeoJsonPointSource::new(dir.path().join("missing.geojson"));
        assert_eq!(select_regions(&ctx(), matrix, Some(&source)).len(), 8);
    }
}
