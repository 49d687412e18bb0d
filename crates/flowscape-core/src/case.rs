//! Case matrix
//!
//! Every parameter set expands into:
//! - one `no_border` case
//! - one `with_border` case
//! - one `edge_region` case per selected border tile
//!
//! Each case owns a folder `<run_folder>/<case_type>_<region|full>`, so no
//! two cases of a run ever write the same path.

use crate::error::FlowscapeError;
use crate::params::ParameterSet;
use chrono::{DateTime, Local};
use flowscape_grid::{GridError, RegionTile, SpatialReference, TileMatrix};
use flowscape_raster::{BorderTransform, LayerRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Border handling of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    NoBorder,
    WithBorder,
    EdgeRegion,
}

impl CaseType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoBorder => "no_border",
            Self::WithBorder => "with_border",
            Self::EdgeRegion => "edge_region",
        }
    }
}

impl Display for CaseType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work: a parameter set, a case type and its folder
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    case_type: CaseType,
    region: Option<RegionTile>,
    matrix: TileMatrix,
    parameters: Arc<ParameterSet>,
    output_location: PathBuf,
}

impl Case {
    #[inline]
    #[must_use]
    pub fn case_type(&self) -> CaseType {
        self.case_type
    }

    /// Opened tile; `Some` exactly for edge-region cases
    #[inline]
    #[must_use]
    pub fn region(&self) -> Option<RegionTile> {
        self.region
    }

    #[inline]
    #[must_use]
    pub fn matrix(&self) -> TileMatrix {
        self.matrix
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Case folder
    #[inline]
    #[must_use]
    pub fn output_location(&self) -> &Path {
        &self.output_location
    }

    /// `i_j` or `full`
    #[must_use]
    pub fn region_label(&self) -> String {
        self.region
            .map_or_else(|| "full".to_string(), |tile| tile.to_string())
    }

    /// `<case_type>_<region|full>`, also the folder name
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}_{}", self.case_type, self.region_label())
    }

    /// Border transform applied to the case's density layer
    #[must_use]
    pub fn transform(&self) -> BorderTransform {
        let buffer = self.parameters.population_edge_buffer as usize;
        let value = self.parameters.population_edge_buffer_value;
        match (self.case_type, self.region) {
            (CaseType::NoBorder, _) => BorderTransform::None,
            (CaseType::WithBorder, _) | (CaseType::EdgeRegion, None) => {
                BorderTransform::Pad { buffer, value }
            }
            (CaseType::EdgeRegion, Some(tile)) => BorderTransform::Opening {
                buffer,
                value,
                tile,
                matrix: self.matrix,
            },
        }
    }

    /// Layer identity of this case
    #[must_use]
    pub fn layer_request(&self, spatial_reference: SpatialReference) -> LayerRequest {
        let p = &self.parameters;
        LayerRequest {
            city_group: p.city_group.clone(),
            pixel_size: p.pixel_size,
            population_edge_buffer: p.population_edge_buffer,
            population_edge_buffer_value: p.population_edge_buffer_value,
            conductance_edge_buffer: p.conductance_edge_buffer,
            region_label: self.region_label(),
            transform: self.transform(),
            spatial_reference,
        }
    }
}

/// Expand one parameter set into its ordered cases
///
/// Duplicate candidate tiles are dropped, keeping the first occurrence.
///
/// # Errors
/// `GridError::TileOutOfRange` for a candidate outside `matrix`
pub fn build(
    parameters: &ParameterSet,
    matrix: TileMatrix,
    candidate_tiles: &[RegionTile],
    run_folder: &RunFolder,
) -> Result<Vec<Case>, GridError> {
    let parameters = Arc::new(parameters.clone());
    let mut seen = HashSet::new();
    let mut tiles = Vec::with_capacity(candidate_tiles.len());
    for &tile in candidate_tiles {
        matrix.check(tile)?;
        if seen.insert(tile) {
            tiles.push(tile);
        }
    }

    let make = |case_type: CaseType, region: Option<RegionTile>| {
        let mut case = Case {
            case_type,
            region,
            matrix,
            parameters: Arc::clone(&parameters),
            output_location: PathBuf::new(),
        };
        case.output_location = run_folder.path().join(case.label());
        case
    };

    let mut cases = Vec::with_capacity(2 + tiles.len());
    cases.push(make(CaseType::NoBorder, None));
    cases.push(make(CaseType::WithBorder, None));
    cases.extend(tiles.into_iter().map(|t| make(CaseType::EdgeRegion, Some(t))));
    Ok(cases)
}

/// Folder holding every case of one parameter set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFolder {
    path: PathBuf,
}

impl RunFolder {
    /// `<YYYYmmdd_HHMM>_<city_group>_<encoded parameters>`
    #[must_use]
    pub fn name_for(parameters: &ParameterSet, at: &DateTime<Local>) -> String {
        format!(
            "{}_{}_{}",
            at.format("%Y%m%d_%H%M"),
            parameters.city_group,
            parameters.encode()
        )
    }

    /// Folder under `root` without touching the filesystem
    #[must_use]
    pub fn at(root: &Path, parameters: &ParameterSet, at: &DateTime<Local>) -> Self {
        Self {
            path: root.join(Self::name_for(parameters, at)),
        }
    }

    /// Create the folder for `parameters`, stamped with the current time
    ///
    /// An existing folder is reused.
    ///
    /// # Errors
    /// `FlowscapeError::Io` if the folder cannot be created
    pub fn create(root: &Path, parameters: &ParameterSet) -> Result<Self, FlowscapeError> {
        let folder = Self::at(root, parameters, &Local::now());
        std::fs::create_dir_all(&folder.path).map_err(|e| FlowscapeError::io(&folder.path, e))?;
        Ok(folder)
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flowscape_grid::partition;
    use tempfile::TempDir;

    fn params() -> ParameterSet {
        ParameterSet {
            city_group: "bay".into(),
            expand_distance: 0,
            pixel_size: 30,
            conductance_edge_buffer: 1,
            population_edge_buffer: 5,
            population_edge_buffer_value: 1.0,
            threads: 4,
            radius: 50,
            block_size: 1,
        }
    }

    fn folder() -> RunFolder {
        RunFolder {
            path: PathBuf::from("/runs/r"),
        }
    }

    #[test]
    fn matrix_has_two_base_cases_then_tiles() {
        let matrix = TileMatrix::new(3, 3).unwrap();
        let tiles = partition(3, 3).unwrap();
        let cases = build(&params(), matrix, &tiles, &folder()).unwrap();

        assert_eq!(cases.len(), 2 + tiles.len());
        assert_eq!(cases[0].case_type(), CaseType::NoBorder);
        assert_eq!(cases[1].case_type(), CaseType::WithBorder);
        assert!(cases[..2].iter().all(|c| c.region().is_none()));
        assert!(cases[2..]
            .iter()
            .all(|c| c.case_type() == CaseType::EdgeRegion && c.region().is_some()));
        assert_eq!(cases[2].output_location(), Path::new("/runs/r/edge_region_0_0"));
        assert_eq!(cases[0].output_location(), Path::new("/runs/r/no_border_full"));
    }

    #[test]
    fn duplicate_tiles_are_ignored() {
        let matrix = TileMatrix::new(3, 3).unwrap();
        let tiles = [RegionTile::new(0, 1), RegionTile::new(0, 1), RegionTile::new(2, 2)];
        let cases = build(&params(), matrix, &tiles, &folder()).unwrap();
        assert_eq!(cases.len(), 4);
        let labels: HashSet<String> = cases.iter().map(Case::label).collect();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn out_of_range_tile_is_rejected() {
        let matrix = TileMatrix::new(2, 2).unwrap();
        assert!(build(&params(), matrix, &[RegionTile::new(2, 0)], &folder()).is_err());
    }

    #[test]
    fn transforms_follow_case_type() {
        let matrix = TileMatrix::new(3, 3).unwrap();
        let cases = build(&params(), matrix, &[RegionTile::new(0, 1)], &folder()).unwrap();
        assert_eq!(cases[0].transform(), BorderTransform::None);
        assert_eq!(
            cases[1].transform(),
            BorderTransform::Pad {
                buffer: 5,
                value: 1.0
            }
        );
        assert_eq!(cases[2].transform().buffer(), 5);

        let request = cases[2].layer_request(SpatialReference::default());
        assert_eq!(request.region_label, "0_1");
    }

    #[test]
    fn run_folder_name_encodes_time_and_parameters() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(
            RunFolder::name_for(&params(), &at),
            "20240309_1405_bay_ed0_pix30_ceb1_peb5_pebv1_r50_bs1_t4"
        );
    }

    #[test]
    fn run_folder_create_is_reentrant() {
        let dir = TempDir::new().unwrap();
        let folder = RunFolder::create(dir.path(), &params()).unwrap();
        assert!(folder.path().is_dir());
        std::fs::create_dir_all(folder.path()).unwrap();
    }
}
