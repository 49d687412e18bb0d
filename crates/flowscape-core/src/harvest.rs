//! Result harvesting
//!
//! Solver rasters are sampled back onto the road network and copied into
//! the case folder under names that carry the case's parameters:
//! - `<city>_network_<suffix>.geojson` with `cum_flow`, `flow_pot` and
//!   `norm_flow` on every node and edge
//! - `<raster stem>_<suffix>.tif` for each solver raster
//! - `config.ini` when the solver left one
//!
//! `<suffix>` is `r<radius>_bs<block>_t<threads>_ps<pixel>_region<label>`.

use crate::case::Case;
use crate::context::CaseContext;
use crate::error::HarvestError;
use crate::solver::{SolverOutput, SOLVER_CONFIG_SNAPSHOT};
use flowscape_raster::{geotiff, Coord, RasterLayer, RoadNetwork};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Files a harvest produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub network: PathBuf,
    pub rasters: Vec<PathBuf>,
    /// Solver config snapshot copied into the case folder
    pub config: Option<PathBuf>,
}

/// Sample, write and copy the results of one case
///
/// # Errors
/// - `HarvestError::Raster` if a solver raster cannot be read or the network
///   cannot be written
/// - `HarvestError::Io` if a copy fails
pub fn harvest(
    ctx: &CaseContext,
    case: &Case,
    network: &RoadNetwork,
    output: &SolverOutput,
) -> Result<HarvestReport, HarvestError> {
    let started = Instant::now();
    let params = case.parameters();
    let suffix = params.result_suffix(&case.region_label());
    let case_dir = case.output_location();

    let mut sampled = network.clone();
    for (path, attribute) in output.rasters() {
        let layer = geotiff::read(path)?;
        annotate(&mut sampled, &layer, attribute);
        debug!(parent: ctx.span(), raster = %path.display(), attribute, "raster sampled");
    }
    let network_path = case_dir.join(format!("{}_network_{suffix}.geojson", params.city_group));
    sampled.to_features().write(&network_path)?;

    let mut rasters = Vec::with_capacity(3);
    for (path, _) in output.rasters() {
        let target = case_dir.join(renamed(path, &suffix));
        copy(path, &target)?;
        rasters.push(target);
    }

    let snapshot = output.dir.join(SOLVER_CONFIG_SNAPSHOT);
    let config = if snapshot.is_file() {
        let target = case_dir.join(SOLVER_CONFIG_SNAPSHOT);
        copy(&snapshot, &target)?;
        Some(target)
    } else {
        None
    };

    info!(
        parent: ctx.span(),
        network = %network_path.display(),
        nodes = sampled.nodes.len(),
        edges = sampled.edges.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "results harvested"
    );
    Ok(HarvestReport {
        network: network_path,
        rasters,
        config,
    })
}

/// Write `attribute` on every node and edge of `network`
///
/// Nodes take the sample under their location; edges the mean of the
/// samples under their vertices. Points outside the raster, nodata and
/// non-finite samples are skipped; nothing left gives `null`.
pub fn annotate(network: &mut RoadNetwork, layer: &RasterLayer, attribute: &str) {
    for node in &mut network.nodes {
        let value = sample(layer, node.location);
        node.properties.insert(attribute.to_string(), to_json(value));
    }
    for edge in &mut network.edges {
        let value = mean(edge.vertices().filter_map(|c| sample(layer, c)));
        edge.properties.insert(attribute.to_string(), to_json(value));
    }
}

fn sample(layer: &RasterLayer, at: Coord) -> Option<f64> {
    let nodata = layer.nodata();
    layer
        .sample(at.x, at.y)
        .filter(|v| v.is_finite() && Some(*v) != nodata)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn to_json(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn renamed(path: &Path, suffix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{stem}_{suffix}.tif")
}

fn copy(from: &Path, to: &Path) -> Result<(), HarvestError> {
    std::fs::copy(from, to).map_err(|e| HarvestError::io(from, e))?;
    Ok(())
}
