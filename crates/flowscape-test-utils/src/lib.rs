//! Testing utilities for the flowscape workspace
//!
//! Shared fixtures: synthetic road networks, population squares, exit
//! nodes and stand-in solver commands.

#![allow(missing_docs)]

use flowscape_grid::Extent;
use flowscape_raster::{Coord, Feature, FeatureCollection, Geometry};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// Property holding population totals in the fixtures
pub const POPULATION_PROPERTY: &str = "POP100";

fn properties(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Closed square ring with its lower-left corner at `(x, y)`
pub fn square(x: f64, y: f64, size: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        Coord::new(x, y),
        Coord::new(x + size, y),
        Coord::new(x + size, y + size),
        Coord::new(x, y + size),
        Coord::new(x, y),
    ]])
}

/// `n × n` lattice of nodes `spacing` apart, joined by residential edges
///
/// The lower-left node sits at the origin.
pub fn lattice_network(n: usize, spacing: f64) -> FeatureCollection {
    let at = |i: usize, j: usize| Coord::new(i as f64 * spacing, j as f64 * spacing);
    let mut features = Vec::new();
    for i in 0..n {
        for j in 0..n {
            features.push(Feature::new(
                Geometry::Point(at(i, j)),
                properties(json!({ "osmid": i * n + j })),
            ));
        }
    }
    for i in 0..n {
        for j in 0..n {
            if i + 1 < n {
                features.push(Feature::new(
                    Geometry::LineString(vec![at(i, j), at(i + 1, j)]),
                    properties(json!({ "highway": "residential", "lanes": "1" })),
                ));
            }
            if j + 1 < n {
                features.push(Feature::new(
                    Geometry::LineString(vec![at(i, j), at(i, j + 1)]),
                    properties(json!({ "highway": ["primary", "secondary"], "lanes": 2 })),
                ));
            }
        }
    }
    FeatureCollection::new(features)
}

/// `cells × cells` squares tiling `extent`, each holding `value` people
pub fn population_squares(extent: &Extent, cells: usize, value: f64) -> FeatureCollection {
    let size = extent.width().min(extent.height()) / cells as f64;
    let mut features = Vec::with_capacity(cells * cells);
    for i in 0..cells {
        for j in 0..cells {
            features.push(Feature::new(
                square(
                    extent.min_x + i as f64 * size,
                    extent.min_y + j as f64 * size,
                    size,
                ),
                properties(json!({ POPULATION_PROPERTY: value })),
            ));
        }
    }
    FeatureCollection::new(features)
}

/// Point features at `points`
pub fn exit_nodes(points: &[(f64, f64)]) -> FeatureCollection {
    FeatureCollection::new(
        points
            .iter()
            .map(|&(x, y)| Feature::new(Geometry::Point(Coord::new(x, y)), Map::new()))
            .collect(),
    )
}

/// Write a lattice network and its population under the default path
/// templates: `<data_dir>/<city>/network_<ed>.geojson` and
/// `<data_dir>/<city>/population.geojson`
pub fn write_city(data_dir: &Path, city_group: &str, expand_distance: u32) -> PathBuf {
    let dir = data_dir.join(city_group);
    std::fs::create_dir_all(&dir).unwrap();
    lattice_network(5, 150.0)
        .write(&dir.join(format!("network_{expand_distance}.geojson")))
        .unwrap();
    let extent = Extent::new(0.0, 0.0, 600.0, 600.0);
    population_squares(&extent, 4, 250.0)
        .write(&dir.join("population.geojson"))
        .unwrap();
    dir
}

/// Solver stand-in run through `sh`: creates `<project>_out` in the case
/// folder, copies the source raster to the three output rasters and the
/// generated config to `config.ini`
pub fn fake_solver_command() -> (String, Vec<String>) {
    let script = concat!(
        "mkdir -p \"{project}_out\" && ",
        "for f in cum_currmap flow_potential normalized_cum_currmap; do ",
        "cp \"{source}\" \"{project}_out/$f.tif\"; done && ",
        "cp \"{config}\" \"{project}_out/config.ini\""
    );
    ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
}

/// Solver stand-in that exits non-zero without writing anything
pub fn failing_solver_command() -> (String, Vec<String>) {
    ("sh".to_string(), vec!["-c".to_string(), "exit 3".to_string()])
}

/// Solver stand-in that exits cleanly but leaves out one raster
pub fn incomplete_solver_command() -> (String, Vec<String>) {
    let script = concat!(
        "mkdir -p \"{project}_out\" && ",
        "cp \"{source}\" \"{project}_out/cum_currmap.tif\""
    );
    ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
}
