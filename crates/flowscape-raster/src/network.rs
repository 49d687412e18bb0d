//! Road network
//!
//! Nodes are point features, edges are line features. Edges carry a
//! capacity, either given as a numeric `capacity` property or assigned from
//! the highway class table in [`crate::capacity`].

use crate::capacity::{assign_capacity, normalize_highway, parse_lanes};
use crate::error::RasterError;
use crate::vector::{Coord, Feature, FeatureCollection, Geometry};
use flowscape_grid::Extent;
use serde_json::{Map, Value};
use std::path::Path;

/// Network node
#[derive(Debug, Clone, PartialEq)]
pub struct RoadNode {
    pub location: Coord,
    pub properties: Map<String, Value>,
}

/// Network edge
#[derive(Debug, Clone, PartialEq)]
pub struct RoadEdge {
    /// One polyline per part
    pub parts: Vec<Vec<Coord>>,
    pub highway: Option<String>,
    pub lanes: Option<f64>,
    pub capacity: f64,
    pub properties: Map<String, Value>,
}

impl RoadEdge {
    /// All vertices of all parts
    pub fn vertices(&self) -> impl Iterator<Item = Coord> + '_ {
        self.parts.iter().flatten().copied()
    }

    /// Geometry of the edge as written back to GeoJSON
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        match self.parts.as_slice() {
            [single] => Geometry::LineString(single.clone()),
            parts => Geometry::MultiLineString(parts.to_vec()),
        }
    }
}

/// Nodes and edges of one city group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoadNetwork {
    pub nodes: Vec<RoadNode>,
    pub edges: Vec<RoadEdge>,
}

impl RoadNetwork {
    /// Build from a feature collection
    ///
    /// Point and multipoint features become nodes, line features become
    /// edges; everything else is ignored.
    ///
    /// # Errors
    /// `RasterError::EmptyFeatureSet` when the collection has neither
    pub fn from_features(collection: &FeatureCollection) -> Result<Self, RasterError> {
        let mut network = Self::default();
        for feature in &collection.features {
            let properties = feature.properties.clone().unwrap_or_default();
            match &feature.geometry {
                Some(Geometry::Point(c)) => network.nodes.push(RoadNode {
                    location: *c,
                    properties,
                }),
                Some(Geometry::MultiPoint(cs)) => {
                    network.nodes.extend(cs.iter().map(|c| RoadNode {
                        location: *c,
                        properties: properties.clone(),
                    }));
                }
                Some(g @ (Geometry::LineString(_) | Geometry::MultiLineString(_))) => {
                    let parts: Vec<Vec<Coord>> =
                        g.line_parts().into_iter().map(<[Coord]>::to_vec).collect();
                    network.edges.push(edge_from(parts, properties));
                }
                _ => {}
            }
        }
        if network.nodes.is_empty() && network.edges.is_empty() {
            return Err(RasterError::EmptyFeatureSet("road network".into()));
        }
        Ok(network)
    }

    /// Load a GeoJSON road network
    ///
    /// # Errors
    /// Anything [`FeatureCollection::read`] or [`Self::from_features`] reports
    pub fn load(path: &Path) -> Result<Self, RasterError> {
        Self::from_features(&FeatureCollection::read(path)?)
    }

    /// Extent covering every node and every edge vertex
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        let nodes = self.nodes.iter().map(|n| (n.location.x, n.location.y));
        let vertices = self
            .edges
            .iter()
            .flat_map(RoadEdge::vertices)
            .map(|c| (c.x, c.y));
        Extent::from_points(nodes.chain(vertices))
    }

    /// Edges that contribute to the conductance layer
    pub fn burnable_edges(&self) -> impl Iterator<Item = &RoadEdge> {
        self.edges.iter().filter(|e| e.capacity > 0.0)
    }

    /// Nodes then edges as features; `capacity` is written on each edge
    #[must_use]
    pub fn to_features(&self) -> FeatureCollection {
        let nodes = self.nodes.iter().map(|n| {
            Feature::new(Geometry::Point(n.location), n.properties.clone())
        });
        let edges = self.edges.iter().map(|e| {
            let mut properties = e.properties.clone();
            properties.insert("capacity".into(), Value::from(e.capacity));
            Feature::new(e.geometry(), properties)
        });
        FeatureCollection::new(nodes.chain(edges).collect())
    }
}

fn edge_from(parts: Vec<Vec<Coord>>, properties: Map<String, Value>) -> RoadEdge {
    let highway = properties.get("highway").and_then(normalize_highway);
    let lanes = properties.get("lanes").and_then(parse_lanes);
    let given = properties
        .get("capacity")
        .and_then(crate::vector::value_as_f64)
        .filter(|c| c.is_finite());
    let capacity = given.unwrap_or_else(|| assign_capacity(highway.as_deref(), lanes));
    RoadEdge {
        parts,
        highway,
        lanes,
        capacity,
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> FeatureCollection {
        serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                 "properties": {"osmid": 1}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [100.0, 50.0]},
                 "properties": {"osmid": 2}},
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [100.0, 50.0]]},
                 "properties": {"highway": "primary", "lanes": "2"}},
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.0, 50.0]]},
                 "properties": {"highway": "footway"}},
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [50.0, 0.0]]},
                 "properties": {"highway": "service", "capacity": 123.0}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builds_nodes_edges_and_capacity() {
        let network = RoadNetwork::from_features(&collection()).unwrap();
        assert_eq!(network.nodes.len(), 2);
        assert_eq!(network.edges.len(), 3);
        assert_eq!(network.edges[0].capacity, 2000.0);
        assert_eq!(network.edges[1].capacity, 0.0);
        assert_eq!(network.edges[2].capacity, 123.0);
        assert_eq!(network.burnable_edges().count(), 2);
        assert_eq!(network.extent(), Some(Extent::new(0.0, 0.0, 100.0, 50.0)));
    }

    #[test]
    fn extent_includes_edge_vertices_outside_nodes() {
        let fc: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
                 "properties": {}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [300.0, 150.0]},
                 "properties": {}},
                {"type": "Feature",
                 "geometry": {"type": "LineString",
                              "coordinates": [[0.0, 0.0], [280.0, 400.0], [600.0, 75.0]]},
                 "properties": {"highway": "primary"}}
            ]
        }))
        .unwrap();
        let network = RoadNetwork::from_features(&fc).unwrap();
        assert_eq!(network.extent(), Some(Extent::new(0.0, 0.0, 600.0, 400.0)));
    }

    #[test]
    fn empty_collection_is_input_error() {
        let err = RoadNetwork::from_features(&FeatureCollection::default()).unwrap_err();
        assert!(err.is_input_data());
    }

    #[test]
    fn features_round_trip_capacity() {
        let network = RoadNetwork::from_features(&collection()).unwrap();
        let fc = network.to_features();
        assert_eq!(fc.features.len(), 5);
        assert_eq!(fc.features[2].property_f64("capacity"), Some(2000.0));
    }
}
