//! Vector features
//!
//! A small GeoJSON model covering what the pipeline reads and writes:
//! points (nodes, exit locations), line strings (road edges) and polygons
//! (population areas). Coordinates are taken as already projected.

use crate::error::RasterError;
use flowscape_grid::Extent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Planar coordinate; extra ordinates (z, m) are dropped on read
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl TryFrom<Vec<f64>> for Coord {
    type Error = String;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        match value.as_slice() {
            [x, y, ..] => Ok(Self::new(*x, *y)),
            _ => Err(format!("position needs two ordinates, got {}", value.len())),
        }
    }
}

impl From<Coord> for [f64; 2] {
    fn from(c: Coord) -> Self {
        [c.x, c.y]
    }
}

/// GeoJSON geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    Polygon(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Vec<Vec<Coord>>>),
}

impl Geometry {
    /// Every vertex, in document order
    #[must_use]
    pub fn vertices(&self) -> Vec<Coord> {
        match self {
            Self::Point(c) => vec![*c],
            Self::MultiPoint(cs) | Self::LineString(cs) => cs.clone(),
            Self::MultiLineString(parts) | Self::Polygon(parts) => {
                parts.iter().flatten().copied().collect()
            }
            Self::MultiPolygon(polys) => polys.iter().flatten().flatten().copied().collect(),
        }
    }

    /// Bounding extent, `None` without vertices
    #[must_use]
    pub fn extent(&self) -> Option<Extent> {
        Extent::from_points(self.vertices().into_iter().map(|c| (c.x, c.y)))
    }

    /// Line parts of a linear geometry; empty for other kinds
    #[must_use]
    pub fn line_parts(&self) -> Vec<&[Coord]> {
        match self {
            Self::LineString(cs) => vec![cs.as_slice()],
            Self::MultiLineString(parts) => parts.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        }
    }

    /// Polygon area (outer rings minus holes); zero for non-areal kinds
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            Self::Polygon(rings) => polygon_area(rings),
            Self::MultiPolygon(polys) => polys.iter().map(|p| polygon_area(p)).sum(),
            _ => 0.0,
        }
    }

    /// Point inside an areal geometry (even-odd rule, holes honoured)
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Polygon(rings) => polygon_contains(rings, x, y),
            Self::MultiPolygon(polys) => polys.iter().any(|p| polygon_contains(p, x, y)),
            _ => false,
        }
    }

    /// Areal geometry kind
    #[inline]
    #[must_use]
    pub fn is_areal(&self) -> bool {
        matches!(self, Self::Polygon(_) | Self::MultiPolygon(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum CollectionTag {
    #[default]
    FeatureCollection,
}

/// GeoJSON feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    tag: FeatureTag,
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl Feature {
    /// Feature with properties
    #[must_use]
    pub fn new(geometry: Geometry, properties: Map<String, Value>) -> Self {
        Self {
            tag: FeatureTag::Feature,
            geometry: Some(geometry),
            properties: Some(properties),
        }
    }

    /// Raw property value
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.as_ref()?.get(name)
    }

    /// Numeric property; numeric strings are accepted
    #[must_use]
    pub fn property_f64(&self, name: &str) -> Option<f64> {
        self.property(name).and_then(value_as_f64)
    }
}

/// GeoJSON feature collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    tag: CollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            tag: CollectionTag::FeatureCollection,
            features,
        }
    }

    /// Read a collection from a GeoJSON file
    ///
    /// # Errors
    /// `RasterError::Io` if unreadable, `RasterError::Json` if malformed
    pub fn read(path: &Path) -> Result<Self, RasterError> {
        let file = File::open(path).map_err(|e| RasterError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| RasterError::json(path, e))
    }

    /// Write the collection as GeoJSON
    ///
    /// # Errors
    /// `RasterError::Io` or `RasterError::Json`
    pub fn write(&self, path: &Path) -> Result<(), RasterError> {
        let file = File::create(path).map_err(|e| RasterError::io(path, e))?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|e| RasterError::json(path, e))
    }

    /// Every point geometry's coordinates (points and multipoints)
    #[must_use]
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| match g {
                Geometry::Point(c) => vec![(c.x, c.y)],
                Geometry::MultiPoint(cs) => cs.iter().map(|c| (c.x, c.y)).collect(),
                _ => Vec::new(),
            })
            .collect()
    }
}

/// Areal feature carrying a total quantity (e.g. residents of a block)
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFeature {
    pub geometry: Geometry,
    pub value: f64,
}

impl ValueFeature {
    #[must_use]
    pub fn new(geometry: Geometry, value: f64) -> Self {
        Self { geometry, value }
    }

    /// Areal features with a numeric `property`, in collection order
    ///
    /// Features without geometry, non-areal features and features missing
    /// the property are skipped.
    #[must_use]
    pub fn from_collection(collection: &FeatureCollection, property: &str) -> Vec<Self> {
        collection
            .features
            .iter()
            .filter_map(|f| {
                let geometry = f.geometry.as_ref().filter(|g| g.is_areal())?;
                let value = f.property_f64(property)?;
                Some(Self::new(geometry.clone(), value))
            })
            .collect()
    }
}

/// Numeric view of a JSON value; numeric strings are parsed
#[must_use]
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unsigned shoelace area of a ring
#[must_use]
pub fn ring_area(ring: &[Coord]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (a, b) in ring.iter().zip(ring.iter().cycle().skip(1)) {
        twice += a.x * b.y - b.x * a.y;
    }
    (twice / 2.0).abs()
}

fn polygon_area(rings: &[Vec<Coord>]) -> f64 {
    let mut iter = rings.iter();
    let Some(outer) = iter.next() else {
        return 0.0;
    };
    let holes: f64 = iter.map(|r| ring_area(r)).sum();
    (ring_area(outer) - holes).max(0.0)
}

/// Crossing-number test against one ring
#[must_use]
pub fn ring_contains(ring: &[Coord], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > y) != (b.y > y) && x < (b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn polygon_contains(rings: &[Vec<Coord>], x: f64, y: f64) -> bool {
    rings.iter().filter(|r| ring_contains(r, x, y)).count() % 2 == 1
}

/// Euclidean distance from a point to segment `a`–`b`
#[must_use]
pub fn segment_distance(x: f64, y: f64, a: Coord, b: Coord) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((x - a.x) * dx + (y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    let (px, py) = (a.x + t * dx, a.y + t * dy);
    ((x - px).powi(2) + (y - py).powi(2)).sqrt()
}

/// Distance from a point to a polyline, infinite for empty input
#[must_use]
pub fn polyline_distance(x: f64, y: f64, line: &[Coord]) -> f64 {
    match line {
        [] => f64::INFINITY,
        [only] => segment_distance(x, y, *only, *only),
        _ => line
            .windows(2)
            .map(|w| segment_distance(x, y, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(x0: f64, y0: f64, side: f64) -> Vec<Coord> {
        vec![
            Coord::new(x0, y0),
            Coord::new(x0 + side, y0),
            Coord::new(x0 + side, y0 + side),
            Coord::new(x0, y0 + side),
            Coord::new(x0, y0),
        ]
    }

    #[test]
    fn polygon_area_subtracts_holes() {
        let poly = Geometry::Polygon(vec![square(0.0, 0.0, 10.0), square(2.0, 2.0, 2.0)]);
        assert_eq!(poly.area(), 96.0);
        assert!(poly.contains(1.0, 1.0));
        assert!(!poly.contains(3.0, 3.0));
        assert!(!poly.contains(11.0, 1.0));
    }

    #[test]
    fn multipolygon_contains_either_part() {
        let multi = Geometry::MultiPolygon(vec![
            vec![square(0.0, 0.0, 1.0)],
            vec![square(5.0, 5.0, 1.0)],
        ]);
        assert_eq!(multi.area(), 2.0);
        assert!(multi.contains(5.5, 5.5));
        assert!(!multi.contains(3.0, 3.0));
    }

    #[test]
    fn distances_to_lines() {
        let line = [Coord::new(0.0, 0.0), Coord::new(10.0, 0.0)];
        assert_eq!(polyline_distance(5.0, 3.0, &line), 3.0);
        assert_eq!(polyline_distance(13.0, 4.0, &line), 5.0);
        assert_eq!(polyline_distance(1.0, 1.0, &[]), f64::INFINITY);
    }

    #[test]
    fn parses_geojson_collection() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "Point", "coordinates": [1.0, 2.0, 30.0]},
                 "properties": {"osmid": 7}},
                {"type": "Feature",
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[0,0],[4,0],[4,4],[0,4],[0,0]]]},
                 "properties": {"POP100": "120"}},
                {"type": "Feature", "geometry": null, "properties": null}
            ]
        });
        let fc: FeatureCollection = serde_json::from_value(doc).unwrap();
        assert_eq!(fc.features.len(), 3);
        assert_eq!(fc.points(), vec![(1.0, 2.0)]);

        let values = ValueFeature::from_collection(&fc, "POP100");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 120.0);
        assert_eq!(values[0].geometry.area(), 16.0);
    }

    #[test]
    fn rejects_short_positions() {
        let doc = json!({"type": "Point", "coordinates": [1.0]});
        assert!(serde_json::from_value::<Geometry>(doc).is_err());
    }

    #[test]
    fn writes_feature_type_tags() {
        let fc = FeatureCollection::new(vec![Feature::new(
            Geometry::Point(Coord::new(1.0, 2.0)),
            Map::new(),
        )]);
        let value = serde_json::to_value(&fc).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"][0]["type"], "Feature");
        assert_eq!(value["features"][0]["geometry"]["coordinates"], json!([1.0, 2.0]));
    }
}
