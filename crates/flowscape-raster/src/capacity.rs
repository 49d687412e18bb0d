//! Road capacity by highway class
//!
//! Capacity of an edge is `class capacity × max(lanes, class lanes)` in
//! vehicles per hour. Classes missing from the table get zero, which keeps
//! the edge out of the conductance layer.

use serde_json::Value;

/// Capacity per lane and default lane count of a highway class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassCapacity {
    pub per_lane: f64,
    pub lanes: f64,
}

const TABLE: &[(&str, ClassCapacity)] = &[
    ("motorway", ClassCapacity { per_lane: 2000.0, lanes: 2.0 }),
    ("motorway_link", ClassCapacity { per_lane: 1500.0, lanes: 1.0 }),
    ("trunk", ClassCapacity { per_lane: 1000.0, lanes: 2.0 }),
    ("trunk_link", ClassCapacity { per_lane: 1000.0, lanes: 1.0 }),
    ("primary", ClassCapacity { per_lane: 1000.0, lanes: 1.0 }),
    ("primary_link", ClassCapacity { per_lane: 1000.0, lanes: 1.0 }),
    ("secondary", ClassCapacity { per_lane: 1000.0, lanes: 1.0 }),
    ("tertiary", ClassCapacity { per_lane: 600.0, lanes: 1.0 }),
    ("minor", ClassCapacity { per_lane: 600.0, lanes: 1.0 }),
    ("residential", ClassCapacity { per_lane: 600.0, lanes: 1.0 }),
    ("living_street", ClassCapacity { per_lane: 300.0, lanes: 1.0 }),
];

/// Classes that fold into `residential` when they appear together
const RESIDENTIAL_LIKE: &[&str] = &["residential", "unclassified", "tertiary"];

/// Table entry for a normalized class
#[must_use]
pub fn class_capacity(class: &str) -> Option<ClassCapacity> {
    TABLE
        .iter()
        .find(|(name, _)| *name == class)
        .map(|(_, c)| *c)
}

/// Canonical class name of a `highway` property
///
/// Accepts a string or a list of strings. Spaces are read as underscores.
/// `unclassified` and any mix of residential, unclassified and tertiary
/// become `residential`; other lists use their first class.
#[must_use]
pub fn normalize_highway(value: &Value) -> Option<String> {
    let classes: Vec<String> = match value {
        Value::String(s) => s.split(',').map(canonical).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(canonical)
            .collect(),
        _ => return None,
    };
    let classes: Vec<String> = classes.into_iter().filter(|c| !c.is_empty()).collect();

    match classes.as_slice() {
        [] => None,
        [only] if only == "unclassified" => Some("residential".to_string()),
        [only] => Some(only.clone()),
        many if many.iter().all(|c| RESIDENTIAL_LIKE.contains(&c.as_str())) => {
            Some("residential".to_string())
        }
        many => many.first().cloned(),
    }
}

fn canonical(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(' ', "_")
}

/// Largest lane count in a `lanes` property
///
/// OSM exports lanes as numbers, numeric strings, `"2;3"` lists or arrays.
#[must_use]
pub fn parse_lanes(value: &Value) -> Option<f64> {
    let from_str = |s: &str| {
        s.split([';', ','])
            .filter_map(|p| p.trim().parse::<f64>().ok())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    };
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => from_str(s),
        Value::Array(items) => items
            .iter()
            .filter_map(parse_lanes)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))),
        _ => None,
    }
}

/// Capacity of an edge from its class and lane count
#[must_use]
pub fn assign_capacity(highway: Option<&str>, lanes: Option<f64>) -> f64 {
    let Some(class) = highway.and_then(class_capacity) else {
        return 0.0;
    };
    let lanes = lanes.filter(|l| l.is_finite()).unwrap_or(0.0);
    class.per_lane * lanes.max(class.lanes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_lookups() {
        assert_eq!(assign_capacity(Some("motorway"), None), 4000.0);
        assert_eq!(assign_capacity(Some("motorway"), Some(3.0)), 6000.0);
        assert_eq!(assign_capacity(Some("residential"), Some(0.0)), 600.0);
        assert_eq!(assign_capacity(Some("living_street"), Some(2.0)), 600.0);
        assert_eq!(assign_capacity(Some("footway"), Some(2.0)), 0.0);
        assert_eq!(assign_capacity(None, Some(2.0)), 0.0);
    }

    #[test]
    fn highway_normalization() {
        assert_eq!(normalize_highway(&json!("Motorway Link")).as_deref(), Some("motorway_link"));
        assert_eq!(normalize_highway(&json!("unclassified")).as_deref(), Some("residential"));
        assert_eq!(
            normalize_highway(&json!(["tertiary", "residential"])).as_deref(),
            Some("residential")
        );
        assert_eq!(
            normalize_highway(&json!("residential, unclassified")).as_deref(),
            Some("residential")
        );
        assert_eq!(
            normalize_highway(&json!(["primary", "secondary"])).as_deref(),
            Some("primary")
        );
        assert_eq!(normalize_highway(&json!(null)), None);
    }

    #[test]
    fn lane_parsing() {
        assert_eq!(parse_lanes(&json!(2)), Some(2.0));
        assert_eq!(parse_lanes(&json!("2;3")), Some(3.0));
        assert_eq!(parse_lanes(&json!(["1", "4"])), Some(4.0));
        assert_eq!(parse_lanes(&json!("many")), None);
    }
}
