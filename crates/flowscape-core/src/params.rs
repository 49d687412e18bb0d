//! Parameter sets and sweeps
//!
//! A [`SweepSpec`] holds one list of values per parameter; its cross
//! product is the ordered list of [`ParameterSet`]s the orchestrator runs,
//! one run folder each.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// One combination of sweep parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub city_group: String,
    pub expand_distance: u32,
    pub pixel_size: u32,
    pub conductance_edge_buffer: u32,
    pub population_edge_buffer: u32,
    pub population_edge_buffer_value: f32,
    pub threads: u32,
    pub radius: u32,
    pub block_size: u32,
}

impl ParameterSet {
    /// Run folder suffix: `ed.._pix.._ceb.._peb.._pebv.._r.._bs.._t..`
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "ed{}_pix{}_ceb{}_peb{}_pebv{}_r{}_bs{}_t{}",
            self.expand_distance,
            self.pixel_size,
            self.conductance_edge_buffer,
            self.population_edge_buffer,
            self.population_edge_buffer_value,
            self.radius,
            self.block_size,
            self.threads
        )
    }

    /// Solver project name
    #[must_use]
    pub fn project_name(&self) -> String {
        format!(
            "{}_pix{}_eb{}_ebv{}_ceb{}_r{}_bs{}_t{}",
            self.city_group,
            self.pixel_size,
            self.population_edge_buffer,
            self.population_edge_buffer_value,
            self.conductance_edge_buffer,
            self.radius,
            self.block_size,
            self.threads
        )
    }

    /// Suffix of harvested outputs for a region label
    #[must_use]
    pub fn result_suffix(&self, region_label: &str) -> String {
        format!(
            "r{}_bs{}_t{}_ps{}_region{region_label}",
            self.radius, self.block_size, self.threads, self.pixel_size
        )
    }
}

impl Display for ParameterSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.city_group, self.encode())
    }
}

/// Value lists of a parameter sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub city_groups: Vec<String>,
    pub expand_distances: Vec<u32>,
    pub pixel_sizes: Vec<u32>,
    pub conductance_edge_buffers: Vec<u32>,
    pub population_edge_buffers: Vec<u32>,
    pub population_edge_buffer_values: Vec<f32>,
    pub threads: Vec<u32>,
    pub radii: Vec<u32>,
    pub block_sizes: Vec<u32>,
}

impl SweepSpec {
    /// # Errors
    /// `ConfigError::Invalid` for an empty list, a zero pixel size or thread
    /// count, or a non-finite buffer value
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lists = [
            ("city_groups", self.city_groups.len()),
            ("expand_distances", self.expand_distances.len()),
            ("pixel_sizes", self.pixel_sizes.len()),
            ("conductance_edge_buffers", self.conductance_edge_buffers.len()),
            ("population_edge_buffers", self.population_edge_buffers.len()),
            (
                "population_edge_buffer_values",
                self.population_edge_buffer_values.len(),
            ),
            ("threads", self.threads.len()),
            ("radii", self.radii.len()),
            ("block_sizes", self.block_sizes.len()),
        ];
        if let Some((name, _)) = lists.iter().find(|(_, len)| *len == 0) {
            return Err(ConfigError::Invalid(format!("{name} must not be empty")));
        }
        if self.city_groups.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid("city group names must not be blank".into()));
        }
        if self.pixel_sizes.contains(&0) {
            return Err(ConfigError::Invalid("pixel sizes must be positive".into()));
        }
        if self.threads.contains(&0) {
            return Err(ConfigError::Invalid("thread counts must be positive".into()));
        }
        if self.population_edge_buffer_values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid(
                "population edge buffer values must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Number of parameter sets
    #[must_use]
    pub fn len(&self) -> usize {
        self.city_groups.len()
            * self.expand_distances.len()
            * self.pixel_sizes.len()
            * self.conductance_edge_buffers.len()
            * self.population_edge_buffers.len()
            * self.population_edge_buffer_values.len()
            * self.threads.len()
            * self.radii.len()
            * self.block_sizes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cross product, varying the last parameter fastest
    ///
    /// Order: city group, expand distance, pixel size, conductance buffer,
    /// (population buffer, population buffer value), threads, radius,
    /// block size.
    #[must_use]
    pub fn combinations(&self) -> Vec<ParameterSet> {
        let population_pairs: Vec<(u32, f32)> = self
            .population_edge_buffers
            .iter()
            .flat_map(|&b| {
                self.population_edge_buffer_values
                    .iter()
                    .map(move |&v| (b, v))
            })
            .collect();

        let mut sets = Vec::with_capacity(self.len());
        for city_group in &self.city_groups {
            for &expand_distance in &self.expand_distances {
                for &pixel_size in &self.pixel_sizes {
                    for &conductance_edge_buffer in &self.conductance_edge_buffers {
                        for &(population_edge_buffer, population_edge_buffer_value) in
                            &population_pairs
                        {
                            for &threads in &self.threads {
                                for &radius in &self.radii {
                                    for &block_size in &self.block_sizes {
                                        sets.push(ParameterSet {
                                            city_group: city_group.clone(),
                                            expand_distance,
                                            pixel_size,
                                            conductance_edge_buffer,
                                            population_edge_buffer,
                                            population_edge_buffer_value,
                                            threads,
                                            radius,
                                            block_size,
                                        });
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet {
            city_group: "bay".into(),
            expand_distance: 500,
            pixel_size: 30,
            conductance_edge_buffer: 2,
            population_edge_buffer: 5,
            population_edge_buffer_value: 0.5,
            threads: 8,
            radius: 100,
            block_size: 3,
        }
    }

    #[test]
    fn encodings() {
        let p = params();
        assert_eq!(p.encode(), "ed500_pix30_ceb2_peb5_pebv0.5_r100_bs3_t8");
        assert_eq!(p.project_name(), "bay_pix30_eb5_ebv0.5_ceb2_r100_bs3_t8");
        assert_eq!(p.result_suffix("0_1"), "r100_bs3_t8_ps30_region0_1");
    }

    #[test]
    fn combinations_follow_sweep_order() {
        let sweep = SweepSpec {
            city_groups: vec!["a".into(), "b".into()],
            expand_distances: vec![0],
            pixel_sizes: vec![30, 60],
            conductance_edge_buffers: vec![0],
            population_edge_buffers: vec![1, 2],
            population_edge_buffer_values: vec![1.0],
            threads: vec![1],
            radii: vec![10],
            block_sizes: vec![1],
        };
        sweep.validate().unwrap();
        let sets = sweep.combinations();
        assert_eq!(sets.len(), sweep.len());
        assert_eq!(sets.len(), 8);
        let firsts: Vec<(&str, u32, u32)> = sets
            .iter()
            .take(4)
            .map(|s| (s.city_group.as_str(), s.pixel_size, s.population_edge_buffer))
            .collect();
        assert_eq!(firsts, vec![("a", 30, 1), ("a", 30, 2), ("a", 60, 1), ("a", 60, 2)]);
        assert_eq!(sets[4].city_group, "b");
    }

    #[test]
    fn validation_names_empty_list() {
        let sweep = SweepSpec {
            city_groups: vec!["a".into()],
            ..SweepSpec::default()
        };
        let err = sweep.validate().unwrap_err();
        assert!(err.to_string().contains("expand_distances"));
    }
}
