//! Configuration
//!
//! [`FlowscapeConfig`] is read from TOML; every field has a default so an
//! empty file is valid. Command-line flags override through the `with_*`
//! builders.

use crate::error::ConfigError;
use flowscape_grid::SpatialReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sweep configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowscapeConfig {
    /// Run folders are created here
    pub output_root: PathBuf,
    /// Input path templates resolve against this directory
    pub data_dir: PathBuf,
    /// Reference system of all inputs and outputs
    pub spatial_reference: SpatialReference,
    /// Concurrent cases; available parallelism when unset
    pub max_workers: Option<usize>,
    /// Road network GeoJSON, with `{city_group}` and `{expand_distance}`
    pub network_path: String,
    /// Population GeoJSON, with `{city_group}`
    pub population_path: String,
    /// Property holding each population feature's total
    pub population_value_property: String,
    /// External solver
    pub solver: SolverConfig,
}

impl Default for FlowscapeConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("outputs"),
            data_dir: PathBuf::from("data"),
            spatial_reference: SpatialReference::default(),
            max_workers: None,
            network_path: "{city_group}/network_{expand_distance}.geojson".to_string(),
            population_path: "{city_group}/population.geojson".to_string(),
            population_value_property: "POP100".to_string(),
            solver: SolverConfig::default(),
        }
    }
}

impl FlowscapeConfig {
    /// Load and validate a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `ConfigError::Invalid` describing the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == Some(0) {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.population_value_property.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "population_value_property must not be empty".into(),
            ));
        }
        self.solver.validate()
    }

    /// Worker pool size
    #[must_use]
    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Road network file of a city group
    #[must_use]
    pub fn network_file(&self, city_group: &str, expand_distance: u32) -> PathBuf {
        let ed = expand_distance.to_string();
        self.data_dir.join(render(
            &self.network_path,
            &[("city_group", city_group), ("expand_distance", &ed)],
        ))
    }

    /// Population file of a city group
    #[must_use]
    pub fn population_file(&self, city_group: &str) -> PathBuf {
        self.data_dir
            .join(render(&self.population_path, &[("city_group", city_group)]))
    }

    #[inline]
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_spatial_reference(mut self, sr: SpatialReference) -> Self {
        self.spatial_reference = sr;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }
}

/// External solver command
///
/// `args` may reference `{config}`, `{project}`, `{case_dir}`, `{source}`,
/// `{resistance}` and `{condition}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Environment variable receiving the thread count
    pub threads_env: String,
    /// Value of the `solver` option in the generated config
    pub numeric_solver: String,
    /// File name of the generated config inside the case folder
    pub config_name: String,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            program: "julia".to_string(),
            args: vec![
                "-e".to_string(),
                "using Omniscape; run_omniscape(\"{config}\")".to_string(),
            ],
            threads_env: "JULIA_NUM_THREADS".to_string(),
            numeric_solver: "cholmod".to_string(),
            config_name: "omniscape_config.ini".to_string(),
        }
    }
}

impl SolverConfig {
    /// Solver running `program` with `args`, other fields defaulted
    #[must_use]
    pub fn command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_threads_env(mut self, name: impl Into<String>) -> Self {
        self.threads_env = name.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_numeric_solver(mut self, solver: impl Into<String>) -> Self {
        self.numeric_solver = solver.into();
        self
    }

    /// # Errors
    /// `ConfigError::Invalid` for an empty program, env name or config name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::Invalid("solver.program must not be empty".into()));
        }
        if self.threads_env.trim().is_empty() {
            return Err(ConfigError::Invalid("solver.threads_env must not be empty".into()));
        }
        if self.config_name.trim().is_empty() || self.config_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(
                "solver.config_name must be a plain file name".into(),
            ));
        }
        Ok(())
    }
}

/// Replace `{key}` placeholders
#[must_use]
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}
