//! Error types for flowscape core
//!
//! - [`FlowscapeError`]: sweep-level failures that stop the run
//! - [`CaseError`]: anything that fails one case; isolated by the orchestrator
//! - [`SolverError`], [`HarvestError`]: the external solver and its outputs
//! - [`ConfigError`], [`StateError`]: configuration and case lifecycle

use crate::state::CaseState;
use flowscape_grid::GridError;
use flowscape_raster::RasterError;
use std::path::PathBuf;

/// Sweep-level error
#[derive(Debug, thiserror::Error)]
pub enum FlowscapeError {
    /// Configuration or sweep definition rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Grid or tile matrix rejected
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Run folder could not be created
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FlowscapeError {
    /// IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single case
#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    /// Layer generation or input reading failed
    #[error("raster error: {0}")]
    Raster(#[from] RasterError),

    /// Grid derivation failed
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Solver invocation failed
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),

    /// Writing results back failed
    #[error("harvest error: {0}")]
    Harvest(#[from] HarvestError),

    /// Lifecycle violation
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Case folder could not be prepared
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Case task panicked or was cancelled
    #[error("case aborted: {0}")]
    Aborted(String),
}

impl CaseError {
    /// IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The case's inputs held nothing usable
    #[inline]
    #[must_use]
    pub fn is_input_data(&self) -> bool {
        match self {
            Self::Raster(e) => e.is_input_data(),
            Self::Grid(e) => matches!(e, GridError::NoInputGeometry),
            _ => false,
        }
    }

    /// Short tag for reports
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            _ if self.is_input_data() => "input_data",
            Self::Raster(_) | Self::Grid(_) => "layer",
            Self::Solver(_) => "solver",
            Self::Harvest(_) => "harvest",
            Self::State(_) => "state",
            Self::Io { .. } => "io",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// External solver errors
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// Process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file or output directory IO
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No directory named after the project appeared
    #[error("no output directory for project {project} in {dir}")]
    NoOutputDirectory { dir: PathBuf, project: String },

    /// Output directory lacks required rasters
    #[error("output directory {dir} is missing {missing:?}")]
    MissingOutputs { dir: PathBuf, missing: Vec<String> },
}

impl SolverError {
    /// IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result harvesting errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Solver raster or network output unreadable or unwritable
    #[error("raster error: {0}")]
    Raster(#[from] RasterError),

    /// Copy failed
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarvestError {
    /// IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file malformed
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Value out of range or missing
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Case lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Transition not in the lifecycle table
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: CaseState, to: CaseState },

    /// Case not registered in the ledger
    #[error("unknown case {0}")]
    UnknownCase(String),
}
