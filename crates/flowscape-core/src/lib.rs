//! Flowscape Core - cases, sweeps and the solver round trip
//!
//! # Architecture
//!
//! ```text
//! SweepSpec -> ParameterSet -> RunFolder -> [Case] -> Orchestrator
//!                                                         |
//!                        CaseExecutor (Pipeline) <--------+
//!                        layers -> solver -> harvest
//! ```
//!
//! # Core Concepts
//!
//! - [`SweepSpec`] / [`ParameterSet`]: the parameter cross product
//! - [`Case`]: no-border, with-border or edge-region work unit with its own folder
//! - [`Orchestrator`]: bounded worker pool isolating every case's failure
//! - [`Pipeline`]: layers, solver invocation and result harvesting for one case
//! - [`CaseLedger`]: append-only record of case state transitions
//!
//! # Example
//!
//! ```rust
//! use flowscape_core::{ParameterSet, RunFolder};
//! use flowscape_grid::{partition, TileMatrix};
//!
//! let params = ParameterSet {
//!     city_group: "bay".into(),
//!     expand_distance: 500,
//!     pixel_size: 30,
//!     conductance_edge_buffer: 1,
//!     population_edge_buffer: 5,
//!     population_edge_buffer_value: 1.0,
//!     threads: 4,
//!     radius: 50,
//!     block_size: 1,
//! };
//! let folder = RunFolder::at(
//!     std::path::Path::new("outputs"),
//!     &params,
//!     &chrono::Local::now(),
//! );
//! let matrix = TileMatrix::new(3, 3).unwrap();
//! let tiles = partition(3, 3).unwrap();
//! let cases = flowscape_core::case::build(&params, matrix, &tiles, &folder).unwrap();
//! assert_eq!(cases.len(), 10);
//! assert_eq!(cases[2].label(), "edge_region_0_0");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod case;
pub mod config;
pub mod context;
pub mod error;
pub mod harvest;
pub mod orchestrator;
pub mod params;
pub mod pipeline;
pub mod solver;
pub mod sources;
pub mod state;

pub use case::{Case, CaseType, RunFolder};
pub use config::{FlowscapeConfig, SolverConfig};
pub use context::CaseContext;
pub use error::{CaseError, ConfigError, FlowscapeError, HarvestError, SolverError, StateError};
pub use harvest::{harvest, HarvestReport};
pub use orchestrator::{
    CaseExecutor, CaseOutcome, CaseReport, Orchestrator, RunReport, SweepReport,
};
pub use params::{ParameterSet, SweepSpec};
pub use pipeline::{Pipeline, PipelineExecutor};
pub use solver::{ProcessSolver, SolverOutput, SolverRequest, SolverRunner};
pub use sources::{
    select_regions, FeatureSource, GeoJsonFeatureSource, GeoJsonNetworkSource,
    GeoJsonPointSource, NetworkSource, PointSource,
};
pub use state::{CaseLedger, CaseState, CaseTracker, StateEvent};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
