//! Per-case pipeline
//!
//! ```text
//! network -> grid (grid_ready) -> density, capacity, condition (layers_ready)
//!   -> solver (solver_invoked -> solver_validated | solver_failed)
//!   -> harvest (harvested)
//! ```
//!
//! Every artifact of a case lives in its own folder, memoized through an
//! [`FsArtifactStore`] rooted there. Networks and population features are
//! loaded once per city group and shared by the cases that need them.

use crate::case::Case;
use crate::config::FlowscapeConfig;
use crate::context::CaseContext;
use crate::error::CaseError;
use crate::harvest::harvest;
use crate::orchestrator::{aborted, CaseExecutor};
use crate::solver::{ProcessSolver, SolverRequest, SolverRunner};
use crate::sources::{FeatureSource, GeoJsonFeatureSource, GeoJsonNetworkSource, NetworkSource};
use crate::state::{CaseState, CaseTracker};
use dashmap::DashMap;
use flowscape_grid::SpatialReference;
use flowscape_raster::{
    FsArtifactStore, LayerGenerator, LayerInputs, LayerKind, RasterError, RoadNetwork,
    ValueFeature,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Layers, solver and harvest for one case, run synchronously
pub struct Pipeline {
    spatial_reference: SpatialReference,
    networks: Arc<dyn NetworkSource>,
    population: Arc<dyn FeatureSource>,
    solver: Arc<dyn SolverRunner>,
    network_cache: DashMap<(String, u32), Arc<RoadNetwork>>,
    population_cache: DashMap<String, Arc<Vec<ValueFeature>>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("spatial_reference", &self.spatial_reference)
            .field("cached_networks", &self.network_cache.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Pipeline with explicit sources and solver
    pub fn new(
        spatial_reference: SpatialReference,
        networks: Arc<dyn NetworkSource>,
        population: Arc<dyn FeatureSource>,
        solver: Arc<dyn SolverRunner>,
    ) -> Self {
        Self {
            spatial_reference,
            networks,
            population,
            solver,
            network_cache: DashMap::new(),
            population_cache: DashMap::new(),
        }
    }

    /// GeoJSON sources and the process solver described by `config`
    #[must_use]
    pub fn from_config(config: &FlowscapeConfig) -> Self {
        Self::new(
            config.spatial_reference.clone(),
            Arc::new(GeoJsonNetworkSource::new(config.clone())),
            Arc::new(GeoJsonFeatureSource::new(config.clone())),
            Arc::new(ProcessSolver::new(config.solver.clone())),
        )
    }

    /// Run every stage of `case`, advancing `tracker` as each completes
    ///
    /// # Errors
    /// The first failing stage's error. A solver failure leaves the case in
    /// `solver_failed`.
    pub fn run_case(
        &self,
        ctx: &CaseContext,
        case: &Case,
        tracker: &CaseTracker,
    ) -> Result<PathBuf, CaseError> {
        let case_dir = case.output_location().to_path_buf();
        std::fs::create_dir_all(&case_dir).map_err(|e| CaseError::io(&case_dir, e))?;
        let params = case.parameters();
        info!(parent: ctx.span(), dir = %case_dir.display(), "case started");

        let network = self.network(&params.city_group, params.expand_distance)?;
        let generator = LayerGenerator::new(Arc::new(FsArtifactStore::new(&case_dir)));
        let request = case.layer_request(self.spatial_reference.clone());
        generator.grid(ctx.span(), &request, &network)?;
        tracker.advance(CaseState::GridReady)?;

        let population = self.population(&params.city_group)?;
        let inputs = LayerInputs {
            network: &network,
            population: &population,
        };
        let density = generator.generate(ctx.span(), &request, LayerKind::Density, inputs)?;
        let capacity = generator.generate(ctx.span(), &request, LayerKind::Capacity, inputs)?;
        let condition = generator.generate(ctx.span(), &request, LayerKind::Condition, inputs)?;
        tracker.advance(CaseState::LayersReady)?;

        let solver_request = SolverRequest {
            case_dir: case_dir.clone(),
            project_name: params.project_name(),
            source: density.path,
            resistance: capacity.path,
            condition: condition.path,
            radius: params.radius,
            block_size: params.block_size,
            threads: params.threads,
        };
        tracker.advance(CaseState::SolverInvoked)?;
        let output = match self.solver.run(ctx, &solver_request) {
            Ok(output) => {
                tracker.advance(CaseState::SolverValidated)?;
                output
            }
            Err(e) => {
                tracker.advance(CaseState::SolverFailed)?;
                return Err(e.into());
            }
        };

        let report = harvest(ctx, case, &network, &output)?;
        tracker.advance(CaseState::Harvested)?;
        debug!(parent: ctx.span(), network = %report.network.display(), "case harvested");
        Ok(case_dir)
    }

    fn network(
        &self,
        city_group: &str,
        expand_distance: u32,
    ) -> Result<Arc<RoadNetwork>, RasterError> {
        let key = (city_group.to_string(), expand_distance);
        if let Some(network) = self.network_cache.get(&key) {
            return Ok(Arc::clone(network.value()));
        }
        let network = Arc::new(self.networks.load(city_group, expand_distance)?);
        self.network_cache.insert(key, Arc::clone(&network));
        Ok(network)
    }

    fn population(&self, city_group: &str) -> Result<Arc<Vec<ValueFeature>>, RasterError> {
        if let Some(features) = self.population_cache.get(city_group) {
            return Ok(Arc::clone(features.value()));
        }
        let features = Arc::new(self.population.population(city_group)?);
        self.population_cache
            .insert(city_group.to_string(), Arc::clone(&features));
        Ok(features)
    }
}

/// [`CaseExecutor`] running a [`Pipeline`] on the blocking thread pool
#[derive(Debug, Clone)]
pub struct PipelineExecutor {
    pipeline: Arc<Pipeline>,
}

impl PipelineExecutor {
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

#[async_trait::async_trait]
impl CaseExecutor for PipelineExecutor {
    async fn execute(
        &self,
        case: Case,
        ctx: CaseContext,
        tracker: CaseTracker,
    ) -> Result<PathBuf, CaseError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.run_case(&ctx, &case, &tracker))
            .await
            .map_err(aborted)?
    }
}
