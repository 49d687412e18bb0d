//! Run orchestration
//!
//! Parameter sets run one after another. Within a set, every case is
//! spawned on the runtime and waits for one of `workers` semaphore permits;
//! whatever a case does (error or panic) ends at its own task boundary and
//! becomes a [`CaseOutcome`].
//!
//! The work done for a case sits behind [`CaseExecutor`], so the pool can be
//! driven by the real pipeline or by a test double.

use crate::case::{self, Case, CaseType, RunFolder};
use crate::context::CaseContext;
use crate::error::{CaseError, FlowscapeError};
use crate::params::{ParameterSet, SweepSpec};
use crate::sources::{select_regions, PointSource};
use crate::state::{CaseLedger, CaseTracker};
use flowscape_grid::{RegionTile, TileMatrix};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{error, info, info_span};

/// Executes one case
///
/// Implement this trait to define what a case does; the orchestrator only
/// schedules, isolates and reports.
#[async_trait::async_trait]
pub trait CaseExecutor: Send + Sync {
    /// Run a case to completion, returning its output folder
    async fn execute(
        &self,
        case: Case,
        ctx: CaseContext,
        tracker: CaseTracker,
    ) -> Result<PathBuf, CaseError>;
}

/// How one case ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Succeeded { output: PathBuf },
    Failed { reason: String, kind: String },
}

impl CaseOutcome {
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Outcome of one case with its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub label: String,
    pub case_type: CaseType,
    pub region: Option<RegionTile>,
    pub outcome: CaseOutcome,
}

/// Outcomes of every case of one run folder, in case order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_folder: PathBuf,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.cases.iter().filter(|c| c.outcome.is_success()).count()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.cases.len()
    }

    /// `Completed N out of M cases successfully`
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Completed {} out of {} cases successfully",
            self.succeeded(),
            self.total()
        )
    }
}

/// Reports of a whole sweep, in parameter order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub runs: Vec<RunReport>,
}

impl SweepReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.runs.iter().map(RunReport::succeeded).sum()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.runs.iter().map(RunReport::total).sum()
    }
}

/// Bounded worker pool over a [`CaseExecutor`]
pub struct Orchestrator {
    executor: Arc<dyn CaseExecutor>,
    workers: usize,
    ledger: Arc<CaseLedger>,
}

impl Orchestrator {
    /// Pool of `workers` concurrent cases (at least one)
    pub fn new(executor: Arc<dyn CaseExecutor>, workers: usize) -> Self {
        Self {
            executor,
            workers: workers.max(1),
            ledger: Arc::new(CaseLedger::new()),
        }
    }

    /// Share an existing ledger
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<CaseLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    #[inline]
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &Arc<CaseLedger> {
        &self.ledger
    }

    /// Run every case of one run folder and wait for all of them
    ///
    /// Never fails: each case's error or panic is recorded in its report.
    pub async fn run_cases(&self, run_folder: &Path, cases: Vec<Case>) -> RunReport {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut identities = Vec::with_capacity(cases.len());
        let mut handles = Vec::with_capacity(cases.len());

        for case in cases {
            let ctx = CaseContext::for_case(&case);
            let tracker = CaseTracker::new(
                case.output_location().display().to_string(),
                Arc::clone(&self.ledger),
            );
            identities.push((
                case.label(),
                case.case_type(),
                case.region(),
                ctx.clone(),
                tracker.clone(),
            ));

            let executor = Arc::clone(&self.executor);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| CaseError::Aborted(e.to_string()))?;
                executor.execute(case, ctx, tracker).await
            }));
        }

        let results = futures::future::join_all(handles).await;
        let cases = identities
            .into_iter()
            .zip(results)
            .map(|((label, case_type, region, ctx, tracker), joined)| {
                let result = joined.unwrap_or_else(|e| Err(aborted(e)));
                let outcome = match result {
                    Ok(output) => CaseOutcome::Succeeded { output },
                    Err(err) => {
                        tracker.fail();
                        error!(
                            parent: ctx.span(),
                            case = %label,
                            kind = err.kind(),
                            error = %err,
                            "case failed"
                        );
                        CaseOutcome::Failed {
                            reason: err.to_string(),
                            kind: err.kind().to_string(),
                        }
                    }
                };
                CaseReport {
                    label,
                    case_type,
                    region,
                    outcome,
                }
            })
            .collect();

        RunReport {
            run_folder: run_folder.to_path_buf(),
            cases,
        }
    }

    /// Create the run folder of one parameter set, build its cases and run
    /// them
    ///
    /// # Errors
    /// - `FlowscapeError::Io` if the run folder cannot be created
    /// - `FlowscapeError::Grid` if a selected tile lies outside `matrix`
    pub async fn run_parameters(
        &self,
        output_root: &Path,
        parameters: &ParameterSet,
        matrix: TileMatrix,
        points: Option<&dyn PointSource>,
    ) -> Result<RunReport, FlowscapeError> {
        let folder = RunFolder::create(output_root, parameters)?;
        let span = info_span!("run", folder = %folder.path().display());
        let tiles = span.in_scope(|| {
            let ctx = CaseContext::detached(parameters.to_string());
            select_regions(&ctx, matrix, points)
        });
        let cases = case::build(parameters, matrix, &tiles, &folder)?;
        info!(
            parent: &span,
            parameters = %parameters,
            cases = cases.len(),
            workers = self.workers,
            "run started"
        );

        let started = Instant::now();
        let report = self.run_cases(folder.path(), cases).await;
        info!(
            parent: &span,
            succeeded = report.succeeded(),
            total = report.total(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "{}",
            report.summary()
        );
        Ok(report)
    }

    /// Run every parameter set of a sweep, strictly one after another
    ///
    /// # Errors
    /// - `FlowscapeError::Config` for an invalid sweep
    /// - anything [`Self::run_parameters`] reports; the sweep stops there
    pub async fn run_sweep(
        &self,
        output_root: &Path,
        sweep: &SweepSpec,
        matrix: TileMatrix,
        points: Option<&dyn PointSource>,
    ) -> Result<SweepReport, FlowscapeError> {
        sweep.validate()?;
        let mut report = SweepReport::default();
        for parameters in sweep.combinations() {
            let run = self
                .run_parameters(output_root, &parameters, matrix, points)
                .await?;
            report.runs.push(run);
        }
        Ok(report)
    }
}

/// Case error for a task that panicked or was cancelled
pub(crate) fn aborted(err: JoinError) -> CaseError {
    if err.is_panic() {
        CaseError::Aborted(panic_message(err.into_panic()))
    } else {
        CaseError::Aborted(err.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
