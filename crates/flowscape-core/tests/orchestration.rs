use flowscape_core::case::build;
use flowscape_core::{
    Case, CaseContext, CaseError, CaseExecutor, CaseOutcome, CaseState, CaseTracker,
    Orchestrator, ParameterSet, RunFolder, SweepSpec,
};
use flowscape_grid::{partition, TileMatrix};
use flowscape_raster::RasterError;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Records peak concurrency; fails or panics on chosen labels
#[derive(Default)]
struct ScriptedExecutor {
    running: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    fail_on: Vec<String>,
    panic_on: Vec<String>,
}

#[async_trait::async_trait]
impl CaseExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        case: Case,
        _ctx: CaseContext,
        tracker: CaseTracker,
    ) -> Result<PathBuf, CaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let label = case.label();
        if self.panic_on.contains(&label) {
            panic!("scripted panic in {label}");
        }
        tracker.advance(CaseState::GridReady)?;
        if self.fail_on.contains(&label) {
            return Err(RasterError::EmptyFeatureSet("density".into()).into());
        }
        Ok(case.output_location().to_path_buf())
    }
}

/// Logs `(run folder, started)` events as cases begin and end
#[derive(Default)]
struct RecordingExecutor {
    events: Mutex<Vec<(PathBuf, bool)>>,
}

#[async_trait::async_trait]
impl CaseExecutor for RecordingExecutor {
    async fn execute(
        &self,
        case: Case,
        _ctx: CaseContext,
        tracker: CaseTracker,
    ) -> Result<PathBuf, CaseError> {
        let run = case
            .output_location()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.events.lock().push((run.clone(), true));
        tokio::time::sleep(Duration::from_millis(10)).await;
        tracker.advance(CaseState::GridReady)?;
        self.events.lock().push((run, false));
        Ok(case.output_location().to_path_buf())
    }
}

fn sweep(pixel_sizes: Vec<u32>, threads: Vec<u32>) -> SweepSpec {
    SweepSpec {
        city_groups: vec!["bay".into()],
        expand_distances: vec![0],
        pixel_sizes,
        conductance_edge_buffers: vec![1],
        population_edge_buffers: vec![5],
        population_edge_buffer_values: vec![1.0],
        threads,
        radii: vec![50],
        block_sizes: vec![1],
    }
}

fn params() -> ParameterSet {
    ParameterSet {
        city_group: "bay".into(),
        expand_distance: 0,
        pixel_size: 30,
        conductance_edge_buffer: 1,
        population_edge_buffer: 5,
        population_edge_buffer_value: 1.0,
        threads: 2,
        radius: 50,
        block_size: 1,
    }
}

fn cases(root: &Path) -> Vec<Case> {
    let folder = RunFolder::at(root, &params(), &chrono::Local::now());
    let matrix = TileMatrix::new(3, 3).unwrap();
    build(&params(), matrix, &partition(3, 3).unwrap(), &folder).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_never_exceeds_worker_count() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(ScriptedExecutor::default());
    let orchestrator = Orchestrator::new(executor.clone(), 3);

    let report = orchestrator.run_cases(dir.path(), cases(dir.path())).await;

    assert_eq!(report.total(), 10);
    assert_eq!(report.succeeded(), 10);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 10);
    let peak = executor.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_and_panics_stay_inside_their_case() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(ScriptedExecutor {
        fail_on: vec!["edge_region_0_1".into()],
        panic_on: vec!["with_border_full".into()],
        ..ScriptedExecutor::default()
    });
    let orchestrator = Orchestrator::new(executor.clone(), 2);

    let report = orchestrator.run_cases(dir.path(), cases(dir.path())).await;

    assert_eq!(report.total(), 10);
    assert_eq!(report.succeeded(), 8);
    assert_eq!(report.summary(), "Completed 8 out of 10 cases successfully");

    let labels: Vec<&str> = report.cases.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels[..3], ["no_border_full", "with_border_full", "edge_region_0_0"]);

    match &report.cases[1].outcome {
        CaseOutcome::Failed { reason, kind } => {
            assert_eq!(kind, "aborted");
            assert!(reason.contains("scripted panic"), "{reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    let failed_edge = report
        .cases
        .iter()
        .find(|c| c.label == "edge_region_0_1")
        .unwrap();
    assert!(matches!(
        &failed_edge.outcome,
        CaseOutcome::Failed { kind, .. } if kind == "input_data"
    ));

    let ledger = orchestrator.ledger();
    assert_eq!(ledger.count(CaseState::Failed), 2);
    assert_eq!(ledger.count(CaseState::GridReady), 8);
}

#[tokio::test]
async fn sweep_runs_every_combination_in_order() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(ScriptedExecutor::default());
    let orchestrator = Orchestrator::new(executor.clone(), 4);
    let sweep = sweep(vec![30, 60], vec![2]);

    let report = orchestrator
        .run_sweep(dir.path(), &sweep, TileMatrix::new(2, 2).unwrap(), None)
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 2);
    assert_eq!(report.total(), 12);
    assert_eq!(report.succeeded(), 12);
    let names: Vec<String> = report
        .runs
        .iter()
        .map(|r| r.run_folder.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let (first, second) = (&names[0], &names[1]);
    assert!(first.ends_with("_bay_ed0_pix30_ceb1_peb5_pebv1_r50_bs1_t2"), "{first}");
    assert!(second.ends_with("_bay_ed0_pix60_ceb1_peb5_pebv1_r50_bs1_t2"), "{second}");
    assert!(report.runs.iter().all(|r| r.run_folder.is_dir()));
}

#[tokio::test]
async fn invalid_sweep_is_rejected_before_any_case() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(ScriptedExecutor::default());
    let orchestrator = Orchestrator::new(executor.clone(), 1);

    let result = orchestrator
        .run_sweep(dir.path(), &SweepSpec::default(), TileMatrix::new(3, 3).unwrap(), None)
        .await;

    assert!(result.is_err());
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn combinations_never_overlap() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = Orchestrator::new(executor.clone(), 4);

    let report = orchestrator
        .run_sweep(
            dir.path(),
            &sweep(vec![30, 60, 90], vec![2]),
            TileMatrix::new(2, 2).unwrap(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 18);
    let events = executor.events.lock().clone();
    assert_eq!(events.len(), 36);
    for pair in report.runs.windows(2) {
        let (earlier, later) = (&pair[0].run_folder, &pair[1].run_folder);
        let last_end = events
            .iter()
            .rposition(|(run, started)| run == earlier && !started)
            .unwrap();
        let first_start = events
            .iter()
            .position(|(run, started)| run == later && *started)
            .unwrap();
        assert!(
            last_end < first_start,
            "{} started before {} finished",
            later.display(),
            earlier.display()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_combination_runs_again() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(RecordingExecutor::default());
    let orchestrator = Orchestrator::new(executor.clone(), 4);

    let report = orchestrator
        .run_sweep(
            dir.path(),
            &sweep(vec![30], vec![2, 2]),
            TileMatrix::new(2, 2).unwrap(),
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.runs.len(), 2);
    for run in &report.runs {
        assert_eq!(run.summary(), "Completed 6 out of 6 cases successfully");
    }
    // both runs share a folder unless the clock crossed a minute
    let folders: HashSet<&PathBuf> = report.runs.iter().map(|r| &r.run_folder).collect();
    assert_eq!(
        orchestrator.ledger().count(CaseState::GridReady),
        6 * folders.len()
    );
}
