//! External solver adapter
//!
//! - [`write_config`]: the solver's INI file inside the case folder
//! - [`SolverRunner`]: the seam the pipeline calls; [`ProcessSolver`] spawns
//!   the configured program
//! - [`locate_outputs`]: find and validate what the solver wrote
//!
//! A case's solver step fails when its output directory or any required
//! raster is missing, whatever the process exit status was.

use crate::config::{render, SolverConfig};
use crate::context::CaseContext;
use crate::error::SolverError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Cumulative current raster
pub const CUM_CURRMAP: &str = "cum_currmap.tif";
/// Flow potential raster
pub const FLOW_POTENTIAL: &str = "flow_potential.tif";
/// Normalized cumulative current raster
pub const NORMALIZED_CUM_CURRMAP: &str = "normalized_cum_currmap.tif";
/// Configuration snapshot the solver writes next to its rasters
pub const SOLVER_CONFIG_SNAPSHOT: &str = "config.ini";

const REQUIRED_OUTPUTS: [&str; 3] = [CUM_CURRMAP, FLOW_POTENTIAL, NORMALIZED_CUM_CURRMAP];

/// Everything one solver run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverRequest {
    pub case_dir: PathBuf,
    pub project_name: String,
    /// Source strength raster (density layer)
    pub source: PathBuf,
    /// Conductance raster (capacity layer)
    pub resistance: PathBuf,
    /// Boundary-condition raster
    pub condition: PathBuf,
    pub radius: u32,
    pub block_size: u32,
    pub threads: u32,
}

/// Validated solver output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverOutput {
    pub dir: PathBuf,
    pub cum_currmap: PathBuf,
    pub flow_potential: PathBuf,
    pub normalized_cum_currmap: PathBuf,
}

impl SolverOutput {
    /// Output rasters with their harvested attribute names
    #[must_use]
    pub fn rasters(&self) -> [(&Path, &'static str); 3] {
        [
            (self.cum_currmap.as_path(), "cum_flow"),
            (self.flow_potential.as_path(), "flow_pot"),
            (self.normalized_cum_currmap.as_path(), "norm_flow"),
        ]
    }
}

/// Runs the solver for one case
pub trait SolverRunner: Send + Sync {
    /// Run to completion and return the validated outputs
    ///
    /// # Errors
    /// Spawn failures, config IO, missing output directory or rasters
    fn run(&self, ctx: &CaseContext, request: &SolverRequest) -> Result<SolverOutput, SolverError>;
}

/// INI text for a request
#[must_use]
pub fn render_config(request: &SolverRequest, numeric_solver: &str) -> String {
    format!(
        "[Options]
project_name = {project}
resistance_file = {resistance}
source_file = {source}
condition1_file = {condition}
radius = {radius}
block_size = {block_size}
calc_flow_potential = true
calc_normalized_current = true
parallelize = true
solver = {numeric_solver}
resistance_is_conductance = true
write_raw_currmap = true
write_as_tif = true

[Conditional Connectivity Options]
conditional = true
n_conditions = 1
comparison1 = equal
",
        project = request.project_name,
        resistance = request.resistance.display(),
        source = request.source.display(),
        condition = request.condition.display(),
        radius = request.radius,
        block_size = request.block_size,
    )
}

/// Write the INI file into the case folder
///
/// # Errors
/// `SolverError::Io` if the file cannot be written
pub fn write_config(
    request: &SolverRequest,
    config: &SolverConfig,
) -> Result<PathBuf, SolverError> {
    let path = request.case_dir.join(&config.config_name);
    std::fs::write(&path, render_config(request, &config.numeric_solver))
        .map_err(|e| SolverError::io(&path, e))?;
    Ok(path)
}

/// Newest directory in `case_dir` named after `project`, with all three
/// rasters present
///
/// # Errors
/// - `SolverError::NoOutputDirectory` when no directory matches
/// - `SolverError::MissingOutputs` naming each absent raster
/// - `SolverError::Io` if `case_dir` cannot be listed
pub fn locate_outputs(case_dir: &Path, project: &str) -> Result<SolverOutput, SolverError> {
    let entries = std::fs::read_dir(case_dir).map_err(|e| SolverError::io(case_dir, e))?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| SolverError::io(case_dir, e))?;
        if !entry.file_name().to_string_lossy().starts_with(project) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_dir() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(t, _)| modified >= *t) {
            newest = Some((modified, entry.path()));
        }
    }

    let (_, dir) = newest.ok_or_else(|| SolverError::NoOutputDirectory {
        dir: case_dir.to_path_buf(),
        project: project.to_string(),
    })?;
    let missing: Vec<String> = REQUIRED_OUTPUTS
        .iter()
        .filter(|name| !dir.join(name).is_file())
        .map(|name| (*name).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SolverError::MissingOutputs { dir, missing });
    }

    Ok(SolverOutput {
        cum_currmap: dir.join(CUM_CURRMAP),
        flow_potential: dir.join(FLOW_POTENTIAL),
        normalized_cum_currmap: dir.join(NORMALIZED_CUM_CURRMAP),
        dir,
    })
}

/// Solver run as a child process in the case folder
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    config: SolverConfig,
}

impl ProcessSolver {
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Program arguments with placeholders filled in
    #[must_use]
    pub fn arguments(&self, request: &SolverRequest, config_path: &Path) -> Vec<String> {
        let config = config_path.display().to_string();
        let case_dir = request.case_dir.display().to_string();
        let source = request.source.display().to_string();
        let resistance = request.resistance.display().to_string();
        let condition = request.condition.display().to_string();
        let values = [
            ("config", config.as_str()),
            ("project", request.project_name.as_str()),
            ("case_dir", case_dir.as_str()),
            ("source", source.as_str()),
            ("resistance", resistance.as_str()),
            ("condition", condition.as_str()),
        ];
        self.config
            .args
            .iter()
            .map(|arg| render(arg, &values))
            .collect()
    }
}

impl SolverRunner for ProcessSolver {
    fn run(&self, ctx: &CaseContext, request: &SolverRequest) -> Result<SolverOutput, SolverError> {
        let config_path = write_config(request, &self.config)?;
        debug!(parent: ctx.span(), config = %config_path.display(), "solver config written");

        let args = self.arguments(request, &config_path);
        info!(
            parent: ctx.span(),
            program = %self.config.program,
            args = ?args,
            threads = request.threads,
            "solver started"
        );

        let started = Instant::now();
        let status = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&request.case_dir)
            .env(&self.config.threads_env, request.threads.to_string())
            .status()
            .map_err(|source| SolverError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if status.success() {
            info!(parent: ctx.span(), %status, elapsed_ms, "solver exited");
        } else {
            warn!(parent: ctx.span(), %status, elapsed_ms, "solver exited unsuccessfully");
        }

        match locate_outputs(&request.case_dir, &request.project_name) {
            Ok(output) => {
                info!(parent: ctx.span(), dir = %output.dir.display(), "solver outputs located");
                Ok(output)
            }
            Err(e) => {
                error!(parent: ctx.span(), error = %e, "solver outputs unusable");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(case_dir: &Path) -> SolverRequest {
        SolverRequest {
            case_dir: case_dir.to_path_buf(),
            project_name: "bay_pix30_eb5_ebv1_ceb1_r50_bs1_t4".into(),
            source: case_dir.join("source.tif"),
            resistance: case_dir.join("resistance.tif"),
            condition: case_dir.join("condition.tif"),
            radius: 50,
            block_size: 1,
            threads: 4,
        }
    }

    fn touch_outputs(dir: &Path, names: &[&str]) {
        std::fs::create_dir_all(dir).unwrap();
        for name in names {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
    }

    #[test]
    fn config_has_both_sections() {
        let req = request(Path::new("/case"));
        let ini = render_config(&req, "cholmod");
        assert!(ini.starts_with("[Options]\nproject_name = bay_pix30_eb5_ebv1_ceb1_r50_bs1_t4\n"));
        assert!(ini.contains("resistance_file = /case/resistance.tif\n"));
        assert!(ini.contains("source_file = /case/source.tif\n"));
        assert!(ini.contains("condition1_file = /case/condition.tif\n"));
        assert!(ini.contains("solver = cholmod\n"));
        assert_eq!(ini.lines().count(), 19);
        assert!(ini.lines().all(|l| l.is_empty() || l.starts_with('[') || l.contains(" = ")));
        assert!(ini.contains("\n[Conditional Connectivity Options]\nconditional = true\nn_conditions = 1\ncomparison1 = equal\n"));
    }

    #[test]
    fn write_config_uses_configured_name() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&request(dir.path()), &SolverConfig::default()).unwrap();
        assert_eq!(path, dir.path().join("omniscape_config.ini"));
        assert!(std::fs::read_to_string(path).unwrap().contains("radius = 50"));
    }

    #[test]
    fn arguments_fill_placeholders() {
        let solver = ProcessSolver::new(SolverConfig::default());
        let req = request(Path::new("/case"));
        let args = solver.arguments(&req, Path::new("/case/omniscape_config.ini"));
        assert_eq!(
            args,
            vec![
                "-e".to_string(),
                "using Omniscape; run_omniscape(\"/case/omniscape_config.ini\")".to_string()
            ]
        );
    }

    #[test]
    fn locate_requires_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("proj_file.tif"), b"x").unwrap();
        assert!(matches!(
            locate_outputs(dir.path(), "proj"),
            Err(SolverError::NoOutputDirectory { .. })
        ));
    }

    #[test]
    fn locate_reports_missing_rasters() {
        let dir = TempDir::new().unwrap();
        touch_outputs(&dir.path().join("proj_1"), &[CUM_CURRMAP]);
        match locate_outputs(dir.path(), "proj") {
            Err(SolverError::MissingOutputs { missing, .. }) => {
                assert_eq!(missing, vec![FLOW_POTENTIAL, NORMALIZED_CUM_CURRMAP]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn locate_accepts_complete_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("proj_2");
        touch_outputs(&out, &REQUIRED_OUTPUTS);
        let output = locate_outputs(dir.path(), "proj").unwrap();
        assert_eq!(output.dir, out);
        assert_eq!(output.flow_potential, out.join(FLOW_POTENTIAL));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let solver = ProcessSolver::new(SolverConfig::command(
            "flowscape-no-such-solver-binary",
            vec![],
        ));
        let ctx = CaseContext::detached("solver");
        assert!(matches!(
            solver.run(&ctx, &request(dir.path())),
            Err(SolverError::Spawn { .. })
        ));
    }
}
