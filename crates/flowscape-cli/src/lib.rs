//! Flowscape command line
//!
//! One invocation runs one parameter sweep:
//! - every multi-valued sweep flag contributes one axis of the cross product
//! - `--regions H W` sets the tile matrix laid over each grid
//! - `--exit-nodes` restricts edge-region cases to tiles holding an exit node
//!
//! Settings come from `--config` (TOML) when given; the remaining flags
//! override it.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use flowscape_core::{
    FlowscapeConfig, GeoJsonPointSource, Orchestrator, Pipeline, PipelineExecutor, PointSource,
    SweepReport, SweepSpec,
};
use flowscape_grid::{SpatialReference, TileMatrix};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Argument definitions
#[must_use]
pub fn command() -> Command {
    let list = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .long(name)
            .required(true)
            .num_args(1..)
            .action(ArgAction::Append)
            .help(help)
    };

    Command::new("flowscape")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate connectivity cases over a parameter sweep and run the solver on each")
        .arg(list("city-groups", "City groups to process").value_parser(value_parser!(String)))
        .arg(
            list("expand-distances", "Network expansion distances in meters")
                .value_parser(value_parser!(u32)),
        )
        .arg(list("pixel-sizes", "Raster pixel sizes in meters").value_parser(value_parser!(u32)))
        .arg(
            list(
                "conductance-edge-buffers",
                "Distances from a road within which a pixel takes its capacity",
            )
            .value_parser(value_parser!(u32)),
        )
        .arg(
            list("population-edge-buffers", "Border pad widths in pixels")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            list("population-edge-buffer-values", "Source strength written into the border pad")
                .value_parser(value_parser!(f32)),
        )
        .arg(list("threads", "Solver thread counts").value_parser(value_parser!(u32)))
        .arg(list("radii", "Solver moving-window radii in pixels").value_parser(value_parser!(u32)))
        .arg(list("block-sizes", "Solver block sizes").value_parser(value_parser!(u32)))
        .arg(
            Arg::new("regions")
                .long("regions")
                .required(true)
                .num_args(2)
                .value_names(["H", "W"])
                .value_parser(value_parser!(usize))
                .help("Tile matrix rows and columns"),
        )
        .arg(
            Arg::new("exit-nodes")
                .long("exit-nodes")
                .value_parser(value_parser!(PathBuf))
                .help("GeoJSON points; only border tiles holding one get an edge-region case"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("output-root")
                .long("output-root")
                .value_parser(value_parser!(PathBuf))
                .help("Directory receiving the run folders"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding networks and population features"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .value_parser(value_parser!(usize))
                .help("Cases run concurrently (default: available parallelism)"),
        )
        .arg(
            Arg::new("spatial-reference")
                .long("spatial-reference")
                .help("Spatial reference of inputs and outputs, e.g. EPSG:3310"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
}

/// Everything one run needs, resolved from flags and configuration
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config: FlowscapeConfig,
    pub sweep: SweepSpec,
    pub matrix: TileMatrix,
    pub exit_nodes: Option<PathBuf>,
    pub log_json: bool,
}

impl Invocation {
    /// Resolve parsed arguments
    ///
    /// # Errors
    /// Unreadable or invalid configuration, an empty tile matrix or an
    /// invalid sweep
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => FlowscapeConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => FlowscapeConfig::default(),
        };
        if let Some(root) = matches.get_one::<PathBuf>("output-root") {
            config = config.with_output_root(root.clone());
        }
        if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
            config = config.with_data_dir(dir.clone());
        }
        if let Some(&workers) = matches.get_one::<usize>("workers") {
            config = config.with_max_workers(workers);
        }
        if let Some(sr) = matches.get_one::<String>("spatial-reference") {
            config = config.with_spatial_reference(SpatialReference::new(sr.clone()));
        }
        config.validate().context("invalid configuration")?;

        let sweep = SweepSpec {
            city_groups: values(matches, "city-groups"),
            expand_distances: values(matches, "expand-distances"),
            pixel_sizes: values(matches, "pixel-sizes"),
            conductance_edge_buffers: values(matches, "conductance-edge-buffers"),
            population_edge_buffers: values(matches, "population-edge-buffers"),
            population_edge_buffer_values: values(matches, "population-edge-buffer-values"),
            threads: values(matches, "threads"),
            radii: values(matches, "radii"),
            block_sizes: values(matches, "block-sizes"),
        };
        sweep.validate().context("invalid sweep")?;

        let regions: Vec<usize> = values(matches, "regions");
        let [rows, cols] = regions.as_slice() else {
            bail!("--regions takes exactly two values");
        };
        let matrix = TileMatrix::new(*rows, *cols).context("invalid --regions")?;

        Ok(Self {
            config,
            sweep,
            matrix,
            exit_nodes: matches.get_one::<PathBuf>("exit-nodes").cloned(),
            log_json: matches.get_flag("log-json"),
        })
    }
}

fn values<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, name: &str) -> Vec<T> {
    matches
        .get_many::<T>(name)
        .map(|v| v.cloned().collect())
        .unwrap_or_default()
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), text
/// or JSON lines on stderr
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // a subscriber installed earlier (tests) stays in place
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Run the sweep with the real pipeline
///
/// # Errors
/// Run folders that cannot be created; case failures are reported, not
/// returned
pub async fn run(invocation: &Invocation) -> anyhow::Result<SweepReport> {
    let config = &invocation.config;
    let executor = Arc::new(PipelineExecutor::new(Pipeline::from_config(config)));
    let orchestrator = Orchestrator::new(executor, config.workers());
    let points = invocation.exit_nodes.as_ref().map(GeoJsonPointSource::new);
    info!(
        combinations = invocation.sweep.len(),
        workers = orchestrator.workers(),
        output_root = %config.output_root.display(),
        "sweep started"
    );

    let report = orchestrator
        .run_sweep(
            &config.output_root,
            &invocation.sweep,
            invocation.matrix,
            points.as_ref().map(|p| p as &dyn PointSource),
        )
        .await
        .context("sweep aborted")?;
    info!(
        succeeded = report.succeeded(),
        total = report.total(),
        "sweep finished"
    );
    Ok(report)
}
