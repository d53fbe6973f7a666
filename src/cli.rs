//! The pipeline command-line front end.
//!
//! Binaries register their pipelines by name and delegate to
//! [`run`]:
//!
//! ```ignore
//! fn main() -> std::process::ExitCode {
//!     let mut pipelines: BTreeMap<&str, PipelineFn> = BTreeMap::new();
//!     pipelines.insert("sessions", build_sessions_pipeline);
//!     keymill::cli::run(&pipelines)
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::errinput;
use crate::error::Result;
use crate::pipeline::Pipeline;

/// The environment a pipeline builder gets: where its databases live
/// and how many workers each stage's transform may use.
pub struct PipelineEnv {
    pub db_root: PathBuf,
    pub workers: usize,
}

/// Builds a pipeline for the given environment. Builders construct
/// fresh stores and stages on each call; running a pipeline consumes
/// it.
pub type PipelineFn = fn(&PipelineEnv) -> Result<Pipeline>;

#[derive(Debug, Parser)]
#[command(name = "keymill", about = "Run key-ordered record pipelines")]
struct Args {
    /// Directory holding the pipelines' databases
    db_root: PathBuf,

    /// Name of the pipeline to run
    pipeline: String,

    /// List the pipeline's stages and exit
    #[arg(long)]
    list_stages: bool,

    /// Comma separated list of stages to run
    #[arg(long, value_name = "NAMES")]
    run_only: Option<String>,

    /// Run this stage and all stages following it
    #[arg(long, value_name = "NAME", conflicts_with = "run_only")]
    run_from: Option<String>,

    /// Number of worker threads for record-level transforms
    #[arg(long)]
    workers: Option<usize>,
}

/// The default transform worker count: twice the available cores.
pub fn default_workers() -> usize {
    2 * std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

/// Parses the command line, builds the selected pipeline, and runs (or
/// lists) it. Returns a failure exit code for unknown pipeline or stage
/// names and for fatal store errors.
pub fn run(pipelines: &BTreeMap<&str, PipelineFn>) -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    match execute(Args::parse(), pipelines) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keymill: {e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args, pipelines: &BTreeMap<&str, PipelineFn>) -> Result<()> {
    let Some(build) = pipelines.get(args.pipeline.as_str()) else {
        let known: Vec<_> = pipelines.keys().copied().collect();
        return Err(errinput!(
            "unknown pipeline {}; available: {}",
            args.pipeline,
            known.join(", ")
        ));
    };

    let env = PipelineEnv {
        db_root: args.db_root,
        workers: args.workers.unwrap_or_else(default_workers),
    };
    let mut pipeline = build(&env)?;

    if args.list_stages {
        for name in pipeline.stage_names() {
            println!("{name}");
        }
        return Ok(());
    }

    if let Some(names) = &args.run_only {
        let names: Vec<&str> = names.split(',').collect();
        pipeline = pipeline.select_only(&names)?;
    } else if let Some(name) = &args.run_from {
        pipeline = pipeline.select_from(name)?;
    }

    pipeline.run(env.workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transform::Stage;

    fn empty_pipeline(_env: &PipelineEnv) -> Result<Pipeline> {
        Ok(Pipeline::new(vec![Stage::new("first"), Stage::new("second")]))
    }

    fn registry() -> BTreeMap<&'static str, PipelineFn> {
        let mut pipelines: BTreeMap<&str, PipelineFn> = BTreeMap::new();
        pipelines.insert("demo", empty_pipeline);
        pipelines
    }

    #[test]
    fn parses_selection_flags() {
        let args = Args::try_parse_from([
            "keymill",
            "/tmp/db",
            "demo",
            "--run-only",
            "first,second",
            "--workers",
            "3",
        ])
        .unwrap();
        assert_eq!(args.pipeline, "demo");
        assert_eq!(args.run_only.as_deref(), Some("first,second"));
        assert_eq!(args.workers, Some(3));
    }

    #[test]
    fn run_only_and_run_from_conflict() {
        let result = Args::try_parse_from([
            "keymill",
            "/tmp/db",
            "demo",
            "--run-only",
            "a",
            "--run-from",
            "b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_pipeline_is_an_input_error() {
        let args = Args::try_parse_from(["keymill", "/tmp/db", "nope"]).unwrap();
        assert!(matches!(
            execute(args, &registry()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn unknown_stage_is_an_input_error() {
        let args =
            Args::try_parse_from(["keymill", "/tmp/db", "demo", "--run-from", "missing"]).unwrap();
        assert!(matches!(
            execute(args, &registry()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn listing_stages_succeeds_without_running() {
        let args = Args::try_parse_from(["keymill", "/tmp/db", "demo", "--list-stages"]).unwrap();
        execute(args, &registry()).unwrap();
    }

    #[test]
    fn runs_the_selected_tail() {
        let args =
            Args::try_parse_from(["keymill", "/tmp/db", "demo", "--run-from", "second"]).unwrap();
        execute(args, &registry()).unwrap();
    }
}
