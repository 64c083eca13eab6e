//! `batch` subcommand: task-parallel processing of independent rasters.

use clap::Args;
use rastermill::config::ConfigFile;
use rastermill::transform::CommandTransform;
use rastermill::{RunConfig, RunOutcome, Runner, WorkCatalog};
use std::path::PathBuf;
use tracing::info;

use super::common::{print_report, resolve_settings};
use crate::error::CliError;

/// Arguments for the `batch` subcommand.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Input raster files, one work item each
    #[arg(value_name = "FILE", conflicts_with = "input_dir")]
    pub inputs: Vec<PathBuf>,

    /// Enumerate input rasters from this directory instead
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Artifact extension, leading dot included (also filters --input-dir)
    #[arg(long)]
    pub ext: Option<String>,

    /// Directory artifacts are written under
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Transform command template; placeholders: {input} {output} {id}
    #[arg(long)]
    pub cmd: String,

    /// Worker thread count (default: available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Runs a task-parallel batch over the input files.
pub fn run(args: BatchArgs) -> Result<RunOutcome, CliError> {
    let config = ConfigFile::load()?;
    let settings = resolve_settings(&config, args.output_dir, args.ext, args.workers);

    let catalog = match (&args.input_dir, args.inputs.is_empty()) {
        (Some(dir), _) => WorkCatalog::from_dir(dir, &settings.extension)?,
        (None, false) => WorkCatalog::from_file_list(args.inputs),
        (None, true) => {
            return Err(CliError::Config(
                "no inputs: pass FILE arguments or --input-dir".to_string(),
            ))
        }
    };
    info!(items = catalog.len(), "Batch catalog built");

    let transform = CommandTransform::from_template(&args.cmd)?;
    let run_config = RunConfig::new(settings.output_dir, settings.extension)
        .with_pool(settings.pool);

    let report = Runner::new(run_config).execute(catalog, &transform)?;
    print_report(&report);
    Ok(report.outcome())
}
