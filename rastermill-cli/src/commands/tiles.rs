//! `tiles` subcommand: data-parallel processing of one raster by grid.

use clap::Args;
use rastermill::config::ConfigFile;
use rastermill::transform::{CommandTransform, TransformContext};
use rastermill::{Extent, GridSpec, RunConfig, RunOutcome, Runner, WorkCatalog};
use std::path::PathBuf;
use tracing::info;

use super::common::{print_report, resolve_settings};
use crate::error::CliError;

/// Default file name for the composite manifest.
const DEFAULT_MOSAIC_NAME: &str = "mosaic.json";

/// Arguments for the `tiles` subcommand.
#[derive(Debug, Args)]
pub struct TilesArgs {
    /// Source raster to subdivide
    #[arg(long)]
    pub input: PathBuf,

    /// Full processing extent as xmin,ymin,xmax,ymax
    #[arg(long, value_parser = parse_extent)]
    pub extent: Extent,

    /// Number of grid rows
    #[arg(long)]
    pub rows: u32,

    /// Number of grid columns
    #[arg(long)]
    pub cols: u32,

    /// Artifact extension, leading dot included
    #[arg(long)]
    pub ext: Option<String>,

    /// Directory tile artifacts are written under
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Composite manifest path (default: {output_dir}/mosaic.json)
    #[arg(long)]
    pub mosaic: Option<PathBuf>,

    /// Output cell size passed to the transform as {cellsize}
    #[arg(long)]
    pub cell_size: Option<f64>,

    /// Raster whose cell alignment outputs should snap to
    #[arg(long)]
    pub snap: Option<PathBuf>,

    /// Transform command template; placeholders: {input} {output} {id}
    /// {xmin} {ymin} {xmax} {ymax} {cellsize}
    #[arg(long)]
    pub cmd: String,

    /// Worker thread count (default: available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Parses `xmin,ymin,xmax,ymax` into a validated extent.
fn parse_extent(raw: &str) -> Result<Extent, String> {
    let bounds: Vec<f64> = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", part.trim()))
        })
        .collect::<Result<_, _>>()?;
    if bounds.len() != 4 {
        return Err("expected xmin,ymin,xmax,ymax".to_string());
    }
    Extent::new(bounds[0], bounds[1], bounds[2], bounds[3]).map_err(|e| e.to_string())
}

/// Runs a data-parallel grid over the source raster and composes the result.
pub fn run(args: TilesArgs) -> Result<RunOutcome, CliError> {
    let config = ConfigFile::load()?;
    let settings = resolve_settings(&config, args.output_dir, args.ext, args.workers);

    let grid = GridSpec::new(args.rows, args.cols)?;
    let catalog = WorkCatalog::from_grid(&args.extent, &grid);
    info!(
        tiles = catalog.len(),
        rows = args.rows,
        cols = args.cols,
        "Tile catalog built"
    );

    let transform = CommandTransform::from_template(&args.cmd)?;
    let mosaic_target = args
        .mosaic
        .unwrap_or_else(|| settings.output_dir.join(DEFAULT_MOSAIC_NAME));
    let context = TransformContext {
        clip_extent: None,
        cell_size: args.cell_size,
        snap_source: args.snap,
    };

    let run_config = RunConfig::new(settings.output_dir, settings.extension)
        .with_pool(settings.pool)
        .with_source(args.input)
        .with_mosaic_target(mosaic_target)
        .with_context(context);

    let report = Runner::new(run_config).execute(catalog, &transform)?;
    print_report(&report);
    Ok(report.outcome())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extent_valid() {
        let extent = parse_extent("0, 0, 100, 50").unwrap();
        assert_eq!(extent, Extent::new(0.0, 0.0, 100.0, 50.0).unwrap());
    }

    #[test]
    fn test_parse_extent_wrong_arity() {
        assert!(parse_extent("0,0,100").is_err());
        assert!(parse_extent("0,0,100,50,7").is_err());
    }

    #[test]
    fn test_parse_extent_rejects_non_numbers() {
        assert!(parse_extent("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_extent_rejects_degenerate() {
        assert!(parse_extent("100,0,0,50").is_err());
    }
}
