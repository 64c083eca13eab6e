//! Rastermill CLI - command-line interface.
//!
//! Thin clap surface over the rastermill library: `batch` for task-parallel
//! file processing, `tiles` for data-parallel grid processing, `config` for
//! the settings file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use rastermill::RunOutcome;
use std::process::ExitCode;

use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "rastermill",
    version,
    about = "Parallel raster transform runner"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Transform many independent rasters in parallel
    Batch(commands::batch::BatchArgs),

    /// Subdivide one raster into a grid and transform the tiles in parallel
    Tiles(commands::tiles::TilesArgs),

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

fn main() -> ExitCode {
    rastermill::telemetry::init_tracing("info");

    let cli = Cli::parse();
    let result: Result<RunOutcome, CliError> = match cli.command {
        Commands::Batch(args) => commands::batch::run(args),
        Commands::Tiles(args) => commands::tiles::run(args),
        Commands::Config { command } => commands::config::run(command).map(|()| RunOutcome::Empty),
    };

    match result {
        Ok(outcome) => commands::common::exit_code(outcome),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
