//! Shared helpers for run-style subcommands.

use rastermill::config::ConfigFile;
use rastermill::{PoolConfig, RunOutcome, RunReport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Default artifact extension when neither flag nor config supplies one.
pub const DEFAULT_EXTENSION: &str = ".tif";

/// Default output directory when neither flag nor config supplies one.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Settings shared by `batch` and `tiles`, resolved from flags over the
/// configuration file over built-in defaults.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub extension: String,
    pub pool: PoolConfig,
}

/// Resolves run settings: a flag wins over the config file, which wins over
/// the defaults.
pub fn resolve_settings(
    config: &ConfigFile,
    output_dir: Option<PathBuf>,
    extension: Option<String>,
    workers: Option<usize>,
) -> RunSettings {
    let output_dir = output_dir
        .or_else(|| config.output.directory.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let extension = extension
        .or_else(|| config.output.extension.clone())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    let mut pool = PoolConfig::default();
    if let Some(workers) = workers.or(config.run.workers) {
        pool = pool.with_workers(workers);
    }
    if let Some(ms) = config.run.poll_timeout_ms {
        pool.poll_timeout = Duration::from_millis(ms);
    }

    RunSettings {
        output_dir,
        extension,
        pool,
    }
}

/// Prints the end-of-run summary, enumerating every failed item.
pub fn print_report(report: &RunReport) {
    print!("{}", report);
    println!("  metrics: {}", report.metrics);
}

/// Maps the run outcome to the process exit status: 0 when everything
/// succeeded (or there was nothing to do), 2 when some items failed.
pub fn exit_code(outcome: RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Empty | RunOutcome::AllSucceeded => ExitCode::SUCCESS,
        RunOutcome::PartialFailure => ExitCode::from(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rastermill::config::{OutputSection, RunSection};

    #[test]
    fn test_flag_beats_config_beats_default() {
        let config = ConfigFile {
            run: RunSection {
                workers: Some(3),
                poll_timeout_ms: Some(10),
            },
            output: OutputSection {
                directory: Some(PathBuf::from("/from/config")),
                extension: Some(".img".into()),
            },
        };

        let flags = resolve_settings(
            &config,
            Some(PathBuf::from("/from/flag")),
            Some(".tif".into()),
            Some(7),
        );
        assert_eq!(flags.output_dir, PathBuf::from("/from/flag"));
        assert_eq!(flags.extension, ".tif");
        assert_eq!(flags.pool.workers, 7);
        assert_eq!(flags.pool.poll_timeout, Duration::from_millis(10));

        let from_config = resolve_settings(&config, None, None, None);
        assert_eq!(from_config.output_dir, PathBuf::from("/from/config"));
        assert_eq!(from_config.extension, ".img");
        assert_eq!(from_config.pool.workers, 3);

        let defaults = resolve_settings(&ConfigFile::default(), None, None, None);
        assert_eq!(defaults.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(defaults.extension, DEFAULT_EXTENSION);
    }
}
