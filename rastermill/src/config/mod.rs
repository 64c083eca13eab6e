//! Persistent configuration file.
//!
//! Settings live in an INI file at `~/.config/rastermill/config.ini`
//! (platform equivalent via `dirs`). Command-line flags always take
//! precedence; the file only supplies defaults.
//!
//! ```ini
//! [run]
//! workers = 8
//! poll_timeout_ms = 50
//!
//! [output]
//! directory = /data/out
//! extension = .tif
//! ```

use ini::Ini;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Returns the platform config file path.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rastermill")
        .join("config.ini")
}

/// The `[run]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSection {
    /// Worker thread count; absent means available parallelism.
    pub workers: Option<usize>,

    /// Queue poll guard interval in milliseconds.
    pub poll_timeout_ms: Option<u64>,
}

/// The `[output]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSection {
    /// Default output directory.
    pub directory: Option<PathBuf>,

    /// Default artifact extension, leading dot included.
    pub extension: Option<String>,
}

/// In-memory representation of the configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub run: RunSection,
    pub output: OutputSection,
}

impl ConfigFile {
    /// Loads from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut config = Self::default();
        config.run.workers = parse_opt(&ini, "run", "workers")?;
        config.run.poll_timeout_ms = parse_opt(&ini, "run", "poll_timeout_ms")?;
        config.output.directory = ini
            .get_from(Some("output"), "directory")
            .map(PathBuf::from);
        config.output.extension = ini
            .get_from(Some("output"), "extension")
            .map(str::to_owned);
        Ok(config)
    }

    /// Saves to the default path, creating parent directories as needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut ini = Ini::new();
        if let Some(workers) = self.run.workers {
            ini.with_section(Some("run"))
                .set("workers", workers.to_string());
        }
        if let Some(ms) = self.run.poll_timeout_ms {
            ini.with_section(Some("run"))
                .set("poll_timeout_ms", ms.to_string());
        }
        if let Some(directory) = &self.output.directory {
            ini.with_section(Some("output"))
                .set("directory", directory.to_string_lossy().into_owned());
        }
        if let Some(extension) = &self.output.extension {
            ini.with_section(Some("output"))
                .set("extension", extension.clone());
        }
        ini.write_to_file(path).map_err(io_err)
    }
}

fn parse_opt<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    match ini.get_from(Some(section), key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("{}.{}", section, key),
                value: raw.to_owned(),
            }),
    }
}

/// A settable configuration key, for the CLI's `config` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    RunWorkers,
    RunPollTimeoutMs,
    OutputDirectory,
    OutputExtension,
}

impl ConfigKey {
    /// All keys, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::RunWorkers,
            ConfigKey::RunPollTimeoutMs,
            ConfigKey::OutputDirectory,
            ConfigKey::OutputExtension,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::RunWorkers => "run.workers",
            ConfigKey::RunPollTimeoutMs => "run.poll_timeout_ms",
            ConfigKey::OutputDirectory => "output.directory",
            ConfigKey::OutputExtension => "output.extension",
        }
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::RunWorkers | ConfigKey::RunPollTimeoutMs => "run",
            ConfigKey::OutputDirectory | ConfigKey::OutputExtension => "output",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::RunWorkers => "workers",
            ConfigKey::RunPollTimeoutMs => "poll_timeout_ms",
            ConfigKey::OutputDirectory => "directory",
            ConfigKey::OutputExtension => "extension",
        }
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::RunWorkers => config
                .run
                .workers
                .map(|w| w.to_string())
                .unwrap_or_default(),
            ConfigKey::RunPollTimeoutMs => config
                .run
                .poll_timeout_ms
                .map(|ms| ms.to_string())
                .unwrap_or_default(),
            ConfigKey::OutputDirectory => config
                .output
                .directory
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ConfigKey::OutputExtension => config.output.extension.clone().unwrap_or_default(),
        }
    }

    /// Parses and stores a new value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: self.name().to_owned(),
            value: value.to_owned(),
        };
        match self {
            ConfigKey::RunWorkers => {
                config.run.workers = Some(value.parse().map_err(|_| invalid())?);
            }
            ConfigKey::RunPollTimeoutMs => {
                config.run.poll_timeout_ms = Some(value.parse().map_err(|_| invalid())?);
            }
            ConfigKey::OutputDirectory => {
                config.output.directory = Some(PathBuf::from(value));
            }
            ConfigKey::OutputExtension => {
                if !value.starts_with('.') {
                    return Err(invalid());
                }
                config.output.extension = Some(value.to_owned());
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .find(|key| key.name() == s)
            .copied()
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        let config = ConfigFile {
            run: RunSection {
                workers: Some(8),
                poll_timeout_ms: Some(25),
            },
            output: OutputSection {
                directory: Some(PathBuf::from("/data/out")),
                extension: Some(".tif".into()),
            },
        };
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_leaves_rest_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[run]\nworkers = 3\n").unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.run.workers, Some(3));
        assert_eq!(loaded.run.poll_timeout_ms, None);
        assert_eq!(loaded.output.directory, None);
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[run]\nworkers = many\n").unwrap();

        assert!(matches!(
            ConfigFile::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_config_key_parse_and_roundtrip() {
        let key: ConfigKey = "run.workers".parse().unwrap();
        assert_eq!(key, ConfigKey::RunWorkers);
        assert!("run.threads".parse::<ConfigKey>().is_err());

        let mut config = ConfigFile::default();
        key.set(&mut config, "6").unwrap();
        assert_eq!(config.run.workers, Some(6));
        assert_eq!(key.get(&config), "6");
        assert!(key.set(&mut config, "lots").is_err());
    }

    #[test]
    fn test_extension_requires_leading_dot() {
        let mut config = ConfigFile::default();
        let key = ConfigKey::OutputExtension;
        assert!(key.set(&mut config, "tif").is_err());
        key.set(&mut config, ".tif").unwrap();
        assert_eq!(config.output.extension.as_deref(), Some(".tif"));
    }
}
