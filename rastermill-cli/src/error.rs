//! CLI error type.

use std::fmt;

use rastermill::catalog::CatalogError;
use rastermill::config::ConfigError;
use rastermill::{ExtentError, RunError, TransformError};

/// Errors surfaced to the user by the CLI.
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments or configuration.
    Config(String),

    /// Configuration file problem.
    ConfigFile(ConfigError),

    /// Catalog construction failed.
    Catalog(CatalogError),

    /// Extent or grid validation failed.
    Extent(ExtentError),

    /// Command template problem.
    Transform(TransformError),

    /// The run aborted before any worker started.
    Run(RunError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::Catalog(e) => write!(f, "Catalog error: {}", e),
            CliError::Extent(e) => write!(f, "Extent error: {}", e),
            CliError::Transform(e) => write!(f, "Transform error: {}", e),
            CliError::Run(e) => write!(f, "Run failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::ConfigFile(e) => Some(e),
            CliError::Catalog(e) => Some(e),
            CliError::Extent(e) => Some(e),
            CliError::Transform(e) => Some(e),
            CliError::Run(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<CatalogError> for CliError {
    fn from(e: CatalogError) -> Self {
        CliError::Catalog(e)
    }
}

impl From<ExtentError> for CliError {
    fn from(e: ExtentError) -> Self {
        CliError::Extent(e)
    }
}

impl From<TransformError> for CliError {
    fn from(e: TransformError) -> Self {
        CliError::Transform(e)
    }
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        CliError::Run(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_cause() {
        let err = CliError::Config("missing --cmd".to_string());
        assert!(err.to_string().contains("missing --cmd"));
    }

    #[test]
    fn test_from_extent_error() {
        let err: CliError = ExtentError::InvalidPartition { rows: 0, cols: 2 }.into();
        assert!(matches!(err, CliError::Extent(_)));
    }
}
