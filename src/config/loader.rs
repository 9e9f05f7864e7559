//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// A relative `config_dir` is resolved against the directory holding the
/// configuration file itself.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: EngineConfig = toml::from_str(&content)?;

    if let Some(base) = path.parent() {
        if config.paths.config_dir.is_relative() && !config.paths.config_dir.as_os_str().is_empty() {
            config.paths.config_dir = base.join(&config.paths.config_dir);
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
