//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given as the `CONFIG_FILE` CLI argument (must exist)
//! 2. Default location (optional, defaults apply when absent):
//!    - **Linux/macOS:** `~/.aws-infra-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.aws-infra-mcp\config.json`
//!
//! Values read from the file can be overridden with `AIOPS_*` environment
//! variables, see [`Config::apply_env_overrides`].

mod settings;

pub use settings::{AwsConfig, Config, LoggingConfig, ServerConfig, ENV_PREFIX};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.aws-infra-mcp/`
/// - **Windows:** `%USERPROFILE%\.aws-infra-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".aws-infra-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file, then applies environment
/// overrides from the process environment.
///
/// If `path` is `None`, uses the platform-specific default location and
/// falls back to built-in defaults when no file exists there.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required fields are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => read_config_file(p)?,
        None => match default_config_path() {
            Some(p) if p.exists() => read_config_file(&p)?,
            _ => Config::default(),
        },
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());

    // Validate the configuration
    config.validate()?;

    Ok(config)
}

fn read_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound {
            path: config_path.to_path_buf(),
        });
    }

    let contents = std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.to_path_buf(),
        source: e,
    })
}
