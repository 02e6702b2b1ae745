//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "AIOPS_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Server identity reported during initialisation.
    #[serde(default)]
    pub server: ServerConfig,

    /// Cloud provider settings.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "server.name cannot be empty".to_string(),
            });
        }

        if self.aws.region.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "aws.region cannot be empty".to_string(),
            });
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }

    /// Applies `AIOPS_*` overrides on top of the file values.
    ///
    /// Server identity also accepts the `AIOPS_MCP_SERVER_NAME` and
    /// `AIOPS_MCP_VERSION` spellings; the shorter names win when both are set.
    ///
    /// `lookup` resolves a variable name to its value; pass
    /// `|key| std::env::var(key).ok()` for the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        if let Some(name) = var("SERVER_NAME").or_else(|| var("MCP_SERVER_NAME")) {
            self.server.name = name;
        }
        if let Some(version) = var("SERVER_VERSION").or_else(|| var("MCP_VERSION")) {
            self.server.version = version;
        }
        if let Some(region) = var("AWS_REGION") {
            self.aws.region = region;
        }
        if let Some(level) = var("LOGGING_LEVEL") {
            self.logging.level = level;
        }
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name reported in `serverInfo`.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Version reported in `serverInfo`.
    #[serde(default = "default_server_version")]
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            version: default_server_version(),
        }
    }
}

fn default_server_name() -> String {
    "aws-mcp-server".to_string()
}

fn default_server_version() -> String {
    "1.0.0".to_string()
}

/// Cloud provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// Region that infrastructure objects are reported in.
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
        }
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
