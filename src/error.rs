//! Error types for aws-infra-mcp.
//!
//! Only [`ConfigError`], [`RegistrationError`] and [`ServeError`] ever abort
//! the process. Everything that can go wrong while answering a single
//! request is turned into a response instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while building the resource and tool registries.
///
/// These happen at startup only; a registry that was built successfully
/// never produces them at runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A literal resource with this URI already exists.
    #[error("duplicate resource: {uri}")]
    DuplicateResource {
        /// The URI registered twice.
        uri: String,
    },

    /// A template overlaps with an existing template or literal resource.
    #[error("ambiguous resource template {pattern}: overlaps {conflict}")]
    AmbiguousTemplate {
        /// The pattern being registered (or the template already claiming a literal).
        pattern: String,
        /// The existing URI or pattern it collides with.
        conflict: String,
    },

    /// The template pattern is malformed.
    #[error("invalid resource template {pattern}: {reason}")]
    InvalidTemplate {
        /// The offending pattern.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A tool with this name already exists.
    #[error("duplicate tool: {name}")]
    DuplicateTool {
        /// The tool name registered twice.
        name: String,
    },
}

/// Fatal conditions that stop the transport loop.
#[derive(Error, Debug)]
pub enum ServeError {
    /// Reading from or writing to the stream failed.
    #[error("transport fault: {0}")]
    Transport(#[from] std::io::Error),

    /// The shutdown signal was observed between messages.
    #[error("server cancelled")]
    Cancelled,
}
