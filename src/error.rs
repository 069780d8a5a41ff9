use std::path::PathBuf;
use thiserror::Error;

use crate::engine::SessionState;

/// Core library errors
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error at path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Selection contains '{path}' from plugin '{plugin_id}', which is not part of the last scan")]
    StaleSelection { plugin_id: String, path: PathBuf },

    #[error("Session cannot move from {from:?} to {to:?}")]
    InvalidState { from: SessionState, to: SessionState },

    #[error("Invalid plugin: {0}")]
    Registry(#[from] RegistryValidationError),

    #[error("History error: {0}")]
    History(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Reasons a discovered plugin is rejected by the registry.
///
/// These are logged and the plugin is excluded; they never abort discovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryValidationError {
    #[error("plugin id is empty")]
    EmptyId,

    #[error("plugin id '{0}' may only contain lowercase letters, digits, '_' and '-'")]
    MalformedId(String),

    #[error("plugin '{0}' has an empty name")]
    EmptyName(String),

    #[error("plugin '{id}' declares unknown risk level '{value}'")]
    UnknownRisk { id: String, value: String },

    #[error("plugin '{id}' declares unknown category '{value}'")]
    UnknownCategory { id: String, value: String },

    #[error("plugin '{0}' declares no paths")]
    NoPaths(String),

    #[error("failed to parse manifest '{path}': {message}")]
    Manifest { path: PathBuf, message: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SweepError>;
