//! Error types for hashroll-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving a [`ComponentConfig`](crate::config::ComponentConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, disk full, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// The file parsed but describes an unusable component.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while interpreting resource-shaped documents.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    #[error("invalid label selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("{kind} document is missing {field}")]
    MissingField { kind: String, field: &'static str },

    #[error("resource YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("resource JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
