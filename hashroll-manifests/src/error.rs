//! Error types for hashroll-manifests.

use std::path::PathBuf;

use thiserror::Error;

use hashroll_core::{ResourceError, ResourceKind};

/// All errors that can arise while producing a desired object.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The rendered text is not a valid resource document.
    #[error("rendered {template} is not a valid resource: {source}")]
    Resource {
        template: &'static str,
        #[source]
        source: ResourceError,
    },

    /// The template produced a different kind than the manifest declares.
    #[error("{template} rendered a {found}, expected a {expected}")]
    KindMismatch {
        template: &'static str,
        expected: ResourceKind,
        found: ResourceKind,
    },

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
