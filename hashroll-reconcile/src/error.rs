//! Error types for hashroll-reconcile.
//!
//! `NotFound` is the only transport failure the reconciler interprets; every
//! other failure is surfaced with the operation and object it hit.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use hashroll_core::ObjectKey;
use hashroll_manifests::{Manifest, ManifestError};

use crate::task::{Direction, Step};

/// The five calls a transport answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    Create,
    Update,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Get => "getting",
            Operation::Create => "creating",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
            Operation::List => "listing",
        };
        f.write_str(verb)
    }
}

/// Failure reported by a [`ResourceTransport`](crate::transport::ResourceTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{key} not found")]
    NotFound { key: ObjectKey },

    #[error("{key} already exists")]
    AlreadyExists { key: ObjectKey },

    /// Optimistic-concurrency failure: the object changed since it was read.
    #[error("conflict on {key}: {reason}")]
    Conflict { key: ObjectKey, reason: String },

    /// The control plane rejected the object.
    #[error("{key} is invalid: {reason}")]
    Invalid { key: ObjectKey, reason: String },

    #[error("control plane unavailable: {0}")]
    Unavailable(String),

    #[error("state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound { .. })
    }
}

/// Convenience constructor for [`TransportError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> TransportError {
    TransportError::Io {
        path: path.into(),
        source,
    }
}

/// A logical name that cannot be turned into versioned objects.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid logical name '{name}': {reason}")]
    InvalidLogicalName { name: String, reason: String },
}

/// Failure of a single reconciler, version-manager, or manifest call.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{op} {key} failed: {source}")]
    Transport {
        op: Operation,
        key: ObjectKey,
        #[source]
        source: TransportError,
    },

    /// The manifest collaborator could not produce the desired object.
    #[error("initializing {manifest} failed: {source}")]
    Construction {
        manifest: Manifest,
        #[source]
        source: ManifestError,
    },

    #[error("listing versions of {logical_name} failed: {source}")]
    ListVersions {
        logical_name: String,
        #[source]
        source: TransportError,
    },

    /// A stale version could not be deleted; the current version is kept.
    #[error("deleting stale version {name} failed: {source}")]
    Prune {
        name: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Version(#[from] VersionError),
}

impl ReconcileError {
    pub(crate) fn transport(op: Operation, key: ObjectKey, source: TransportError) -> Self {
        ReconcileError::Transport { op, key, source }
    }
}

/// A failed reconciliation pass, attributed to the step that stopped it.
#[derive(Debug, Error)]
#[error("{} {component} {step} failed: {source}", .direction.verb())]
pub struct TaskError {
    pub component: String,
    pub direction: Direction,
    pub step: Step,
    #[source]
    pub source: ReconcileError,
}
