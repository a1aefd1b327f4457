//! # hashroll-reconcile
//!
//! Idempotent reconciliation of a component's objects against a control
//! plane, with content-addressed versions of its trusted CA bundle.
//!
//! Build a [`ComponentTask`] from a config, a [`ResourceTransport`] and a
//! [`ManifestSource`](hashroll_manifests::ManifestSource), then call
//! [`ComponentTask::run`] once per reconciliation trigger.

pub mod error;
pub mod merge;
pub mod reconciler;
pub mod task;
pub mod transport;
pub mod version;

pub use error::{Operation, ReconcileError, TaskError, TransportError, VersionError};
pub use merge::MergePlan;
pub use reconciler::{Applied, Reconciler};
pub use task::{ComponentTask, Direction, PassReport, Step, StepReport};
pub use transport::{Call, ClusterState, FileTransport, MemoryTransport, ResourceTransport};
pub use version::{content_hash, prune_all_versions, prune_stale_versions, version, VersionedConfig};
