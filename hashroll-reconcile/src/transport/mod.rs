//! The capability set the reconciler drives against a control plane.
//!
//! The real cluster client lives outside this crate; it only has to answer
//! these five calls and report a missing object as
//! [`TransportError::NotFound`]. Two in-process control planes ship here:
//! [`MemoryTransport`] for tests and embedding, [`FileTransport`] for the CLI.

pub mod admission;
pub mod file;
pub mod memory;

use hashroll_core::{LabelSelector, ManagedResource, ObjectKey, ResourceKind};

use crate::error::TransportError;

pub use admission::ClusterState;
pub use file::FileTransport;
pub use memory::{Call, MemoryTransport};

/// get / create / update / delete / list against a control plane.
///
/// Calls block until the control plane answers. Implementations impose their
/// own timeouts; callers never retry.
pub trait ResourceTransport {
    fn get(&self, key: &ObjectKey) -> Result<ManagedResource, TransportError>;

    /// Create `obj`; returns the stored object with server-assigned fields.
    fn create(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError>;

    /// Replace the stored object. `obj.metadata.resource_version` must match.
    fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError>;

    fn delete(&self, key: &ObjectKey) -> Result<(), TransportError>;

    /// Objects of `kind` matching `selector`. `namespace: None` lists across
    /// all namespaces.
    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<ManagedResource>, TransportError>;
}

impl<T: ResourceTransport + ?Sized> ResourceTransport for &T {
    fn get(&self, key: &ObjectKey) -> Result<ManagedResource, TransportError> {
        (**self).get(key)
    }

    fn create(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        (**self).create(obj)
    }

    fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        (**self).update(obj)
    }

    fn delete(&self, key: &ObjectKey) -> Result<(), TransportError> {
        (**self).delete(key)
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<ManagedResource>, TransportError> {
        (**self).list(kind, namespace, selector)
    }
}
