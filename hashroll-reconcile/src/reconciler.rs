//! Idempotent ensure-present / ensure-absent over a [`ResourceTransport`].
//!
//! `NotFound` is the only transport error interpreted here: create on absent,
//! success on delete-absent. Everything else is returned with the operation
//! and object attached, never retried.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use hashroll_core::{ManagedResource, ObjectKey};

use crate::error::{Operation, ReconcileError};
use crate::merge::{self, MergePlan};
use crate::transport::ResourceTransport;

/// What a single ensure call did to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    Created,
    Updated,
    /// Deleted and created again because an immutable field changed.
    Recreated,
    /// Already present and left alone (create-if-absent objects).
    Unchanged,
    Deleted,
    AlreadyAbsent,
    /// Nothing to do yet (e.g. no source data to version).
    Skipped,
}

impl Applied {
    /// Whether the control plane was written to.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Applied::Created | Applied::Updated | Applied::Recreated | Applied::Deleted
        )
    }
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Applied::Created => "created",
            Applied::Updated => "updated",
            Applied::Recreated => "recreated",
            Applied::Unchanged => "unchanged",
            Applied::Deleted => "deleted",
            Applied::AlreadyAbsent => "already absent",
            Applied::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

pub struct Reconciler<'a, T: ResourceTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: ResourceTransport + ?Sized> Reconciler<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Reconciler { transport }
    }

    /// Create `desired` if missing, otherwise merge it onto the stored object
    /// and update.
    pub fn ensure_present(&self, desired: &ManagedResource) -> Result<Applied, ReconcileError> {
        let key = desired.key();
        let Some(existing) = self.lookup(&key)? else {
            self.create(&key, desired)?;
            return Ok(Applied::Created);
        };

        match merge::plan(&existing, desired) {
            MergePlan::Update(merged) => {
                self.transport
                    .update(&merged)
                    .map_err(|e| ReconcileError::transport(Operation::Update, key.clone(), e))?;
                info!(object = %key, "updated");
                Ok(Applied::Updated)
            }
            MergePlan::Recreate => {
                info!(object = %key, "immutable field changed; recreating");
                self.delete(&key)?;
                self.create(&key, desired)?;
                Ok(Applied::Recreated)
            }
        }
    }

    /// Create `desired` only if nothing by that name exists.
    ///
    /// For objects another controller fills in after creation; an update
    /// would wipe what it wrote.
    pub fn ensure_created(&self, desired: &ManagedResource) -> Result<Applied, ReconcileError> {
        let key = desired.key();
        if self.lookup(&key)?.is_some() {
            debug!(object = %key, "exists; leaving as is");
            return Ok(Applied::Unchanged);
        }
        self.create(&key, desired)?;
        Ok(Applied::Created)
    }

    pub fn ensure_absent(&self, desired: &ManagedResource) -> Result<Applied, ReconcileError> {
        self.ensure_absent_key(&desired.key())
    }

    pub fn ensure_absent_key(&self, key: &ObjectKey) -> Result<Applied, ReconcileError> {
        match self.transport.delete(key) {
            Ok(()) => {
                info!(object = %key, "deleted");
                Ok(Applied::Deleted)
            }
            Err(e) if e.is_not_found() => {
                debug!(object = %key, "already absent");
                Ok(Applied::AlreadyAbsent)
            }
            Err(e) => Err(ReconcileError::transport(Operation::Delete, key.clone(), e)),
        }
    }

    fn lookup(&self, key: &ObjectKey) -> Result<Option<ManagedResource>, ReconcileError> {
        match self.transport.get(key) {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => {
                debug!(object = %key, "not found");
                Ok(None)
            }
            Err(e) => Err(ReconcileError::transport(Operation::Get, key.clone(), e)),
        }
    }

    fn create(&self, key: &ObjectKey, desired: &ManagedResource) -> Result<(), ReconcileError> {
        self.transport
            .create(desired)
            .map_err(|e| ReconcileError::transport(Operation::Create, key.clone(), e))?;
        info!(object = %key, "created");
        Ok(())
    }

    fn delete(&self, key: &ObjectKey) -> Result<(), ReconcileError> {
        self.transport
            .delete(key)
            .map_err(|e| ReconcileError::transport(Operation::Delete, key.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::MemoryTransport;
    use hashroll_core::ResourceKind;
    use serde_json::json;

    fn service() -> ManagedResource {
        ManagedResource::new(ResourceKind::Service, Some("ns"), "web")
            .with_field(&["spec", "ports"], json!([{ "port": 8443 }]))
    }

    #[test]
    fn second_ensure_present_updates_and_preserves_server_fields() {
        let t = MemoryTransport::new();
        let r = Reconciler::new(&t);

        assert_eq!(r.ensure_present(&service()).unwrap(), Applied::Created);
        let first = t.object(&service().key()).unwrap();

        assert_eq!(r.ensure_present(&service()).unwrap(), Applied::Updated);
        let second = t.object(&service().key()).unwrap();

        assert_eq!(second.metadata.uid, first.metadata.uid);
        assert_eq!(second.field(&["spec", "clusterIP"]), first.field(&["spec", "clusterIP"]));
        assert_eq!(t.count(Operation::Create), 1);
        assert_eq!(t.count(Operation::Update), 1);
    }

    #[test]
    fn ensure_absent_tolerates_missing_object() {
        let t = MemoryTransport::new();
        let r = Reconciler::new(&t);
        assert_eq!(r.ensure_absent(&service()).unwrap(), Applied::AlreadyAbsent);
        assert_eq!(r.ensure_absent(&service()).unwrap(), Applied::AlreadyAbsent);
    }

    #[test]
    fn ensure_absent_deletes_existing() {
        let t = MemoryTransport::new();
        let r = Reconciler::new(&t);
        r.ensure_present(&service()).unwrap();
        assert_eq!(r.ensure_absent(&service()).unwrap(), Applied::Deleted);
        assert!(t.object(&service().key()).is_none());
    }

    #[test]
    fn get_failure_is_surfaced_with_context() {
        let t = MemoryTransport::new();
        t.fail_next(Operation::Get, ResourceKind::Service, None);
        let err = Reconciler::new(&t).ensure_present(&service()).unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Transport {
                op: Operation::Get,
                source: TransportError::Unavailable(_),
                ..
            }
        ));
        assert_eq!(t.count(Operation::Create), 0, "no create after failed read");
        assert!(err.to_string().starts_with("getting Service ns/web failed"), "got {err}");
    }

    #[test]
    fn ensure_created_never_overwrites() {
        let t = MemoryTransport::new();
        let r = Reconciler::new(&t);
        let bundle = ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "bundle");
        assert_eq!(r.ensure_created(&bundle).unwrap(), Applied::Created);

        let mut injected = t.object(&bundle.key()).unwrap();
        injected.set_field(&["data", "service-ca.crt"], json!("PEM"));
        t.insert(injected);

        assert_eq!(r.ensure_created(&bundle).unwrap(), Applied::Unchanged);
        let stored = t.object(&bundle.key()).unwrap();
        assert_eq!(stored.field(&["data", "service-ca.crt"]), Some(&json!("PEM")));
        assert_eq!(t.count(Operation::Update), 0);
    }

    #[test]
    fn changed_role_ref_recreates() {
        let t = MemoryTransport::new();
        let r = Reconciler::new(&t);
        let binding = |role: &str| {
            ManagedResource::new(ResourceKind::ClusterRoleBinding, None, "b")
                .with_field(&["roleRef", "name"], json!(role))
        };
        r.ensure_present(&binding("a")).unwrap();
        assert_eq!(r.ensure_present(&binding("b")).unwrap(), Applied::Recreated);
        let stored = t.object(&binding("b").key()).unwrap();
        assert_eq!(stored.field(&["roleRef", "name"]), Some(&json!("b")));
    }
}
