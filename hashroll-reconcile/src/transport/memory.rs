//! In-memory control plane with a call log and fault injection.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use hashroll_core::{LabelSelector, ManagedResource, ObjectKey, ResourceKind};

use crate::error::{Operation, TransportError};
use crate::transport::{ClusterState, ResourceTransport};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Call {
    pub op: Operation,
    pub kind: ResourceKind,
    /// `None` for list calls.
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
struct Fault {
    op: Operation,
    kind: ResourceKind,
    name: Option<String>,
    sticky: bool,
}

impl Fault {
    fn matches(&self, call: &Call) -> bool {
        self.op == call.op
            && self.kind == call.kind
            && (self.name.is_none() || self.name == call.name)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: ClusterState,
    calls: Vec<Call>,
    faults: Vec<Fault>,
}

/// [`ResourceTransport`] backed by a [`ClusterState`] behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: ClusterState) -> Self {
        MemoryTransport {
            inner: Mutex::new(Inner {
                state,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Fail the next matching call with [`TransportError::Unavailable`].
    /// `name: None` matches any object of `kind`.
    pub fn fail_next(&self, op: Operation, kind: ResourceKind, name: Option<&str>) {
        self.push_fault(op, kind, name, false);
    }

    /// Fail every matching call until [`clear_faults`](Self::clear_faults).
    pub fn fail_always(&self, op: Operation, kind: ResourceKind, name: Option<&str>) {
        self.push_fault(op, kind, name, true);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    fn push_fault(&self, op: Operation, kind: ResourceKind, name: Option<&str>, sticky: bool) {
        self.lock().faults.push(Fault {
            op,
            kind,
            name: name.map(str::to_owned),
            sticky,
        });
    }

    // ------------------------------------------------------------------
    // Inspection and seeding
    // ------------------------------------------------------------------

    /// Store `obj` as an external writer would; not recorded as a call.
    pub fn insert(&self, obj: ManagedResource) -> ManagedResource {
        self.lock().state.put(obj)
    }

    pub fn object(&self, key: &ObjectKey) -> Option<ManagedResource> {
        self.lock().state.get(key).ok()
    }

    /// Every stored object of `kind`, in key order.
    pub fn objects(&self, kind: ResourceKind) -> Vec<ManagedResource> {
        self.lock()
            .state
            .list(kind, None, &LabelSelector::new())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, op: Operation) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn snapshot(&self) -> ClusterState {
        self.lock().state.clone()
    }

    /// Record the call, then consume the first fault it trips.
    fn enter(&self, inner: &mut Inner, call: Call) -> Result<(), TransportError> {
        let tripped = inner.faults.iter().position(|f| f.matches(&call));
        inner.calls.push(call.clone());
        let Some(idx) = tripped else {
            return Ok(());
        };
        if !inner.faults[idx].sticky {
            inner.faults.remove(idx);
        }
        tracing::debug!(op = %call.op, kind = %call.kind, name = ?call.name, "injected fault");
        Err(TransportError::Unavailable(format!(
            "injected fault {} {}{}",
            call.op,
            call.kind,
            call.name.map(|n| format!(" {n}")).unwrap_or_default()
        )))
    }
}

fn call(op: Operation, kind: ResourceKind, name: Option<&str>) -> Call {
    Call {
        op,
        kind,
        name: name.map(str::to_owned),
    }
}

impl ResourceTransport for MemoryTransport {
    fn get(&self, key: &ObjectKey) -> Result<ManagedResource, TransportError> {
        let mut inner = self.lock();
        self.enter(&mut inner, call(Operation::Get, key.kind, Some(&key.name)))?;
        inner.state.get(key)
    }

    fn create(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        let mut inner = self.lock();
        self.enter(&mut inner, call(Operation::Create, obj.kind, Some(obj.name())))?;
        inner.state.create(obj)
    }

    fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        let mut inner = self.lock();
        self.enter(&mut inner, call(Operation::Update, obj.kind, Some(obj.name())))?;
        inner.state.update(obj)
    }

    fn delete(&self, key: &ObjectKey) -> Result<(), TransportError> {
        let mut inner = self.lock();
        self.enter(&mut inner, call(Operation::Delete, key.kind, Some(&key.name)))?;
        inner.state.delete(key)
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<ManagedResource>, TransportError> {
        let mut inner = self.lock();
        self.enter(&mut inner, call(Operation::List, kind, None))?;
        Ok(inner.state.list(kind, namespace, selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(name: &str) -> ManagedResource {
        ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), name)
    }

    #[test]
    fn records_calls_in_order() {
        let t = MemoryTransport::new();
        t.create(&cm("a")).unwrap();
        let _ = t.get(&cm("a").key());
        t.list(ResourceKind::ConfigMap, Some("ns"), &LabelSelector::new())
            .unwrap();

        let ops: Vec<Operation> = t.calls().iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![Operation::Create, Operation::Get, Operation::List]);
        assert_eq!(t.count(Operation::Create), 1);
    }

    #[test]
    fn fail_next_trips_once() {
        let t = MemoryTransport::new();
        t.fail_next(Operation::Create, ResourceKind::ConfigMap, Some("a"));

        let err = t.create(&cm("a")).unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
        assert!(t.object(&cm("a").key()).is_none());

        t.create(&cm("a")).expect("second attempt succeeds");
        assert_eq!(t.count(Operation::Create), 2);
    }

    #[test]
    fn fault_name_filter_spares_other_objects() {
        let t = MemoryTransport::new();
        t.fail_always(Operation::Create, ResourceKind::ConfigMap, Some("a"));
        t.create(&cm("b")).expect("other name unaffected");
        assert!(t.create(&cm("a")).is_err());
        assert!(t.create(&cm("a")).is_err());
        t.clear_faults();
        t.create(&cm("a")).expect("cleared");
    }

    #[test]
    fn insert_is_not_logged() {
        let t = MemoryTransport::new();
        t.insert(cm("seeded"));
        assert!(t.calls().is_empty());
        assert_eq!(t.objects(ResourceKind::ConfigMap).len(), 1);
    }
}
