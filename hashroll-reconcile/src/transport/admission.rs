//! In-process control plane state and the server-side rules it enforces.
//!
//! Rules mirror the API server behaviour the merge strategies exist for:
//!
//! - create assigns `uid`, `resourceVersion`, `creationTimestamp`, a Service
//!   `clusterIP` and a ServiceAccount token secret reference;
//! - update requires the stored `resourceVersion` (optimistic concurrency);
//! - Service `spec.clusterIP`, binding `roleRef` and Secret `type` are
//!   immutable, as are the contents of `immutable: true` ConfigMaps/Secrets.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use hashroll_core::{LabelSelector, ManagedResource, ObjectKey, ResourceKind};

use crate::error::TransportError;

/// Content fields frozen by `immutable: true`.
const CONTENT_FIELDS: &[&str] = &["data", "binaryData", "stringData"];

/// Every object the control plane holds, plus its revision counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterState {
    revision: u64,
    #[serde(with = "objects_as_list")]
    objects: BTreeMap<ObjectKey, ManagedResource>,
}

impl ClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ObjectKey) -> Result<ManagedResource, TransportError> {
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| TransportError::NotFound { key: key.clone() })
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn create(&mut self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        let key = obj.key();
        validate_identity(obj)?;
        if self.objects.contains_key(&key) {
            return Err(TransportError::AlreadyExists { key });
        }

        let mut stored = obj.clone();
        let revision = self.bump();
        stored.metadata.uid = Some(format!("{:08x}-{}", revision, stored.kind.as_str().to_lowercase()));
        stored.metadata.resource_version = Some(revision.to_string());
        stored.metadata.creation_timestamp = Some(Utc::now());
        self.default_server_fields(&mut stored, revision);

        self.objects.insert(key, stored.clone());
        Ok(stored)
    }

    pub fn update(&mut self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        let key = obj.key();
        validate_identity(obj)?;
        let Some(current) = self.objects.get(&key) else {
            return Err(TransportError::NotFound { key });
        };

        match obj.metadata.resource_version.as_deref() {
            None => {
                return Err(TransportError::Invalid {
                    key,
                    reason: "metadata.resourceVersion must be specified for an update".into(),
                })
            }
            Some(rv) if Some(rv) != current.metadata.resource_version.as_deref() => {
                return Err(TransportError::Conflict {
                    key,
                    reason: format!(
                        "resourceVersion {rv} is stale; current is {}",
                        current.metadata.resource_version.as_deref().unwrap_or("<none>")
                    ),
                })
            }
            Some(_) => {}
        }

        check_immutable_fields(current, obj).map_err(|reason| TransportError::Invalid {
            key: key.clone(),
            reason,
        })?;

        let mut stored = obj.clone();
        stored.metadata.uid = current.metadata.uid.clone();
        stored.metadata.creation_timestamp = current.metadata.creation_timestamp;
        let revision = self.bump();
        stored.metadata.resource_version = Some(revision.to_string());

        self.objects.insert(key, stored.clone());
        Ok(stored)
    }

    pub fn delete(&mut self, key: &ObjectKey) -> Result<(), TransportError> {
        match self.objects.remove(key) {
            Some(_) => {
                self.bump();
                Ok(())
            }
            None => Err(TransportError::NotFound { key: key.clone() }),
        }
    }

    pub fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Vec<ManagedResource> {
        self.objects
            .values()
            .filter(|obj| obj.kind == kind)
            .filter(|obj| namespace.is_none() || !kind.is_namespaced() || obj.namespace() == namespace)
            .filter(|obj| selector.matches(&obj.metadata.labels))
            .cloned()
            .collect()
    }

    /// Create-or-replace without admission checks.
    ///
    /// Stands in for writers outside the reconciler (e.g. the process that
    /// populates a source config map).
    pub fn put(&mut self, obj: ManagedResource) -> ManagedResource {
        let key = obj.key();
        let mut stored = obj;
        let revision = self.bump();
        let previous = self.objects.get(&key);
        stored.metadata.uid = previous
            .and_then(|p| p.metadata.uid.clone())
            .or_else(|| Some(format!("{:08x}-{}", revision, stored.kind.as_str().to_lowercase())));
        stored.metadata.creation_timestamp = previous
            .and_then(|p| p.metadata.creation_timestamp)
            .or_else(|| Some(Utc::now()));
        stored.metadata.resource_version = Some(revision.to_string());
        self.objects.insert(key, stored.clone());
        stored
    }

    pub fn objects(&self) -> impl Iterator<Item = &ManagedResource> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn default_server_fields(&self, obj: &mut ManagedResource, revision: u64) {
        match obj.kind {
            ResourceKind::Service => {
                let unset = obj
                    .field(&["spec", "clusterIP"])
                    .and_then(Value::as_str)
                    .map_or(true, str::is_empty);
                if unset {
                    let ip = format!("10.96.{}.{}", (revision >> 8) & 0xff, revision & 0xff);
                    obj.set_field(&["spec", "clusterIPs"], json!([ip.clone()]));
                    obj.set_field(&["spec", "clusterIP"], Value::String(ip));
                }
            }
            ResourceKind::ServiceAccount => {
                if obj.field(&["secrets"]).is_none() {
                    let token = format!("{}-token-{:05x}", obj.name(), revision);
                    obj.set_field(&["secrets"], json!([{ "name": token }]));
                }
            }
            ResourceKind::Secret => {
                if obj.field(&["type"]).is_none() {
                    obj.set_field(&["type"], json!("Opaque"));
                }
            }
            _ => {}
        }
    }
}

fn validate_identity(obj: &ManagedResource) -> Result<(), TransportError> {
    let key = obj.key();
    if obj.name().is_empty() {
        return Err(TransportError::Invalid {
            key,
            reason: "metadata.name is required".into(),
        });
    }
    if obj.kind.is_namespaced() && obj.namespace().map_or(true, str::is_empty) {
        return Err(TransportError::Invalid {
            key,
            reason: format!("{} is namespaced; metadata.namespace is required", obj.kind),
        });
    }
    Ok(())
}

fn check_immutable_fields(current: &ManagedResource, next: &ManagedResource) -> Result<(), String> {
    match current.kind {
        ResourceKind::Service => {
            let old = current.field(&["spec", "clusterIP"]);
            let new = next.field(&["spec", "clusterIP"]);
            if old.is_some() && old != new {
                return Err(format!(
                    "spec.clusterIP: field is immutable (was {}, got {})",
                    display_value(old),
                    display_value(new)
                ));
            }
        }
        ResourceKind::ClusterRoleBinding | ResourceKind::RoleBinding => {
            if current.field(&["roleRef"]) != next.field(&["roleRef"]) {
                return Err("roleRef: cannot change roleRef".into());
            }
        }
        ResourceKind::Secret => {
            let old = current.field(&["type"]);
            let new = next.field(&["type"]);
            if old.is_some() && old != new {
                return Err(format!(
                    "type: field is immutable (was {}, got {})",
                    display_value(old),
                    display_value(new)
                ));
            }
        }
        _ => {}
    }

    if is_immutable(current) {
        if !is_immutable(next) {
            return Err("immutable: field is immutable when `immutable` is set".into());
        }
        for &field in CONTENT_FIELDS {
            if current.field(&[field]) != next.field(&[field]) {
                return Err(format!("{field}: field is immutable when `immutable` is set"));
            }
        }
    }
    Ok(())
}

pub(crate) fn is_immutable(obj: &ManagedResource) -> bool {
    matches!(obj.kind, ResourceKind::ConfigMap | ResourceKind::Secret)
        && obj.field(&["immutable"]).and_then(Value::as_bool) == Some(true)
}

fn display_value(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unset>".to_string(), Value::to_string)
}

mod objects_as_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use hashroll_core::{ManagedResource, ObjectKey};

    pub fn serialize<S: Serializer>(
        objects: &BTreeMap<ObjectKey, ManagedResource>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(objects.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ObjectKey, ManagedResource>, D::Error> {
        let list = Vec::<ManagedResource>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|obj| (obj.key(), obj)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> ManagedResource {
        ManagedResource::new(ResourceKind::Service, Some("ns"), name)
            .with_field(&["spec", "ports"], json!([{ "port": 8443 }]))
    }

    #[test]
    fn create_assigns_server_fields() {
        let mut state = ClusterState::new();
        let stored = state.create(&service("web")).expect("create");
        assert!(stored.metadata.uid.is_some());
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("1"));
        assert!(stored.field(&["spec", "clusterIP"]).is_some());
    }

    #[test]
    fn create_twice_is_already_exists() {
        let mut state = ClusterState::new();
        state.create(&service("web")).expect("create");
        let err = state.create(&service("web")).unwrap_err();
        assert!(matches!(err, TransportError::AlreadyExists { .. }));
    }

    #[test]
    fn namespaced_kind_without_namespace_is_invalid() {
        let mut state = ClusterState::new();
        let orphan = ManagedResource::new(ResourceKind::ConfigMap, None, "cm");
        let err = state.create(&orphan).unwrap_err();
        assert!(matches!(err, TransportError::Invalid { .. }), "got {err}");
    }

    #[test]
    fn update_with_stale_resource_version_conflicts() {
        let mut state = ClusterState::new();
        let stored = state.create(&service("web")).expect("create");
        let first = state.update(&stored).expect("update");
        assert_ne!(first.metadata.resource_version, stored.metadata.resource_version);

        let err = state.update(&stored).unwrap_err();
        assert!(matches!(err, TransportError::Conflict { .. }), "got {err}");
    }

    #[test]
    fn update_dropping_cluster_ip_is_rejected() {
        let mut state = ClusterState::new();
        let stored = state.create(&service("web")).expect("create");
        let mut next = service("web");
        next.metadata.resource_version = stored.metadata.resource_version.clone();
        let err = state.update(&next).unwrap_err();
        assert!(err.to_string().contains("spec.clusterIP"), "got {err}");
    }

    #[test]
    fn immutable_config_map_content_is_frozen() {
        let mut state = ClusterState::new();
        let cm = ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "cm")
            .with_field(&["immutable"], json!(true))
            .with_field(&["data"], json!({ "k": "v1" }));
        let stored = state.create(&cm).expect("create");

        // Same content is accepted.
        let same = state.update(&stored).expect("identical update");

        let mut changed = same.clone();
        changed.set_field(&["data", "k"], json!("v2"));
        let err = state.update(&changed).unwrap_err();
        assert!(err.to_string().contains("data"), "got {err}");
    }

    #[test]
    fn list_filters_by_namespace_and_selector() {
        let mut state = ClusterState::new();
        for (ns, name, hash) in [("a", "one", "1"), ("a", "two", "2"), ("b", "three", "1")] {
            let mut cm = ManagedResource::new(ResourceKind::ConfigMap, Some(ns), name);
            cm.metadata.labels.insert("hash".into(), hash.into());
            state.create(&cm).expect("create");
        }
        let selector = LabelSelector::new().eq("hash", "1");
        let in_a = state.list(ResourceKind::ConfigMap, Some("a"), &selector);
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].name(), "one");
        assert_eq!(state.list(ResourceKind::ConfigMap, None, &selector).len(), 2);
    }

    #[test]
    fn state_roundtrips_through_json() {
        let mut state = ClusterState::new();
        state.create(&service("web")).expect("create");
        let json = serde_json::to_string(&state).expect("serialize");
        let loaded: ClusterState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(loaded.len(), 1);
        let key = ObjectKey::new(ResourceKind::Service, Some("ns"), "web");
        assert_eq!(loaded.get(&key).unwrap(), state.get(&key).unwrap());
        assert_eq!(loaded.revision, state.revision);
    }
}
