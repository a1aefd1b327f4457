//! Resource-shaped domain types.
//!
//! A [`ManagedResource`] is a Kubernetes-style document: `apiVersion`, `kind`,
//! `metadata`, and an opaque body (`spec`, `data`, `rules`, …) kept as JSON.
//! The schema of the body belongs to the control plane; this crate only
//! addresses fields in it by path.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResourceError;

// ---------------------------------------------------------------------------
// ResourceKind
// ---------------------------------------------------------------------------

/// Closed set of kinds the reconciler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    Role,
    RoleBinding,
    Service,
    Secret,
    ConfigMap,
    Deployment,
    ServiceMonitor,
}

impl ResourceKind {
    /// All kinds in a stable order.
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::ServiceAccount,
            ResourceKind::ClusterRole,
            ResourceKind::ClusterRoleBinding,
            ResourceKind::Role,
            ResourceKind::RoleBinding,
            ResourceKind::Service,
            ResourceKind::Secret,
            ResourceKind::ConfigMap,
            ResourceKind::Deployment,
            ResourceKind::ServiceMonitor,
        ]
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::ServiceAccount
            | ResourceKind::Service
            | ResourceKind::Secret
            | ResourceKind::ConfigMap => "v1",
            ResourceKind::ClusterRole
            | ResourceKind::ClusterRoleBinding
            | ResourceKind::Role
            | ResourceKind::RoleBinding => "rbac.authorization.k8s.io/v1",
            ResourceKind::Deployment => "apps/v1",
            ResourceKind::ServiceMonitor => "monitoring.coreos.com/v1",
        }
    }

    /// Cluster roles and their bindings live outside any namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            ResourceKind::ClusterRole | ResourceKind::ClusterRoleBinding
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::ClusterRole => "ClusterRole",
            ResourceKind::ClusterRoleBinding => "ClusterRoleBinding",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::Service => "Service",
            ResourceKind::Secret => "Secret",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::ServiceMonitor => "ServiceMonitor",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::all()
            .iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ResourceError::UnknownKind(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ObjectMeta / ObjectKey
// ---------------------------------------------------------------------------

/// Object metadata. `uid`, `resource_version` and `creation_timestamp` are
/// assigned by the control plane and must survive an update round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// `(kind, namespace, name)` identity of an object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Builds a key, dropping the namespace for cluster-scoped kinds.
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: scoped_namespace(kind, namespace),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

fn scoped_namespace(kind: ResourceKind, namespace: Option<&str>) -> Option<String> {
    if kind.is_namespaced() {
        namespace.map(str::to_owned)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// ManagedResource
// ---------------------------------------------------------------------------

/// A desired or observed object of one of the managed kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedResource {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    /// Everything besides `apiVersion`, `kind` and `metadata`.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ManagedResource {
    /// Empty object of `kind` named `name`.
    pub fn new(kind: ResourceKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            api_version: kind.api_version().to_string(),
            kind,
            metadata: ObjectMeta {
                name: name.into(),
                namespace: scoped_namespace(kind, namespace),
                ..ObjectMeta::default()
            },
            body: Map::new(),
        }
    }

    /// Parse a single YAML document.
    ///
    /// The namespace of cluster-scoped kinds is discarded.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ResourceError> {
        let mut resource: ManagedResource = serde_yaml::from_str(yaml)?;
        if resource.metadata.name.is_empty() {
            return Err(ResourceError::MissingField {
                kind: resource.kind.to_string(),
                field: "metadata.name",
            });
        }
        if resource.api_version.is_empty() {
            resource.api_version = resource.kind.api_version().to_string();
        }
        if !resource.kind.is_namespaced() {
            resource.metadata.namespace = None;
        }
        Ok(resource)
    }

    pub fn to_json(&self) -> Result<Value, ResourceError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            kind: self.kind,
            namespace: self.metadata.namespace.clone(),
            name: self.metadata.name.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    /// Builder-style body field setter.
    pub fn with_field(mut self, path: &[&str], value: Value) -> Self {
        self.set_field(path, value);
        self
    }

    /// Look up a body field by path, e.g. `["spec", "clusterIP"]`.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.body.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    /// Set a body field by path, creating intermediate objects.
    ///
    /// A non-object value sitting on the path is replaced by an object.
    pub fn set_field(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            return;
        };
        let mut current = &mut self.body;
        for segment in parents {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(map) = entry else {
                return;
            };
            current = map;
        }
        current.insert(last.to_string(), value);
    }

    /// Remove a body field by path, returning the old value.
    pub fn remove_field(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &mut self.body;
        for segment in parents {
            current = current.get_mut(*segment)?.as_object_mut()?;
        }
        current.remove(*last)
    }

    /// String map stored at `path` (`data`, `stringData`, …); empty when absent.
    pub fn string_map(&self, path: &[&str]) -> BTreeMap<String, String> {
        self.field(path)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_display_and_parse() {
        for kind in ResourceKind::all() {
            let parsed: ResourceKind = kind.to_string().parse().expect("parse");
            assert_eq!(parsed, *kind);
        }
        assert!(matches!(
            "Pod".parse::<ResourceKind>(),
            Err(ResourceError::UnknownKind(_))
        ));
    }

    #[test]
    fn cluster_scoped_kinds_drop_namespace() {
        let cr = ManagedResource::new(ResourceKind::ClusterRole, Some("ns"), "reader");
        assert_eq!(cr.namespace(), None);
        let sa = ManagedResource::new(ResourceKind::ServiceAccount, Some("ns"), "sa");
        assert_eq!(sa.namespace(), Some("ns"));
        assert_eq!(sa.key().to_string(), "ServiceAccount ns/sa");
    }

    #[test]
    fn body_fields_are_flattened() {
        let yaml = r#"
apiVersion: v1
kind: Service
metadata:
  name: web
  namespace: apps
  labels:
    app: web
spec:
  clusterIP: 10.0.0.1
  ports:
    - port: 8443
"#;
        let svc = ManagedResource::from_yaml_str(yaml).expect("parse");
        assert_eq!(svc.kind, ResourceKind::Service);
        assert_eq!(svc.metadata.labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(svc.field(&["spec", "clusterIP"]), Some(&json!("10.0.0.1")));

        let value = svc.to_json().expect("json");
        assert_eq!(value["spec"]["ports"][0]["port"], json!(8443));
        assert_eq!(value["kind"], json!("Service"));
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = ManagedResource::from_yaml_str("apiVersion: v1\nkind: Secret\nmetadata:\n  name: \"\"\n")
            .unwrap_err();
        assert!(matches!(err, ResourceError::MissingField { field: "metadata.name", .. }));
    }

    #[test]
    fn set_and_remove_nested_field() {
        let mut cm = ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "cm");
        cm.set_field(&["data", "a"], json!("1"));
        cm.set_field(&["data", "b"], json!("2"));
        assert_eq!(cm.string_map(&["data"]).len(), 2);
        assert_eq!(cm.remove_field(&["data", "a"]), Some(json!("1")));
        assert_eq!(cm.remove_field(&["spec", "missing"]), None);
        assert_eq!(cm.string_map(&["data"]).keys().collect::<Vec<_>>(), vec!["b"]);
    }
}
