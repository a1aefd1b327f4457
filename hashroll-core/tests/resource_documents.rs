//! Parsing of resource-shaped YAML documents for every managed kind.

use hashroll_core::{ManagedResource, ResourceKind};
use rstest::rstest;
use serde_json::json;

fn document(kind: ResourceKind) -> String {
    format!(
        "apiVersion: {}\nkind: {}\nmetadata:\n  name: sample\n  namespace: monitoring\n",
        kind.api_version(),
        kind
    )
}

#[rstest]
#[case(ResourceKind::ServiceAccount, true)]
#[case(ResourceKind::ClusterRole, false)]
#[case(ResourceKind::ClusterRoleBinding, false)]
#[case(ResourceKind::Role, true)]
#[case(ResourceKind::RoleBinding, true)]
#[case(ResourceKind::Service, true)]
#[case(ResourceKind::Secret, true)]
#[case(ResourceKind::ConfigMap, true)]
#[case(ResourceKind::Deployment, true)]
#[case(ResourceKind::ServiceMonitor, true)]
fn namespace_follows_kind_scope(#[case] kind: ResourceKind, #[case] namespaced: bool) {
    let resource = ManagedResource::from_yaml_str(&document(kind)).expect("parse");
    assert_eq!(resource.kind, kind);
    assert_eq!(resource.namespace().is_some(), namespaced);
    assert_eq!(resource.api_version, kind.api_version());
}

#[test]
fn server_assigned_metadata_is_camel_case() {
    let yaml = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: cm
  namespace: ns
  uid: 1b2c
  resourceVersion: "42"
  creationTimestamp: "2024-01-01T00:00:00Z"
data:
  ca-bundle.crt: AAA
"#;
    let cm = ManagedResource::from_yaml_str(yaml).expect("parse");
    assert_eq!(cm.metadata.uid.as_deref(), Some("1b2c"));
    assert_eq!(cm.metadata.resource_version.as_deref(), Some("42"));
    assert!(cm.metadata.creation_timestamp.is_some());

    let value = cm.to_json().expect("json");
    assert_eq!(value["metadata"]["resourceVersion"], json!("42"));
    assert_eq!(value["data"]["ca-bundle.crt"], json!("AAA"));
    assert!(value["metadata"].get("labels").is_none(), "empty labels are omitted");
}

#[test]
fn unknown_kind_fails_to_parse() {
    let err = ManagedResource::from_yaml_str("apiVersion: v1\nkind: Pod\nmetadata:\n  name: p\n");
    assert!(err.is_err());
}
