//! Per-kind merge strategies.
//!
//! A desired object is built fresh every pass and knows nothing of the
//! fields the control plane assigned. [`plan`] carries those fields over
//! from the stored object so the update is accepted, or decides that the
//! object has to be replaced.

use hashroll_core::{ManagedResource, ResourceKind};

use crate::transport::admission::is_immutable;

/// What `ensure_present` does with an object that already exists.
#[derive(Debug, Clone, PartialEq)]
pub enum MergePlan {
    /// Send this object as an update.
    Update(ManagedResource),
    /// An immutable field differs; delete and create the desired object.
    Recreate,
}

/// Merge `existing` (as stored) into `desired` (freshly built).
pub fn plan(existing: &ManagedResource, desired: &ManagedResource) -> MergePlan {
    if needs_recreate(existing, desired) {
        return MergePlan::Recreate;
    }

    let mut merged = desired.clone();
    merge_metadata(existing, &mut merged);

    match desired.kind {
        ResourceKind::Service => {
            keep_if_unset(existing, &mut merged, &["spec", "clusterIP"]);
            keep_if_unset(existing, &mut merged, &["spec", "clusterIPs"]);
        }
        ResourceKind::ServiceAccount => {
            keep_if_unset(existing, &mut merged, &["secrets"]);
            keep_if_unset(existing, &mut merged, &["imagePullSecrets"]);
        }
        ResourceKind::Secret => keep_if_unset(existing, &mut merged, &["type"]),
        _ => {}
    }

    MergePlan::Update(merged)
}

fn needs_recreate(existing: &ManagedResource, desired: &ManagedResource) -> bool {
    match desired.kind {
        ResourceKind::ClusterRoleBinding | ResourceKind::RoleBinding => {
            existing.field(&["roleRef"]) != desired.field(&["roleRef"])
        }
        ResourceKind::ConfigMap | ResourceKind::Secret if is_immutable(existing) => {
            ["data", "binaryData", "stringData", "immutable"]
                .iter()
                .any(|&f| existing.field(&[f]) != desired.field(&[f]))
        }
        _ => false,
    }
}

fn merge_metadata(existing: &ManagedResource, merged: &mut ManagedResource) {
    let from = &existing.metadata;
    let meta = &mut merged.metadata;
    meta.uid = from.uid.clone();
    meta.resource_version = from.resource_version.clone();
    meta.creation_timestamp = from.creation_timestamp;
    for (k, v) in &from.annotations {
        meta.annotations.entry(k.clone()).or_insert_with(|| v.clone());
    }
}

fn keep_if_unset(existing: &ManagedResource, merged: &mut ManagedResource, path: &[&str]) {
    let unset = merged
        .field(path)
        .map_or(true, |v| v.is_null() || v.as_str() == Some(""));
    if !unset {
        return;
    }
    if let Some(value) = existing.field(path).filter(|v| !v.is_null()) {
        merged.set_field(path, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(mut obj: ManagedResource) -> ManagedResource {
        obj.metadata.uid = Some("uid-1".into());
        obj.metadata.resource_version = Some("7".into());
        obj
    }

    #[test]
    fn service_keeps_assigned_cluster_ip() {
        let existing = stored(
            ManagedResource::new(ResourceKind::Service, Some("ns"), "svc")
                .with_field(&["spec", "clusterIP"], json!("10.96.0.9"))
                .with_field(&["spec", "clusterIPs"], json!(["10.96.0.9"])),
        );
        let desired = ManagedResource::new(ResourceKind::Service, Some("ns"), "svc")
            .with_field(&["spec", "ports"], json!([{ "port": 8443 }]));

        let MergePlan::Update(merged) = plan(&existing, &desired) else {
            panic!("expected update");
        };
        assert_eq!(merged.field(&["spec", "clusterIP"]), Some(&json!("10.96.0.9")));
        assert_eq!(merged.field(&["spec", "clusterIPs"]), Some(&json!(["10.96.0.9"])));
        assert_eq!(merged.field(&["spec", "ports"]), desired.field(&["spec", "ports"]));
        assert_eq!(merged.metadata.uid.as_deref(), Some("uid-1"));
        assert_eq!(merged.metadata.resource_version.as_deref(), Some("7"));
    }

    #[test]
    fn service_account_keeps_token_secrets() {
        let existing = stored(
            ManagedResource::new(ResourceKind::ServiceAccount, Some("ns"), "sa")
                .with_field(&["secrets"], json!([{ "name": "sa-token-1" }])),
        );
        let desired = ManagedResource::new(ResourceKind::ServiceAccount, Some("ns"), "sa");
        let MergePlan::Update(merged) = plan(&existing, &desired) else {
            panic!("expected update");
        };
        assert_eq!(merged.field(&["secrets"]), existing.field(&["secrets"]));
        assert!(merged.field(&["imagePullSecrets"]).is_none());
    }

    #[test]
    fn secret_keeps_type() {
        let existing = stored(
            ManagedResource::new(ResourceKind::Secret, Some("ns"), "s")
                .with_field(&["type"], json!("Opaque")),
        );
        let desired = ManagedResource::new(ResourceKind::Secret, Some("ns"), "s")
            .with_field(&["stringData"], json!({ "k": "v" }));
        let MergePlan::Update(merged) = plan(&existing, &desired) else {
            panic!("expected update");
        };
        assert_eq!(merged.field(&["type"]), Some(&json!("Opaque")));
    }

    #[test]
    fn changed_role_ref_recreates_binding() {
        let binding = |role: &str| {
            ManagedResource::new(ResourceKind::ClusterRoleBinding, None, "b")
                .with_field(&["roleRef", "name"], json!(role))
        };
        let existing = stored(binding("old"));
        assert_eq!(plan(&existing, &binding("new")), MergePlan::Recreate);
        assert!(matches!(plan(&existing, &binding("old")), MergePlan::Update(_)));
    }

    #[test]
    fn existing_annotations_survive_unless_overridden() {
        let mut existing = stored(ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "c"));
        existing
            .metadata
            .annotations
            .insert("injected".into(), "by-someone-else".into());
        existing.metadata.annotations.insert("owned".into(), "old".into());

        let mut desired = ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "c");
        desired.metadata.annotations.insert("owned".into(), "new".into());

        let MergePlan::Update(merged) = plan(&existing, &desired) else {
            panic!("expected update");
        };
        assert_eq!(merged.metadata.annotations["injected"], "by-someone-else");
        assert_eq!(merged.metadata.annotations["owned"], "new");
    }
}
