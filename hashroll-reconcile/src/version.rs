//! Content-addressed versions of a config map.
//!
//! A payload is hashed into a short, stable token; the physical object is
//! named `<logical>-<hash>` and labelled with both. Since the name changes
//! with the content, workloads referencing it roll whenever the content does.
//!
//! Ordering (hash, create, prune, repoint) is the caller's job; see
//! [`ComponentTask`](crate::task::ComponentTask).

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use hashroll_core::{LabelKeys, LabelSelector, ManagedResource, ObjectKey, ResourceKind};

use crate::error::{ReconcileError, VersionError};
use crate::transport::ResourceTransport;

/// Hex characters kept from the SHA-256 digest.
pub const HASH_LEN: usize = 16;

/// Longest logical name; it is stored as a label value.
pub const MAX_LOGICAL_NAME_LEN: usize = 63;

/// Truncated SHA-256 of `payload`, lowercase hex.
pub fn content_hash(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}

/// Bytes of the `key` entry of config-map `data`; empty if the key is absent.
pub fn payload_from_data(data: &BTreeMap<String, String>, key: &str) -> Vec<u8> {
    data.get(key).map(|v| v.as_bytes().to_vec()).unwrap_or_default()
}

/// Physical object name of the version of `logical_name` with `hash`.
pub fn physical_name(logical_name: &str, hash: &str) -> String {
    format!("{logical_name}-{hash}")
}

/// One immutable, content-addressed version of a logical config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedConfig {
    pub logical_name: String,
    pub hash: String,
    /// Physical object name, `<logical_name>-<hash>`.
    pub name: String,
}

/// Version `payload` under `logical_name`.
///
/// An empty payload means there is nothing to version yet and yields `None`.
pub fn version(logical_name: &str, payload: &[u8]) -> Result<Option<VersionedConfig>, VersionError> {
    validate_logical_name(logical_name)?;
    if payload.is_empty() {
        return Ok(None);
    }
    let hash = content_hash(payload);
    Ok(Some(VersionedConfig {
        logical_name: logical_name.to_string(),
        name: physical_name(logical_name, &hash),
        hash,
    }))
}

impl VersionedConfig {
    pub fn labels(&self, keys: &LabelKeys) -> BTreeMap<String, String> {
        BTreeMap::from([
            (keys.name.clone(), self.logical_name.clone()),
            (keys.hash.clone(), self.hash.clone()),
        ])
    }

    /// Immutable config map carrying `data` under this version's name.
    pub fn to_config_map(
        &self,
        namespace: &str,
        data: &BTreeMap<String, String>,
        keys: &LabelKeys,
    ) -> ManagedResource {
        let mut cm = ManagedResource::new(ResourceKind::ConfigMap, Some(namespace), &self.name)
            .with_field(&["immutable"], Value::Bool(true))
            .with_field(&["data"], json!(data));
        cm.metadata.labels = self.labels(keys);
        cm
    }

    /// Siblings of this version with a different hash.
    pub fn stale_selector(&self, keys: &LabelKeys) -> LabelSelector {
        stale_selector(&self.logical_name, &self.hash, keys)
    }
}

pub fn stale_selector(logical_name: &str, current_hash: &str, keys: &LabelKeys) -> LabelSelector {
    all_versions_selector(logical_name, keys).not_eq(keys.hash.clone(), current_hash)
}

pub fn all_versions_selector(logical_name: &str, keys: &LabelKeys) -> LabelSelector {
    LabelSelector::new().eq(keys.name.clone(), logical_name)
}

/// Delete every version of `logical_name` whose hash is not `current_hash`.
///
/// Returns the deleted names. The first failed delete aborts the rest; the
/// next pass picks them up.
///
/// The current version is never deleted, even when it matches the selector
/// because it lacks the hash label (e.g. after `labels.hash` was changed).
pub fn prune_stale_versions<T: ResourceTransport + ?Sized>(
    transport: &T,
    namespace: &str,
    logical_name: &str,
    current_hash: &str,
    keys: &LabelKeys,
) -> Result<Vec<String>, ReconcileError> {
    let selector = stale_selector(logical_name, current_hash, keys);
    let current = physical_name(logical_name, current_hash);
    delete_matching(transport, namespace, logical_name, &selector, Some(&current))
}

/// Delete every version of `logical_name`.
pub fn prune_all_versions<T: ResourceTransport + ?Sized>(
    transport: &T,
    namespace: &str,
    logical_name: &str,
    keys: &LabelKeys,
) -> Result<Vec<String>, ReconcileError> {
    let selector = all_versions_selector(logical_name, keys);
    delete_matching(transport, namespace, logical_name, &selector, None)
}

fn delete_matching<T: ResourceTransport + ?Sized>(
    transport: &T,
    namespace: &str,
    logical_name: &str,
    selector: &LabelSelector,
    keep: Option<&str>,
) -> Result<Vec<String>, ReconcileError> {
    let candidates = transport
        .list(ResourceKind::ConfigMap, Some(namespace), selector)
        .map_err(|source| ReconcileError::ListVersions {
            logical_name: logical_name.to_string(),
            source,
        })?;
    debug!(%selector, count = candidates.len(), "listed versions");

    let mut pruned = Vec::with_capacity(candidates.len());
    for obj in candidates {
        if keep == Some(obj.name()) {
            debug!(name = obj.name(), "keeping current version");
            continue;
        }
        let key = ObjectKey::new(ResourceKind::ConfigMap, Some(namespace), obj.name());
        match transport.delete(&key) {
            Ok(()) => info!(name = obj.name(), "pruned version"),
            Err(e) if e.is_not_found() => debug!(name = obj.name(), "version already gone"),
            Err(source) => {
                return Err(ReconcileError::Prune {
                    name: obj.name().to_string(),
                    source,
                })
            }
        }
        pruned.push(obj.name().to_string());
    }
    Ok(pruned)
}

fn validate_logical_name(name: &str) -> Result<(), VersionError> {
    let invalid = |reason: &str| VersionError::InvalidLogicalName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_LOGICAL_NAME_LEN {
        return Err(invalid(&format!("longer than {MAX_LOGICAL_NAME_LEN} characters")));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid("only lowercase alphanumerics, '-' and '.' are allowed"));
    }
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err(invalid("must start and end with an alphanumeric character"));
    }
    Ok(())
}
