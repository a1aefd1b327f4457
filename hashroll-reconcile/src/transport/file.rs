//! JSON-file control plane used by the CLI.
//!
//! Every call loads the state file, applies one operation, and (for writes)
//! saves it back with the atomic `.tmp` + rename pattern. A missing file is
//! an empty cluster.

use std::path::{Path, PathBuf};

use hashroll_core::{LabelSelector, ManagedResource, ObjectKey, ResourceKind};

use crate::error::{io_err, TransportError};
use crate::transport::{ClusterState, ResourceTransport};

#[derive(Debug, Clone)]
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTransport { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state; empty if the file does not exist yet.
    pub fn snapshot(&self) -> Result<ClusterState, TransportError> {
        if !self.path.exists() {
            return Ok(ClusterState::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Create or replace `obj` without admission checks.
    pub fn seed(&self, obj: ManagedResource) -> Result<ManagedResource, TransportError> {
        let mut state = self.snapshot()?;
        let stored = state.put(obj);
        self.save(&state)?;
        Ok(stored)
    }

    fn save(&self, state: &ClusterState) -> Result<(), TransportError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    fn write<R>(
        &self,
        apply: impl FnOnce(&mut ClusterState) -> Result<R, TransportError>,
    ) -> Result<R, TransportError> {
        let mut state = self.snapshot()?;
        let out = apply(&mut state)?;
        self.save(&state)?;
        Ok(out)
    }
}

impl ResourceTransport for FileTransport {
    fn get(&self, key: &ObjectKey) -> Result<ManagedResource, TransportError> {
        self.snapshot()?.get(key)
    }

    fn create(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        self.write(|state| state.create(obj))
    }

    fn update(&self, obj: &ManagedResource) -> Result<ManagedResource, TransportError> {
        self.write(|state| state.update(obj))
    }

    fn delete(&self, key: &ObjectKey) -> Result<(), TransportError> {
        self.write(|state| state.delete(key))
    }

    fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<ManagedResource>, TransportError> {
        Ok(self.snapshot()?.list(kind, namespace, selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty_cluster() {
        let tmp = TempDir::new().unwrap();
        let t = FileTransport::new(tmp.path().join("state.json"));
        assert!(t.snapshot().unwrap().is_empty());
        let key = ObjectKey::new(ResourceKind::ConfigMap, Some("ns"), "x");
        assert!(t.get(&key).unwrap_err().is_not_found());
    }

    #[test]
    fn writes_persist_across_instances() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("state.json");
        let cm = ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "x");
        FileTransport::new(&path).create(&cm).unwrap();

        let reopened = FileTransport::new(&path);
        let stored = reopened.get(&cm.key()).unwrap();
        assert!(stored.metadata.uid.is_some());
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn failed_write_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        let t = FileTransport::new(&path);
        let cm = ManagedResource::new(ResourceKind::ConfigMap, Some("ns"), "x");
        t.create(&cm).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        assert!(t.create(&cm).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
