//! Component configuration file.
//!
//! # Layout
//!
//! ```yaml
//! enabled: true
//! component: telemeter-client
//! namespace: openshift-monitoring
//! image: quay.io/openshift/telemeter:latest
//! replicas: 1
//! port: 8443
//! secret:
//!   token: "..."
//! trusted_ca:
//!   source: telemeter-trusted-ca-bundle
//!   logical_name: telemeter-trusted-ca-bundle
//!   key: ca-bundle.crt
//! labels:
//!   name: hashroll.io/name
//!   hash: hashroll.io/hash
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)` / `save_at(path, …)` take an explicit path; tests use these.
//! - `load()` resolves [`default_config_path`] and delegates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV: &str = "HASHROLL_CONFIG";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Label keys used to select versioned config objects.
///
/// These keys are a contract with every other consumer of the same object
/// kind; keep them prefixed with a domain the deployment owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelKeys {
    /// Carries the logical name on every version.
    pub name: String,
    /// Carries the content hash on every version.
    pub hash: String,
}

impl Default for LabelKeys {
    fn default() -> Self {
        Self {
            name: "hashroll.io/name".to_string(),
            hash: "hashroll.io/hash".to_string(),
        }
    }
}

/// Which config map to version, and under which logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedCaConfig {
    /// Config map populated by an external process; read, never written.
    pub source: String,
    /// Stable identity of the versioned copies.
    pub logical_name: String,
    /// Data key holding the bundle; the only key hashed, copied and mounted.
    /// `None` means `ca-bundle.crt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Everything a reconciliation pass needs to know about one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Whether the component should exist at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub component: String,
    pub namespace: String,
    pub image: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub secret: BTreeMap<String, String>,
    pub trusted_ca: TrustedCaConfig,
    #[serde(default)]
    pub labels: LabelKeys,
    /// Directory of `.tera` files overriding the embedded manifests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_replicas() -> u32 {
    1
}

fn default_port() -> u16 {
    8443
}

impl ComponentConfig {
    /// Reject configurations no pass could ever reconcile.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.component.trim().is_empty() {
            return Err(ConfigError::Invalid("component must not be empty".into()));
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".into()));
        }
        if self.trusted_ca.source.trim().is_empty()
            || self.trusted_ca.logical_name.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "trusted_ca.source and trusted_ca.logical_name are required".into(),
            ));
        }
        if self.labels.name.is_empty() || self.labels.hash.is_empty() {
            return Err(ConfigError::Invalid("label keys must not be empty".into()));
        }
        if self.labels.name == self.labels.hash {
            return Err(ConfigError::Invalid(format!(
                "labels.name and labels.hash must differ (both '{}')",
                self.labels.name
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// `$HASHROLL_CONFIG`, or `./hashroll.yaml`.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("hashroll.yaml"))
}

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse`
/// (with path + line context) if malformed.
pub fn load_at(path: &Path) -> Result<ComponentConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: ComponentConfig = serde_yaml::from_str(&contents).map_err(|e| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ComponentConfig, ConfigError> {
    load_at(&default_config_path())
}

/// Atomically save `config` to `path`.
///
/// Write flow: serialize → `.tmp` sibling → `rename`.
pub fn save_at(path: &Path, config: &ComponentConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, yaml)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
