//! Template context: the serializable rendering payload built from [`ComponentConfig`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hashroll_core::ComponentConfig;

use crate::error::ManifestError;

/// Data key hashed and mounted when the config does not name one.
pub const DEFAULT_TRUSTED_CA_KEY: &str = "ca-bundle.crt";

/// Rendering payload shared by every manifest template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestContext {
    pub component: String,
    pub namespace: String,
    pub image: String,
    pub replicas: u32,
    pub port: u16,
    pub secret: BTreeMap<String, String>,
    /// Name of the config map the serving-certs CA is injected into.
    pub serving_certs_ca_bundle: String,
    /// Labels stamped on every object and on the pod template.
    pub labels: BTreeMap<String, String>,
    /// Subset of `labels` used by selectors; must stay stable across releases.
    pub selector_labels: BTreeMap<String, String>,
    pub trusted_ca: TrustedCaCtx,
}

/// Trusted CA bundle the workload mounts, if a version exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedCaCtx {
    pub key: String,
    /// Physical name of the current version. `None` until one is created.
    pub config_map: Option<String>,
}

impl ManifestContext {
    pub fn from_config(config: &ComponentConfig) -> Self {
        let selector_labels = BTreeMap::from([(
            "app.kubernetes.io/name".to_string(),
            config.component.clone(),
        )]);
        let mut labels = selector_labels.clone();
        labels.insert(
            "app.kubernetes.io/managed-by".to_string(),
            "hashroll".to_string(),
        );

        ManifestContext {
            component: config.component.clone(),
            namespace: config.namespace.clone(),
            image: config.image.clone(),
            replicas: config.replicas,
            port: config.port,
            secret: config.secret.clone(),
            serving_certs_ca_bundle: format!("{}-serving-certs-ca-bundle", config.component),
            labels,
            selector_labels,
            trusted_ca: TrustedCaCtx {
                key: config
                    .trusted_ca
                    .key
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TRUSTED_CA_KEY.to_string()),
                config_map: None,
            },
        }
    }

    /// Copy of this context pointing the workload at `config_map`.
    pub fn with_trusted_ca(&self, config_map: Option<&str>) -> Self {
        let mut ctx = self.clone();
        ctx.trusted_ca.config_map = config_map.map(str::to_owned);
        ctx
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, ManifestError> {
        let value = serde_json::to_value(self)?;
        Ok(tera::Context::from_value(value)?)
    }
}
