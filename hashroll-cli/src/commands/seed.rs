//! `hashroll seed-source` — populate the trusted CA source config map.
//!
//! Stands in for the process that fills the source on a real cluster; the
//! reconciler only ever reads it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use hashroll_core::{ManagedResource, ResourceKind};
use hashroll_manifests::context::DEFAULT_TRUSTED_CA_KEY;
use hashroll_reconcile::FileTransport;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// File holding the CA bundle.
    pub file: PathBuf,
}

impl SeedArgs {
    pub fn run(self, global: &crate::Global) -> Result<()> {
        let config = global.load_config()?;
        let bundle = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;

        let key = config
            .trusted_ca
            .key
            .clone()
            .unwrap_or_else(|| DEFAULT_TRUSTED_CA_KEY.to_string());
        let data = BTreeMap::from([(key.clone(), bundle)]);
        let source = ManagedResource::new(
            ResourceKind::ConfigMap,
            Some(config.namespace.as_str()),
            &config.trusted_ca.source,
        )
        .with_field(&["data"], json!(data));

        let stored = FileTransport::new(&global.state)
            .seed(source)
            .with_context(|| format!("failed to write {}", global.state.display()))?;
        println!("✓ seeded {} (key {key})", stored.key());
        Ok(())
    }
}
