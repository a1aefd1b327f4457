//! `hashroll status` — what the state file currently holds.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use hashroll_core::{ComponentConfig, LabelSelector, ManagedResource, ResourceKind};
use hashroll_reconcile::FileTransport;

use crate::Global;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Only list objects whose labels match, e.g. `hashroll.io/name=ca,hashroll.io/hash!=0123`.
    #[arg(long, short = 'l')]
    pub selector: Option<LabelSelector>,
}

#[derive(Serialize)]
struct ObjectJson {
    kind: ResourceKind,
    namespace: Option<String>,
    name: String,
    resource_version: Option<String>,
    created_at: Option<String>,
    /// Content hash, for versioned config maps.
    hash: Option<String>,
}

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "namespace")]
    namespace: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "rv")]
    resource_version: String,
    #[tabled(rename = "age")]
    age: String,
}

impl StatusArgs {
    pub fn run(self, global: &Global) -> Result<()> {
        let state = FileTransport::new(&global.state)
            .snapshot()
            .with_context(|| format!("failed to read state from {}", global.state.display()))?;
        // Optional: only used to highlight versions of the configured bundle.
        let config = global.load_config().ok();
        let objects: Vec<&ManagedResource> = state
            .objects()
            .filter(|obj| {
                self.selector
                    .as_ref()
                    .map_or(true, |sel| sel.matches(&obj.metadata.labels))
            })
            .collect();

        if self.json {
            print_json(&objects, config.as_ref())?;
            return Ok(());
        }
        print_table(&objects, config.as_ref());
        Ok(())
    }
}

fn version_hash(obj: &ManagedResource, config: Option<&ComponentConfig>) -> Option<String> {
    let config = config?;
    let labels = &obj.metadata.labels;
    if labels.get(&config.labels.name) != Some(&config.trusted_ca.logical_name) {
        return None;
    }
    labels.get(&config.labels.hash).cloned()
}

fn print_json(objects: &[&ManagedResource], config: Option<&ComponentConfig>) -> Result<()> {
    let payload: Vec<ObjectJson> = objects
        .iter()
        .map(|obj| ObjectJson {
            kind: obj.kind,
            namespace: obj.metadata.namespace.clone(),
            name: obj.name().to_string(),
            resource_version: obj.metadata.resource_version.clone(),
            created_at: obj.metadata.creation_timestamp.map(|t| t.to_rfc3339()),
            hash: version_hash(obj, config),
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(objects: &[&ManagedResource], config: Option<&ComponentConfig>) {
    println!(
        "hashroll v{} | {} objects",
        env!("CARGO_PKG_VERSION"),
        objects.len()
    );
    if objects.is_empty() {
        println!("No objects. Run `hashroll converge` first.");
        return;
    }

    let rows: Vec<ObjectRow> = objects
        .iter()
        .map(|obj| {
            let name = match version_hash(obj, config) {
                Some(_) => format!("{} {}", obj.name(), "(version)".cyan()),
                None => obj.name().to_string(),
            };
            ObjectRow {
                kind: obj.kind.to_string(),
                namespace: obj.namespace().unwrap_or("-").to_string(),
                name,
                resource_version: obj.metadata.resource_version.clone().unwrap_or_default(),
                age: obj
                    .metadata
                    .creation_timestamp
                    .map_or_else(|| "-".to_string(), format_age),
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let secs = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
