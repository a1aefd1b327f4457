//! `hashroll run | converge | teardown` — one reconciliation pass.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use hashroll_manifests::ManifestFactory;
use hashroll_reconcile::{Applied, ComponentTask, Direction, FileTransport, PassReport};

use crate::Global;

/// Arguments shared by the three pass commands.
#[derive(Args, Debug)]
pub struct PassArgs {
    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum PassMode {
    /// Follow `enabled` from the config.
    FromConfig,
    Converge,
    Teardown,
}

impl PassArgs {
    pub fn run(self, global: &Global, mode: PassMode) -> Result<()> {
        let config = global.load_config()?;
        let enabled = match mode {
            PassMode::FromConfig => config.enabled,
            PassMode::Converge => true,
            PassMode::Teardown => false,
        };

        let factory = ManifestFactory::new(&config).context("failed to load manifest templates")?;
        let component = config.component.clone();
        let task = ComponentTask::new(config, FileTransport::new(&global.state), factory);

        let report = task
            .run(enabled)
            .with_context(|| format!("pass for '{component}' failed"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize pass report")?
            );
            return Ok(());
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &PassReport) {
    let verb = match report.direction {
        Direction::Converge => "converged",
        Direction::Teardown => "torn down",
    };
    let writes = report.steps.iter().filter(|s| s.applied.is_write()).count();

    if !report.changed() {
        println!("✓ '{}' {verb} — nothing to do", report.component);
    } else {
        println!(
            "✓ '{}' {verb} ({} written, {} untouched)",
            report.component,
            writes,
            report.steps.len() - writes
        );
    }

    for step in &report.steps {
        let marker = match step.applied {
            Applied::Created | Applied::Recreated => "+".green(),
            Applied::Updated => "✎".yellow(),
            Applied::Deleted => "-".red(),
            Applied::Unchanged | Applied::AlreadyAbsent => "·".bright_black(),
            Applied::Skipped => "!".magenta(),
        };
        println!("  {marker}  {:<36} {}", step.step.to_string(), step.applied);
        if let Some(version) = &step.version {
            println!("       version {}", version.bold());
        }
        for name in &step.pruned {
            println!("       pruned  {}", name.bright_black());
        }
    }
}
