//! hashroll — reconcile a component and roll its trusted CA bundle by content hash.
//!
//! # Usage
//!
//! ```text
//! hashroll [--config <file>] [--state <file>] run [--json]
//! hashroll converge [--json]
//! hashroll teardown [--json]
//! hashroll hash <file> --logical-name <name>
//! hashroll status [--json]
//! hashroll seed-source <file>
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use commands::{
    hash::HashArgs,
    pass::{PassArgs, PassMode},
    seed::SeedArgs,
    status::StatusArgs,
};
use hashroll_core::{config, ComponentConfig};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "hashroll",
    version,
    about = "Idempotent reconciliation with content-addressed config rollouts",
    long_about = None,
)]
struct Cli {
    /// Component config file [default: $HASHROLL_CONFIG or ./hashroll.yaml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON file holding the control-plane state.
    #[arg(long, global = true, default_value = "hashroll-state.json")]
    state: PathBuf,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Converge or tear down, following `enabled` in the config.
    Run(PassArgs),

    /// Ensure every object of the component is present and current.
    Converge(PassArgs),

    /// Delete every object of the component, newest first.
    Teardown(PassArgs),

    /// Print the content hash and versioned name of a file.
    Hash(HashArgs),

    /// List the objects in the state file.
    Status(StatusArgs),

    /// Write the trusted CA source config map into the state file.
    SeedSource(SeedArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Options every subcommand may need.
#[derive(Debug)]
pub struct Global {
    pub config: Option<PathBuf>,
    pub state: PathBuf,
}

impl Global {
    pub fn load_config(&self) -> Result<ComponentConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(config::default_config_path);
        config::load_at(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let global = Global {
        config: cli.config,
        state: cli.state,
    };
    match cli.command {
        Commands::Run(args) => args.run(&global, PassMode::FromConfig),
        Commands::Converge(args) => args.run(&global, PassMode::Converge),
        Commands::Teardown(args) => args.run(&global, PassMode::Teardown),
        Commands::Hash(args) => args.run(),
        Commands::Status(args) => args.run(&global),
        Commands::SeedSource(args) => args.run(&global),
    }
}

fn init_tracing(format: LogFormat) {
    if let Err(e) = try_init_tracing(format) {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn try_init_tracing(
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}
