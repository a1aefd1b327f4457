//! `hashroll hash` — show the version a payload would get.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use hashroll_reconcile::version;

#[derive(Args, Debug)]
pub struct HashArgs {
    /// File whose bytes are the payload.
    pub file: PathBuf,

    /// Logical name the version is derived from.
    #[arg(long)]
    pub logical_name: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct HashJson<'a> {
    logical_name: &'a str,
    hash: Option<&'a str>,
    name: Option<&'a str>,
}

impl HashArgs {
    pub fn run(self) -> Result<()> {
        let payload = std::fs::read(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let versioned = version::version(&self.logical_name, &payload)?;

        if self.json {
            let out = HashJson {
                logical_name: &self.logical_name,
                hash: versioned.as_ref().map(|v| v.hash.as_str()),
                name: versioned.as_ref().map(|v| v.name.as_str()),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        match versioned {
            Some(v) => {
                println!("hash: {}", v.hash);
                println!("name: {}", v.name);
            }
            None => println!("{} is empty; nothing to version", self.file.display()),
        }
        Ok(())
    }
}
