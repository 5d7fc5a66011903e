//! CLI for the gatecheck content-equivalence verifier.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gatecheck_core::config::{self, GatecheckConfig};
use std::path::PathBuf;

use commands::{run_digest, run_urls, run_verify};

/// Top-level CLI for gatecheck.
#[derive(Debug, Parser)]
#[command(name = "gatecheck")]
#[command(about = "Verify that direct, proxy and phonebook gateway paths serve identical bytes", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/gatecheck/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which assets to check and where the system under test lives.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// TOML manifest of `[[asset]]` entries (default: built-in fixture list).
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Directory holding the reference fixture files.
    #[arg(long, value_name = "DIR")]
    pub fixtures: Option<PathBuf>,

    /// Canister identifier (overrides NFT_CANISTER_ID and config).
    #[arg(long)]
    pub canister_id: Option<String>,

    /// Proxy port (overrides PROXY_PORT and config).
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Replica port (overrides REPLICA_PORT and config).
    #[arg(long)]
    pub replica_port: Option<u16>,

    /// Extra curl resolve entry HOST:PORT:ADDRESS (repeatable).
    #[arg(long, value_name = "HOST:PORT:ADDR")]
    pub resolve: Vec<String>,
}

impl TargetArgs {
    /// Layer flags over env over config file.
    pub fn apply(&self, mut cfg: GatecheckConfig) -> Result<GatecheckConfig> {
        cfg.network = cfg
            .network
            .with_env_overrides(|key| std::env::var(key).ok())?;
        if let Some(id) = &self.canister_id {
            cfg.network.canister_id = id.clone();
        }
        if let Some(port) = self.proxy_port {
            cfg.network.proxy_port = port;
        }
        if let Some(port) = self.replica_port {
            cfg.network.replica_port = port;
        }
        if let Some(dir) = &self.fixtures {
            cfg.fixture_dir = dir.clone();
        }
        cfg.fetch.resolve.extend(self.resolve.iter().cloned());
        cfg.network.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every asset over every access path and compare against its fixture.
    Verify {
        #[command(flatten)]
        target: TargetArgs,

        /// Stop at the first divergent path or asset.
        #[arg(long)]
        fail_fast: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the generated access URLs for each asset.
    Urls {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Compute SHA-256 of a local file.
    Digest {
        /// Path to the file.
        path: PathBuf,
    },
}

impl CliCommand {
    /// Returns `Ok(false)` when verification ran but did not pass.
    pub async fn run_from_args() -> Result<bool> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Verify {
                target,
                fail_fast,
                json,
            } => run_verify(target.apply(cfg)?, target.manifest.as_deref(), fail_fast, json).await,
            CliCommand::Urls { target } => {
                run_urls(&target.apply(cfg)?, target.manifest.as_deref())?;
                Ok(true)
            }
            CliCommand::Digest { path } => {
                run_digest(&path)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests;
