//! `gatecheck urls` – show the URLs each asset would be fetched from.

use anyhow::Result;
use gatecheck_core::access::{access_paths_from_config, generate_access_urls};
use gatecheck_core::config::GatecheckConfig;
use std::path::Path;

use super::load_assets;

pub fn run_urls(cfg: &GatecheckConfig, manifest: Option<&Path>) -> Result<()> {
    let paths = access_paths_from_config(&cfg.access_paths)?;
    for asset in load_assets(manifest)? {
        let urls = generate_access_urls(&asset, &cfg.network, &paths)?;
        println!("{}", asset.label());
        for access in &urls {
            println!("  {:<10} {}", access.name, access.url);
        }
    }
    Ok(())
}
