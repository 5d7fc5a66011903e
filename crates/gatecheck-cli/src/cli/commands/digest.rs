//! `gatecheck digest` – SHA-256 of a local file.

use anyhow::Result;
use gatecheck_core::digest;
use std::path::Path;

/// Compute and print SHA-256 of the given file, `sha256sum` style.
pub fn run_digest(path: &Path) -> Result<()> {
    let digest = digest::digest_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
