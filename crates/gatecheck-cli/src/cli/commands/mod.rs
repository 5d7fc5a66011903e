//! CLI command handlers. Each command is in its own file.

mod digest;
mod urls;
mod verify;

use anyhow::Result;
use gatecheck_core::asset::{builtin_assets, load_manifest, AssetDescriptor};
use std::path::Path;

pub use digest::run_digest;
pub use urls::run_urls;
pub use verify::run_verify;

#[cfg(test)]
pub(crate) use verify::report_json;

/// Assets from `manifest`, or the built-in list.
fn load_assets(manifest: Option<&Path>) -> Result<Vec<AssetDescriptor>> {
    match manifest {
        Some(path) => Ok(load_manifest(path)?),
        None => Ok(builtin_assets()),
    }
}
