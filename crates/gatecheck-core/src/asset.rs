//! Asset descriptors and the asset manifest.
//!
//! A manifest is a TOML file of `[[asset]]` tables:
//!
//! ```toml
//! [[asset]]
//! collection_name = "bm-0"
//! asset_id = "brain.matters.nft0.png"
//! phonebook_id = "bm"
//! local_file_name = "nft0.png"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigurationError;

/// One fixture: where it lives on the gateway and which local file it must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub collection_name: String,
    /// May contain path-like segments (`a/b.png`).
    pub asset_id: String,
    /// Short alias resolved by the phonebook.
    pub phonebook_id: String,
    /// Relative to the fixture directory.
    #[serde(alias = "file")]
    pub local_file_name: String,
}

impl AssetDescriptor {
    pub fn new(
        collection_name: impl Into<String>,
        asset_id: impl Into<String>,
        phonebook_id: impl Into<String>,
        local_file_name: impl Into<String>,
    ) -> Self {
        Self {
            collection_name: collection_name.into(),
            asset_id: asset_id.into(),
            phonebook_id: phonebook_id.into(),
            local_file_name: local_file_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("collection_name", &self.collection_name),
            ("asset_id", &self.asset_id),
            ("local_file_name", &self.local_file_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::MissingParameter(name.to_string()));
            }
        }
        Ok(())
    }

    /// `collection/asset`, used in logs and reports.
    pub fn label(&self) -> String {
        format!("{}/{}", self.collection_name, self.asset_id)
    }
}

/// Assets verified when no manifest is given.
pub fn builtin_assets() -> Vec<AssetDescriptor> {
    vec![AssetDescriptor::new(
        "bm-0",
        "brain.matters.nft0.png",
        "bm",
        "nft0.png",
    )]
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "asset")]
    assets: Vec<AssetDescriptor>,
}

/// Parse a manifest from TOML text. Every descriptor is validated.
pub fn parse_manifest(text: &str) -> Result<Vec<AssetDescriptor>, toml::de::Error> {
    let manifest: Manifest = toml::from_str(text)?;
    Ok(manifest.assets)
}

/// Load and validate a manifest file. Order in the file is the verification order.
pub fn load_manifest(path: &Path) -> Result<Vec<AssetDescriptor>, ConfigurationError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let assets = parse_manifest(&text).map_err(|source| ConfigurationError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    for asset in &assets {
        asset.validate()?;
    }
    tracing::debug!(count = assets.len(), "loaded manifest {}", path.display());
    Ok(assets)
}
