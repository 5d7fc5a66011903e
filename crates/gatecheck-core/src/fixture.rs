//! Local reference fixtures: the known-good bytes every access path must match.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::asset::AssetDescriptor;
use crate::digest::{digest_bytes, ContentDigest};
use crate::error::ConfigurationError;

/// Read-only access to fixture files by relative path.
pub trait FixtureReader {
    fn read_fixture(&self, relative: &Path) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

/// Fixtures under a directory on disk (e.g. `.test_assets`).
#[derive(Debug, Clone)]
pub struct DirFixtureReader {
    root: PathBuf,
}

impl DirFixtureReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `relative` under the root; absolute paths and `..` are refused.
    fn resolve(&self, relative: &Path) -> io::Result<PathBuf> {
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("fixture path {} must be relative", relative.display()),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl FixtureReader for DirFixtureReader {
    async fn read_fixture(&self, relative: &Path) -> io::Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        tokio::fs::read(&path).await
    }
}

/// In-memory fixtures keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFixtures {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFixtures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, relative: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(relative.into(), bytes.into());
        self
    }
}

impl FixtureReader for MemoryFixtures {
    async fn read_fixture(&self, relative: &Path) -> io::Result<Vec<u8>> {
        self.files.get(relative).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no fixture {}", relative.display()),
            )
        })
    }
}

/// Read the asset's fixture and digest it. Any failure is a configuration error.
pub async fn reference_digest<R: FixtureReader>(
    reader: &R,
    asset: &AssetDescriptor,
) -> Result<ContentDigest, ConfigurationError> {
    let relative = Path::new(&asset.local_file_name);
    let bytes = reader.read_fixture(relative).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ConfigurationError::FixtureMissing(relative.to_path_buf())
        } else {
            ConfigurationError::FixtureRead {
                path: relative.to_path_buf(),
                source: e,
            }
        }
    })?;
    let digest = digest_bytes(&bytes);
    tracing::debug!(
        fixture = %relative.display(),
        bytes = bytes.len(),
        %digest,
        "reference digest"
    );
    Ok(digest)
}
