//! Error taxonomy for verification runs.
//!
//! Low-level fetch and digest failures never escape `verify_asset` on their
//! own: they are wrapped per access path into [`PathFailure`] and aggregated
//! into an [`AssetVerificationError`]. Configuration problems abort the run.

use std::fmt;
use std::path::PathBuf;

use crate::verify::PathOutcome;

/// The test itself is misconfigured (missing parameter, bad template, missing fixture).
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    #[error("invalid value for `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("access path `{path}`: {reason}")]
    InvalidTemplate { path: String, reason: String },

    #[error("fixture not found: {}", .0.display())]
    FixtureMissing(PathBuf),

    #[error("failed to read fixture {}", .path.display())]
    FixtureRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// GET did not produce a 2xx response.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u32 },

    #[error("GET {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("GET {url} failed")]
    Transport {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("GET {url}: fetch task failed: {reason}")]
    Task { url: String, reason: String },
}

/// The response body could not be read in full.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("GET {url}: body truncated, expected {expected} bytes, got {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("GET {url}: body stream interrupted after {received} bytes")]
    Interrupted {
        url: String,
        received: u64,
        #[source]
        source: curl::Error,
    },
}

/// Failure of a single fetch-and-digest attempt.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Digest(#[from] DigestError),
}

/// One access path that could not be digested.
#[derive(Debug)]
pub struct PathFailure {
    pub path: String,
    pub url: String,
    pub error: PathError,
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Every fetch/digest failure encountered while verifying one asset.
#[derive(Debug)]
pub struct AssetVerificationError {
    pub collection_name: String,
    pub asset_id: String,
    pub failures: Vec<PathFailure>,
    /// Paths that were fetched and digested, in access-path order.
    pub outcomes: Vec<PathOutcome>,
}

impl AssetVerificationError {
    /// Names of the access paths that failed, in evaluation order.
    pub fn failed_paths(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.path.as_str()).collect()
    }

    /// Fetched paths whose digest differs from the fixture.
    pub fn divergent_paths(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|p| !p.matches)
            .map(|p| p.name.as_str())
            .collect()
    }
}

impl fmt::Display for AssetVerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "asset {}/{} failed verification",
            self.collection_name, self.asset_id
        )?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i == 0 {
                write!(f, ": {}", failure)?;
            } else {
                write!(f, "; {}", failure)?;
            }
        }
        for name in self.divergent_paths() {
            write!(f, "; {}: content differs from fixture", name)?;
        }
        Ok(())
    }
}

impl std::error::Error for AssetVerificationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}

/// Single failure channel of `verify_asset`.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Asset(#[from] AssetVerificationError),
}
