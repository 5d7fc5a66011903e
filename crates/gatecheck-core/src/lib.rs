//! Content-equivalence verification for assets served over several gateway paths.
//!
//! An asset is fetched via each access path (direct replica subdomain, reverse
//! proxy, phonebook alias), each body is digested, and every digest must equal
//! the digest of a local fixture file.

pub mod access;
pub mod asset;
pub mod config;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod fixture;
pub mod logging;
pub mod retry;
pub mod seq;
pub mod verify;

pub use access::{generate_access_urls, AccessPath, AccessUrls};
pub use asset::AssetDescriptor;
pub use config::{GatecheckConfig, NetworkConfig};
pub use digest::ContentDigest;
pub use error::{AssetVerificationError, ConfigurationError, DigestError, FetchError, VerifyError};
pub use fetch::{fetch_and_digest, FetchOptions};
pub use fixture::{DirFixtureReader, FixtureReader};
pub use verify::{
    verify_all, verify_asset, EvaluationMode, VerificationReport, VerificationResult, Verifier,
};
