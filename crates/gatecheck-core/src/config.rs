use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;

/// Canister identifier override.
pub const ENV_CANISTER_ID: &str = "NFT_CANISTER_ID";
/// Proxy port override.
pub const ENV_PROXY_PORT: &str = "PROXY_PORT";
/// Replica port override.
pub const ENV_REPLICA_PORT: &str = "REPLICA_PORT";

/// Network location of the system under test.
///
/// Passed explicitly into every operation; the core never reads the process
/// environment. Use [`NetworkConfig::with_env_overrides`] at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Canister serving the assets.
    pub canister_id: String,
    /// Host of the replica; the direct path addresses `{canister_id}.{replica_host}`.
    pub replica_host: String,
    pub replica_port: u16,
    /// Host of the reverse proxy (serves both the proxied and phonebook paths).
    pub proxy_host: String,
    pub proxy_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            canister_id: "rrkah-fqaaa-aaaaa-aaaaq-cai".to_string(),
            replica_host: "localhost".to_string(),
            replica_port: 8000,
            proxy_host: "localhost".to_string(),
            proxy_port: 3000,
        }
    }
}

impl NetworkConfig {
    /// Reject empty identifiers/hosts and port 0.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("canister_id", &self.canister_id),
            ("replica_host", &self.replica_host),
            ("proxy_host", &self.proxy_host),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::MissingParameter(name.to_string()));
            }
        }
        for (name, port) in [
            ("replica_port", self.replica_port),
            ("proxy_port", self.proxy_port),
        ] {
            if port == 0 {
                return Err(ConfigurationError::InvalidParameter {
                    name: name.to_string(),
                    reason: "port must be non-zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply `NFT_CANISTER_ID`, `PROXY_PORT` and `REPLICA_PORT` from `lookup`.
    /// Empty values are ignored; unparseable ports are an error.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(id) = get(ENV_CANISTER_ID) {
            self.canister_id = id.trim().to_string();
        }
        if let Some(port) = get(ENV_PROXY_PORT) {
            self.proxy_port = parse_port(ENV_PROXY_PORT, &port)?;
        }
        if let Some(port) = get(ENV_REPLICA_PORT) {
            self.replica_port = parse_port(ENV_REPLICA_PORT, &port)?;
        }
        Ok(self)
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16, ConfigurationError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigurationError::InvalidParameter {
            name: name.to_string(),
            reason: format!("{:?} is not a port: {}", value, e),
        })
}

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch (including the first). 1 disables retry.
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 5,
        }
    }
}

/// HTTP fetch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound on a whole GET (request and full body read), in seconds.
    pub timeout_secs: u64,
    /// Host overrides in curl's `HOST:PORT:ADDRESS` form, e.g. to pin
    /// `<canister>.localhost:8000` to `127.0.0.1`.
    pub resolve: Vec<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            timeout_secs: 120,
            resolve: Vec::new(),
            retry: None,
        }
    }
}

/// Extra or replacement access path declared in config.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPathConfig {
    pub name: String,
    pub template: String,
}

/// Global configuration loaded from `~/.config/gatecheck/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatecheckConfig {
    /// Directory the fixture files are read from.
    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: PathBuf,
    /// `[[access_path]]` entries; a name matching a built-in path replaces it.
    #[serde(default, rename = "access_path")]
    pub access_paths: Vec<AccessPathConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_fixture_dir() -> PathBuf {
    PathBuf::from(".test_assets")
}

impl Default for GatecheckConfig {
    fn default() -> Self {
        Self {
            fixture_dir: default_fixture_dir(),
            access_paths: Vec::new(),
            network: NetworkConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gatecheck")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GatecheckConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GatecheckConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    Ok(load_from_path(&path)?)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<GatecheckConfig, ConfigurationError> {
    let data = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&data).map_err(|source| ConfigurationError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
