//! Equivalence verification: every access path must serve the fixture's bytes.
//!
//! Per asset: validate, generate URLs, digest the local fixture (all before
//! any network traffic), then fetch and digest each access path and compare
//! against the reference. Fetch and digest failures are gathered into one
//! [`AssetVerificationError`], which also keeps the outcomes of the paths
//! that did fetch; configuration errors abort the whole run.

use serde::Serialize;
use std::ops::ControlFlow;
use std::sync::OnceLock;

use crate::access::{
    access_paths_from_config, default_access_paths, generate_access_urls, AccessPath, AccessUrl,
};
use crate::asset::AssetDescriptor;
use crate::config::{GatecheckConfig, NetworkConfig};
use crate::digest::ContentDigest;
use crate::error::{
    AssetVerificationError, ConfigurationError, FetchError, PathError, PathFailure, VerifyError,
};
use crate::fetch::{fetch_and_digest, FetchOptions, FetchedDigest};
use crate::fixture::{reference_digest, FixtureReader};
use crate::seq::{all_async, try_fold_until};

/// How much work to do once something diverges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMode {
    /// Fetch every path (concurrently) and verify every asset; report all divergences.
    #[default]
    Exhaustive,
    /// Evaluate paths and assets in order; stop at the first mismatch or failure.
    FailFast,
}

/// Digest served on one access path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathOutcome {
    pub name: String,
    pub url: String,
    pub digest: ContentDigest,
    pub bytes: u64,
    pub matches: bool,
}

/// Outcome for one asset whose paths could all be fetched (up to a fail-fast stop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub asset: AssetDescriptor,
    pub reference: ContentDigest,
    /// In access-path order. Under fail-fast, ends at the first mismatch.
    pub paths: Vec<PathOutcome>,
    pub all_match: bool,
}

impl VerificationResult {
    /// Paths whose digest differs from the reference.
    pub fn divergent_paths(&self) -> Vec<&str> {
        self.paths
            .iter()
            .filter(|p| !p.matches)
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// Per-asset entry of a [`VerificationReport`].
#[derive(Debug)]
pub enum AssetReport {
    Verified(VerificationResult),
    Failed(AssetVerificationError),
}

impl AssetReport {
    pub fn passed(&self) -> bool {
        matches!(self, AssetReport::Verified(r) if r.all_match)
    }

    pub fn label(&self) -> String {
        match self {
            AssetReport::Verified(r) => r.asset.label(),
            AssetReport::Failed(e) => format!("{}/{}", e.collection_name, e.asset_id),
        }
    }
}

/// Ordered per-asset outcomes of `verify_all`.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub assets: Vec<AssetReport>,
    /// Assets not evaluated because fail-fast stopped early.
    pub skipped: usize,
}

impl VerificationReport {
    /// Aggregate verdict. An empty run passes.
    pub fn all_passed(&self) -> bool {
        self.skipped == 0 && self.assets.iter().all(AssetReport::passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &AssetReport> {
        self.assets.iter().filter(|a| !a.passed())
    }
}

/// Network config, access paths, fetch options and evaluation mode for a run.
#[derive(Debug, Clone)]
pub struct Verifier {
    network: NetworkConfig,
    paths: Vec<AccessPath>,
    fetch: FetchOptions,
    mode: EvaluationMode,
}

enum PathStop {
    Mismatch(Vec<PathOutcome>),
    Failed(Vec<PathOutcome>, PathFailure),
}

enum AssetStop {
    Failed(Vec<AssetReport>),
    Config(ConfigurationError),
}

impl Verifier {
    /// Built-in access paths, default fetch options, exhaustive mode.
    pub fn new(network: NetworkConfig) -> Self {
        Self {
            network,
            paths: default_access_paths(),
            fetch: FetchOptions::default(),
            mode: EvaluationMode::default(),
        }
    }

    pub fn from_config(cfg: &GatecheckConfig) -> Result<Self, ConfigurationError> {
        cfg.network.validate()?;
        Ok(Self {
            network: cfg.network.clone(),
            paths: access_paths_from_config(&cfg.access_paths)?,
            fetch: FetchOptions::try_from(&cfg.fetch)?,
            mode: EvaluationMode::default(),
        })
    }

    pub fn with_access_paths(mut self, paths: Vec<AccessPath>) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn access_paths(&self) -> &[AccessPath] {
        &self.paths
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Verify one asset across every access path.
    pub async fn verify_asset<R: FixtureReader>(
        &self,
        asset: &AssetDescriptor,
        reader: &R,
    ) -> Result<VerificationResult, VerifyError> {
        let urls = generate_access_urls(asset, &self.network, &self.paths)?;
        let reference = reference_digest(reader, asset).await?;

        let (paths, failures) = match self.mode {
            EvaluationMode::FailFast => self.scan_fail_fast(urls.iter(), reference).await,
            EvaluationMode::Exhaustive => self.scan_all(urls.iter(), reference).await,
        };

        for p in paths.iter().filter(|p| !p.matches) {
            tracing::warn!(
                asset = %asset.label(),
                path = %p.name,
                expected = %reference,
                got = %p.digest,
                "content diverges from fixture"
            );
        }
        if !failures.is_empty() {
            for f in &failures {
                tracing::warn!(asset = %asset.label(), path = %f.path, "fetch failed: {}", f.error);
            }
            return Err(AssetVerificationError {
                collection_name: asset.collection_name.clone(),
                asset_id: asset.asset_id.clone(),
                failures,
                outcomes: paths,
            }
            .into());
        }

        let all_match = paths.len() == urls.len() && paths.iter().all(|p| p.matches);
        tracing::info!(asset = %asset.label(), all_match, "verified");
        Ok(VerificationResult {
            asset: asset.clone(),
            reference,
            paths,
            all_match,
        })
    }

    /// Verify assets in order. Under fail-fast, stops at the first asset that
    /// does not pass; the rest are counted as skipped.
    pub async fn verify_all<R: FixtureReader>(
        &self,
        assets: &[AssetDescriptor],
        reader: &R,
    ) -> Result<VerificationReport, ConfigurationError> {
        let this = self;
        let flow = try_fold_until(assets.iter(), Vec::new(), move |mut acc, asset| async move {
            let entry = match this.verify_asset(asset, reader).await {
                Ok(result) => AssetReport::Verified(result),
                Err(VerifyError::Asset(e)) => AssetReport::Failed(e),
                Err(VerifyError::Configuration(e)) => {
                    return ControlFlow::Break(AssetStop::Config(e));
                }
            };
            let passed = entry.passed();
            acc.push(entry);
            if !passed && this.mode == EvaluationMode::FailFast {
                ControlFlow::Break(AssetStop::Failed(acc))
            } else {
                ControlFlow::Continue(acc)
            }
        })
        .await;

        let report = match flow {
            ControlFlow::Continue(done) => VerificationReport {
                assets: done,
                skipped: 0,
            },
            ControlFlow::Break(AssetStop::Failed(done)) => VerificationReport {
                skipped: assets.len() - done.len(),
                assets: done,
            },
            ControlFlow::Break(AssetStop::Config(e)) => return Err(e),
        };
        tracing::info!(
            assets = assets.len(),
            passed = report.all_passed(),
            skipped = report.skipped,
            "verification run finished"
        );
        Ok(report)
    }

    async fn scan_fail_fast<'a>(
        &self,
        urls: impl Iterator<Item = &'a AccessUrl>,
        reference: ContentDigest,
    ) -> (Vec<PathOutcome>, Vec<PathFailure>) {
        let fetch = &self.fetch;
        let flow = try_fold_until(urls, Vec::new(), move |mut acc, access| async move {
            match fetch_and_digest(&access.url, fetch).await {
                Ok(fetched) => {
                    let outcome = outcome(access, fetched, reference);
                    let matches = outcome.matches;
                    acc.push(outcome);
                    if matches {
                        ControlFlow::Continue(acc)
                    } else {
                        ControlFlow::Break(PathStop::Mismatch(acc))
                    }
                }
                Err(error) => ControlFlow::Break(PathStop::Failed(acc, failure(access, error))),
            }
        })
        .await;
        match flow {
            ControlFlow::Continue(paths) | ControlFlow::Break(PathStop::Mismatch(paths)) => {
                (paths, Vec::new())
            }
            ControlFlow::Break(PathStop::Failed(paths, f)) => (paths, vec![f]),
        }
    }

    /// Issue every fetch at once, then collect in access-path order.
    async fn scan_all<'a>(
        &self,
        urls: impl Iterator<Item = &'a AccessUrl>,
        reference: ContentDigest,
    ) -> (Vec<PathOutcome>, Vec<PathFailure>) {
        let pending: Vec<_> = urls
            .map(|access| {
                let url = access.url.clone();
                let opts = self.fetch.clone();
                let handle = tokio::spawn(async move { fetch_and_digest(&url, &opts).await });
                (access, handle)
            })
            .collect();

        let mut paths = Vec::with_capacity(pending.len());
        let mut failures = Vec::new();
        for (access, handle) in pending {
            let result = handle.await.unwrap_or_else(|e| {
                Err(FetchError::Task {
                    url: access.url.to_string(),
                    reason: e.to_string(),
                }
                .into())
            });
            match result {
                Ok(fetched) => paths.push(outcome(access, fetched, reference)),
                Err(error) => failures.push(failure(access, error)),
            }
        }
        (paths, failures)
    }
}

fn outcome(access: &AccessUrl, fetched: FetchedDigest, reference: ContentDigest) -> PathOutcome {
    PathOutcome {
        name: access.name.clone(),
        url: access.url.to_string(),
        digest: fetched.digest,
        bytes: fetched.bytes,
        matches: fetched.digest == reference,
    }
}

fn failure(access: &AccessUrl, error: PathError) -> PathFailure {
    PathFailure {
        path: access.name.clone(),
        url: access.url.to_string(),
        error,
    }
}

/// Verify one asset over the built-in access paths with default fetch options.
pub async fn verify_asset<R: FixtureReader>(
    asset: &AssetDescriptor,
    network: &NetworkConfig,
    reader: &R,
) -> Result<VerificationResult, VerifyError> {
    Verifier::new(network.clone()).verify_asset(asset, reader).await
}

/// Verify assets in order over the built-in access paths; `true` when all pass.
///
/// Stops at the first asset that does not pass. A configuration error on an
/// evaluated asset is returned instead of the verdict.
pub async fn verify_all<R: FixtureReader>(
    assets: &[AssetDescriptor],
    network: &NetworkConfig,
    reader: &R,
) -> Result<bool, ConfigurationError> {
    let verifier = Verifier::new(network.clone());
    let config_error = OnceLock::new();
    let passed = all_async(assets, |asset| {
        let (verifier, config_error) = (&verifier, &config_error);
        async move {
            match verifier.verify_asset(asset, reader).await {
                Ok(result) => result.all_match,
                Err(VerifyError::Asset(_)) => false,
                Err(VerifyError::Configuration(e)) => {
                    let _ = config_error.set(e);
                    false
                }
            }
        }
    })
    .await;
    match config_error.into_inner() {
        Some(e) => Err(e),
        None => Ok(passed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::builtin_assets;
    use crate::fixture::MemoryFixtures;
    use crate::retry::RetryPolicy;

    fn closed_port() -> u16 {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    }

    fn unreachable_verifier(mode: EvaluationMode) -> Verifier {
        let network = NetworkConfig {
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: closed_port(),
            ..NetworkConfig::default()
        };
        let paths = vec![
            AccessPath::new("proxy", "http://{proxy_host}:{proxy_port}/-/{canister_id}/-/{collection_name}/-/{asset_id}").unwrap(),
            AccessPath::new("phonebook", "http://{proxy_host}:{proxy_port}/-/{phonebook_id}/-/{collection_name}/-/{asset_id}").unwrap(),
        ];
        Verifier::new(network)
            .with_access_paths(paths)
            .with_fetch_options(FetchOptions {
                retry: RetryPolicy::none(),
                ..FetchOptions::default()
            })
            .with_mode(mode)
    }

    #[tokio::test]
    async fn empty_asset_list_passes_vacuously() {
        let verifier = unreachable_verifier(EvaluationMode::Exhaustive);
        let report = verifier.verify_all(&[], &MemoryFixtures::new()).await.unwrap();
        assert!(report.all_passed());
        assert!(report.assets.is_empty());

        let ok = verify_all(&[], &NetworkConfig::default(), &MemoryFixtures::new())
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn missing_fixture_is_configuration_error() {
        let verifier = unreachable_verifier(EvaluationMode::Exhaustive);
        let asset = builtin_assets().remove(0);
        let err = verifier
            .verify_asset(&asset, &MemoryFixtures::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Configuration(ConfigurationError::FixtureMissing(_))
        ));

        let err = verifier
            .verify_all(&[asset], &MemoryFixtures::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::FixtureMissing(_)));
    }

    #[tokio::test]
    async fn exhaustive_reports_every_failed_path() {
        let verifier = unreachable_verifier(EvaluationMode::Exhaustive);
        let asset = builtin_assets().remove(0);
        let fixtures = MemoryFixtures::new().with_file("nft0.png", b"png".to_vec());
        let err = match verifier.verify_asset(&asset, &fixtures).await {
            Err(VerifyError::Asset(e)) => e,
            other => panic!("expected asset error, got {:?}", other),
        };
        assert_eq!(err.failed_paths(), vec!["proxy", "phonebook"]);
        assert_eq!(err.asset_id, "brain.matters.nft0.png");
    }

    #[tokio::test]
    async fn fail_fast_stops_at_first_failed_path() {
        let verifier = unreachable_verifier(EvaluationMode::FailFast);
        let asset = builtin_assets().remove(0);
        let fixtures = MemoryFixtures::new().with_file("nft0.png", b"png".to_vec());
        let err = match verifier.verify_asset(&asset, &fixtures).await {
            Err(VerifyError::Asset(e)) => e,
            other => panic!("expected asset error, got {:?}", other),
        };
        assert_eq!(err.failed_paths(), vec!["proxy"]);
    }

    #[tokio::test]
    async fn fail_fast_run_skips_remaining_assets() {
        let verifier = unreachable_verifier(EvaluationMode::FailFast);
        let mut second = builtin_assets().remove(0);
        second.asset_id = "brain.matters.nft1.png".to_string();
        let assets = vec![builtin_assets().remove(0), second];
        let fixtures = MemoryFixtures::new().with_file("nft0.png", b"png".to_vec());
        let report = verifier.verify_all(&assets, &fixtures).await.unwrap();
        assert!(!report.all_passed());
        assert_eq!(report.assets.len(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed().count(), 1);
    }

    #[tokio::test]
    async fn bad_template_config_is_rejected_before_fixture_read() {
        let verifier = Verifier::new(NetworkConfig::default())
            .with_access_paths(vec![AccessPath::new("odd", "not a url {asset_id}").unwrap()]);
        let asset = builtin_assets().remove(0);
        let err = verifier
            .verify_asset(&asset, &MemoryFixtures::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Configuration(ConfigurationError::InvalidTemplate { .. })
        ));
    }

    #[tokio::test]
    async fn verify_all_verdict_stops_at_first_failing_asset() {
        let network = NetworkConfig {
            replica_port: closed_port(),
            proxy_host: "127.0.0.1".to_string(),
            proxy_port: closed_port(),
            ..NetworkConfig::default()
        };
        let failing = builtin_assets().remove(0);
        let mut unfixtured = failing.clone();
        unfixtured.local_file_name = "absent.png".to_string();
        let fixtures = MemoryFixtures::new().with_file("nft0.png", b"png".to_vec());

        let err = verify_all(&[unfixtured.clone()], &network, &fixtures)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::FixtureMissing(_)));

        // The second asset is never reached, so its missing fixture goes unnoticed.
        let ok = verify_all(&[failing, unfixtured], &network, &fixtures)
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn no_access_paths_never_passes() {
        let verifier = Verifier::new(NetworkConfig::default()).with_access_paths(Vec::new());
        let asset = builtin_assets().remove(0);
        let fixtures = MemoryFixtures::new().with_file("nft0.png", b"png".to_vec());
        let err = verifier.verify_asset(&asset, &fixtures).await.unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Configuration(ConfigurationError::MissingParameter(_))
        ));
        assert!(verifier.verify_all(&[asset], &fixtures).await.is_err());
    }

    #[test]
    fn from_config_rejects_unusable_fetch_settings() {
        let cfg: GatecheckConfig = toml::from_str(
            "[fetch.retry]\nmax_attempts = 3\nbase_delay_secs = 1e20\nmax_delay_secs = 5\n",
        )
        .unwrap();
        assert!(matches!(
            Verifier::from_config(&cfg),
            Err(ConfigurationError::InvalidParameter { .. })
        ));

        let mut cfg = GatecheckConfig::default();
        cfg.fetch.timeout_secs = 0;
        assert!(Verifier::from_config(&cfg).is_err());
    }

    #[test]
    fn from_config_rejects_bad_network() {
        let mut cfg = GatecheckConfig::default();
        cfg.network.replica_port = 0;
        assert!(Verifier::from_config(&cfg).is_err());
        assert_eq!(
            Verifier::from_config(&GatecheckConfig::default())
                .unwrap()
                .access_paths()
                .len(),
            3
        );
    }
}
