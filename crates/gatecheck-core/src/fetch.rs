//! HTTP GET with a streaming content digest.
//!
//! Uses the curl crate (libcurl). The body is hashed chunk by chunk from the
//! write callback, so multi-megabyte assets are never buffered whole. The
//! digest is taken over the bytes actually received once the transfer has
//! completed, and a body shorter than `Content-Length` is rejected.

use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::config::FetchConfig;
use crate::digest::{ContentDigest, ContentHasher};
use crate::error::{ConfigurationError, DigestError, FetchError, PathError};
use crate::retry::{run_with_retry, RetryPolicy};

/// Timeouts, host overrides and retry policy for gateway fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub connect_timeout: Duration,
    /// Bound on the whole request including the full body read.
    pub timeout: Duration,
    /// curl `HOST:PORT:ADDRESS` entries.
    pub resolve: Vec<String>,
    pub max_redirections: u32,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    /// Same values as `FetchConfig::default()`.
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(120),
            resolve: Vec::new(),
            max_redirections: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// curl reads a 0 timeout as "no limit".
fn nonzero_secs(name: &str, secs: u64) -> Result<Duration, ConfigurationError> {
    if secs == 0 {
        return Err(ConfigurationError::InvalidParameter {
            name: name.to_string(),
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

impl TryFrom<&FetchConfig> for FetchOptions {
    type Error = ConfigurationError;

    fn try_from(cfg: &FetchConfig) -> Result<Self, Self::Error> {
        let retry = match &cfg.retry {
            Some(r) => RetryPolicy::try_from(r)?,
            None => RetryPolicy::default(),
        };
        Ok(Self {
            connect_timeout: nonzero_secs("fetch.connect_timeout_secs", cfg.connect_timeout_secs)?,
            timeout: nonzero_secs("fetch.timeout_secs", cfg.timeout_secs)?,
            resolve: cfg.resolve.clone(),
            max_redirections: 10,
            retry,
        })
    }
}

/// Digest of one successfully fetched body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchedDigest {
    pub digest: ContentDigest,
    pub bytes: u64,
    pub status: u32,
}

/// GET `url` and digest the body. Runs curl on the blocking pool.
pub async fn fetch_and_digest(url: &Url, opts: &FetchOptions) -> Result<FetchedDigest, PathError> {
    let target = url.to_string();
    let opts = opts.clone();
    let joined = tokio::task::spawn_blocking({
        let target = target.clone();
        move || fetch_and_digest_blocking(&target, &opts)
    })
    .await;
    match joined {
        Ok(result) => result,
        Err(e) => Err(FetchError::Task {
            url: target,
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Blocking GET with retry. Call from `spawn_blocking` if used from async code.
pub fn fetch_and_digest_blocking(url: &str, opts: &FetchOptions) -> Result<FetchedDigest, PathError> {
    run_with_retry(&opts.retry, || fetch_once(url, opts))
}

fn transport(url: &str, source: curl::Error) -> PathError {
    FetchError::Transport {
        url: url.to_string(),
        source,
    }
    .into()
}

fn fetch_once(url: &str, opts: &FetchOptions) -> Result<FetchedDigest, PathError> {
    let setup = |r: Result<(), curl::Error>| r.map_err(|e| transport(url, e));

    let mut easy = curl::easy::Easy::new();
    setup(easy.url(url))?;
    setup(easy.get(true))?;
    setup(easy.follow_location(true))?;
    setup(easy.max_redirections(opts.max_redirections))?;
    setup(easy.connect_timeout(opts.connect_timeout))?;
    setup(easy.timeout(opts.timeout))?;
    setup(easy.useragent(concat!("gatecheck/", env!("CARGO_PKG_VERSION"))))?;

    if !opts.resolve.is_empty() {
        let mut list = curl::easy::List::new();
        for entry in &opts.resolve {
            setup(list.append(entry))?;
        }
        setup(easy.resolve(list))?;
    }

    let mut hasher = ContentHasher::new();
    let performed = {
        let mut transfer = easy.transfer();
        setup(transfer.write_function(|data| {
            hasher.update(data);
            Ok(data.len())
        }))?;
        transfer.perform()
    };
    let received = hasher.len();

    if let Err(e) = performed {
        tracing::debug!(url, received, "GET failed: {}", e);
        if e.is_operation_timedout() {
            return Err(FetchError::Timeout {
                url: url.to_string(),
                source: e,
            }
            .into());
        }
        if e.is_partial_file() {
            return Err(DigestError::Interrupted {
                url: url.to_string(),
                received,
                source: e,
            }
            .into());
        }
        return Err(transport(url, e));
    }

    let status = easy.response_code().map_err(|e| transport(url, e))?;
    if !(200..300).contains(&status) {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        }
        .into());
    }

    // -1 when the server sent no Content-Length.
    let declared = easy.content_length_download().unwrap_or(-1.0);
    if declared >= 0.0 && received < declared as u64 {
        return Err(DigestError::Truncated {
            url: url.to_string(),
            expected: declared as u64,
            received,
        }
        .into());
    }

    let digest = hasher.finalize();
    tracing::debug!(url, status, bytes = received, %digest, "fetched");
    Ok(FetchedDigest {
        digest,
        bytes: received,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;

    #[test]
    fn options_from_config() {
        let cfg = FetchConfig {
            connect_timeout_secs: 2,
            timeout_secs: 30,
            resolve: vec!["a.localhost:8000:127.0.0.1".to_string()],
            retry: Some(RetryConfig {
                max_attempts: 1,
                base_delay_secs: 0.1,
                max_delay_secs: 1,
            }),
        };
        let opts = FetchOptions::try_from(&cfg).unwrap();
        assert_eq!(opts.connect_timeout, Duration::from_secs(2));
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.resolve.len(), 1);
        assert_eq!(opts.retry.max_attempts, 1);
        assert_eq!(opts.retry.base_delay, Duration::from_millis(100));
    }

    #[test]
    fn default_options_match_default_config() {
        let opts = FetchOptions::default();
        assert_eq!(opts, FetchOptions::try_from(&FetchConfig::default()).unwrap());
        assert_eq!(opts.retry, RetryPolicy::default());
        assert!(opts.resolve.is_empty());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let cfg = FetchConfig {
            timeout_secs: 0,
            ..FetchConfig::default()
        };
        let err = FetchOptions::try_from(&cfg).unwrap_err();
        assert!(
            matches!(&err, ConfigurationError::InvalidParameter { name, .. } if name == "fetch.timeout_secs"),
            "{:?}",
            err
        );

        let cfg = FetchConfig {
            connect_timeout_secs: 0,
            ..FetchConfig::default()
        };
        assert!(FetchOptions::try_from(&cfg).is_err());
    }

    #[test]
    fn huge_retry_delay_is_configuration_error() {
        let cfg = FetchConfig {
            retry: Some(RetryConfig {
                base_delay_secs: 1e20,
                ..RetryConfig::default()
            }),
            ..FetchConfig::default()
        };
        assert!(matches!(
            FetchOptions::try_from(&cfg),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{}/-/bm/-/bm-0/-/x", port)).unwrap();
        let opts = FetchOptions {
            retry: RetryPolicy::none(),
            ..FetchOptions::default()
        };
        let err = fetch_and_digest(&url, &opts).await.unwrap_err();
        assert!(
            matches!(err, PathError::Fetch(FetchError::Transport { .. })),
            "{:?}",
            err
        );
    }
}
