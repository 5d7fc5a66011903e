//! Retry and backoff policy for gateway fetches.
//!
//! Classifies fetch failures (timeouts, throttling, connection failures,
//! 5xx) and decides exponential backoff, so transient gateway hiccups do not
//! read as content divergence. 4xx responses are never retried.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
