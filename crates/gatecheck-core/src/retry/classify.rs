//! Classify HTTP status and curl errors into retry policy error kinds.

use super::policy::ErrorKind;
use crate::error::{DigestError, FetchError, PathError};

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error for retry decisions.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Classify a fetch/digest failure into an ErrorKind.
pub fn classify(e: &PathError) -> ErrorKind {
    match e {
        PathError::Fetch(FetchError::Status { status, .. }) => classify_http_status(*status),
        PathError::Fetch(FetchError::Timeout { .. }) => ErrorKind::Timeout,
        PathError::Fetch(FetchError::Transport { source, .. }) => classify_curl_error(source),
        PathError::Fetch(FetchError::Task { .. }) => ErrorKind::Other,
        PathError::Digest(DigestError::Truncated { .. }) => ErrorKind::Connection,
        PathError::Digest(DigestError::Interrupted { source, .. }) => classify_curl_error(source),
    }
}
