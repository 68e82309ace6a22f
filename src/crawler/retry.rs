//! Retry/backoff executor and network failure taxonomy
//!
//! Any network action can be wrapped by [`RetryPolicy::run`]. Failures are
//! classified as transient or fatal; only transient ones are retried.
//!
//! | Failure | Class |
//! |---------|-------|
//! | HTTP 408, 425, 429, 500, 502, 503, 504 | transient |
//! | timeout, connection reset/aborted, DNS failure, broken pipe | transient |
//! | anything else (404, 401, refused connection, redirect loop, ...) | fatal |

use crate::state::{classify_status, NetworkErrorKind, Reason};
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP statuses worth retrying
pub const TRANSIENT_STATUS_CODES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Returns true if a retry of a request answered with `status` may succeed
pub fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUS_CODES.contains(&status)
}

/// A failed network action
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a status the caller treats as a failure
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// No usable response was received
    #[error("{kind} while requesting {url}: {message}")]
    Network {
        url: String,
        kind: NetworkErrorKind,
        message: String,
    },
}

impl FetchError {
    /// Classifies a reqwest failure for `url`
    pub fn from_reqwest(url: &Url, err: reqwest::Error) -> Self {
        let kind = classify_reqwest_error(&err);
        Self::Network {
            url: url.to_string(),
            kind,
            message: err.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_transient_status(*status),
            Self::Network { kind, .. } => kind.is_transient(),
        }
    }

    /// HTTP status attached to the failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network { .. } => None,
        }
    }

    /// Semantic reason recorded on the resulting finding
    pub fn reason(&self) -> Reason {
        match self {
            Self::Status { status, .. } => {
                classify_status(Some(*status)).unwrap_or(Reason::Http(*status))
            }
            Self::Network { kind, .. } => Reason::Network(*kind),
        }
    }
}

/// Maps a reqwest error onto the network failure taxonomy
pub fn classify_reqwest_error(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }
    if err.is_redirect() {
        return NetworkErrorKind::TooManyRedirects;
    }

    if let Some(kind) = io_error_kind(err) {
        match kind {
            io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
            io::ErrorKind::ConnectionReset => return NetworkErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted => return NetworkErrorKind::ConnectionAborted,
            io::ErrorKind::BrokenPipe => return NetworkErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionRefused => return NetworkErrorKind::ConnectionRefused,
            _ => {}
        }
    }

    let chain = error_chain_text(err).to_lowercase();
    if chain.contains("dns") || chain.contains("lookup") || chain.contains("resolve") {
        NetworkErrorKind::DnsFailure
    } else if chain.contains("connection reset") {
        NetworkErrorKind::ConnectionReset
    } else if chain.contains("refused") {
        NetworkErrorKind::ConnectionRefused
    } else {
        NetworkErrorKind::Other
    }
}

/// Finds the first `io::Error` in the source chain
fn io_error_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = e.source();
    }
    None
}

fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,

    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt + 1`: `base * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Runs `action`, retrying transient failures
    ///
    /// On a fatal failure, or once retries are exhausted, the last error is
    /// returned unchanged so its classification survives.
    pub async fn run<T, F, Fut>(&self, method: &str, url: &Url, mut action: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let retry = err.is_transient() && attempt < self.max_retries;
                    tracing::warn!(
                        method,
                        url = %url,
                        attempt,
                        reason = %err.reason(),
                        retry,
                        "Request failed"
                    );
                    if !retry {
                        return Err(err);
                    }
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
