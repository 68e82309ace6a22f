//! Semantic classification attached to unhealthy findings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network-level failure classes
///
/// The string forms follow the error codes operators already grep for
/// (`econnreset`, `enotfound`, ...), except timeouts which are reported as
/// `timeout` so they can drive the fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionReset,
    ConnectionAborted,
    DnsFailure,
    BrokenPipe,
    ConnectionRefused,
    TooManyRedirects,
    Other,
}

impl NetworkErrorKind {
    /// Returns true if a retry is expected to succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout
                | Self::ConnectionReset
                | Self::ConnectionAborted
                | Self::DnsFailure
                | Self::BrokenPipe
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionReset => "econnreset",
            Self::ConnectionAborted => "econnaborted",
            Self::DnsFailure => "enotfound",
            Self::BrokenPipe => "epipe",
            Self::ConnectionRefused => "econnrefused",
            Self::TooManyRedirects => "too-many-redirects",
            Self::Other => "network-error",
        }
    }

    fn all() -> [Self; 8] {
        [
            Self::Timeout,
            Self::ConnectionReset,
            Self::ConnectionAborted,
            Self::DnsFailure,
            Self::BrokenPipe,
            Self::ConnectionRefused,
            Self::TooManyRedirects,
            Self::Other,
        ]
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a finding is broken or its body unusable
///
/// Serialized as a plain string (`blocked`, `http-404`, `econnreset`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Reason {
    /// No HTTP status was obtained
    NoStatus,
    /// HTTP 403
    Blocked,
    /// HTTP 503
    Maintenance,
    /// Any other HTTP status >= 400
    Http(u16),
    /// Healthy status but nothing in the body
    EmptyBody,
    /// Request failed below HTTP
    Network(NetworkErrorKind),
    /// Rendered fallback requested but no browser backend is compiled in
    BrowserUnavailable,
    /// Rendering session failed for a reason other than a timeout
    BrowserError,
}

impl Reason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network(NetworkErrorKind::Timeout))
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStatus => f.write_str("no-status"),
            Self::Blocked => f.write_str("blocked"),
            Self::Maintenance => f.write_str("maintenance"),
            Self::Http(code) => write!(f, "http-{}", code),
            Self::EmptyBody => f.write_str("empty-body"),
            Self::Network(kind) => f.write_str(kind.as_str()),
            Self::BrowserUnavailable => f.write_str("browser-unavailable"),
            Self::BrowserError => f.write_str("browser-error"),
        }
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-status" => return Ok(Self::NoStatus),
            "blocked" => return Ok(Self::Blocked),
            "maintenance" => return Ok(Self::Maintenance),
            "empty-body" => return Ok(Self::EmptyBody),
            "browser-unavailable" => return Ok(Self::BrowserUnavailable),
            "browser-error" => return Ok(Self::BrowserError),
            _ => {}
        }

        if let Some(code) = s.strip_prefix("http-") {
            return code
                .parse::<u16>()
                .map(Self::Http)
                .map_err(|_| format!("invalid HTTP reason: {}", s));
        }

        NetworkErrorKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .map(Self::Network)
            .ok_or_else(|| format!("unknown reason: {}", s))
    }
}

impl From<Reason> for String {
    fn from(reason: Reason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for Reason {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Classifies a page response
///
/// | condition | reason |
/// |---|---|
/// | no status obtained | `no-status` |
/// | status 403 | `blocked` |
/// | status 503 | `maintenance` |
/// | status >= 400 (other) | `http-<code>` |
/// | status < 400 but empty body | `empty-body` |
/// | otherwise | none |
pub fn classify_status_reason(status: Option<u16>, body: Option<&str>) -> Option<Reason> {
    match classify_status(status) {
        Some(reason) => Some(reason),
        None if body.map_or(true, str::is_empty) => Some(Reason::EmptyBody),
        None => None,
    }
}

/// Classifies a status alone, for resources whose body is never read
pub fn classify_status(status: Option<u16>) -> Option<Reason> {
    match status {
        None => Some(Reason::NoStatus),
        Some(403) => Some(Reason::Blocked),
        Some(503) => Some(Reason::Maintenance),
        Some(code) if code >= 400 => Some(Reason::Http(code)),
        Some(_) => None,
    }
}
