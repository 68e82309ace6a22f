//! BrokenLink Scanner: a bounded broken-link and missing-asset auditor
//!
//! This crate crawls a single site breadth-first, checking every page and
//! same-origin asset it discovers while respecting robots.txt and per-host
//! pacing. Pages that reject a plain HTTP request can be retried through a
//! rendered browser session.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminant for [`ScanError`], stable across the serialized boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InvalidUrl,
    RobotsDisallowed,
    BrowserRequired,
    Cancelled,
    Internal,
}

/// Main error type for a scan session
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid or unsupported URL: {url}")]
    InvalidUrl { url: String },

    #[error("Disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("Scan requires browser automation to bypass bot protection at {url}")]
    BrowserFallbackRequired {
        url: String,
        partial_findings: Vec<Finding>,
    },

    #[error("Scan was cancelled")]
    Cancelled { partial_findings: Vec<Finding> },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid session transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::SessionState,
        to: state::SessionState,
    },
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::RobotsDisallowed { .. } => ErrorKind::RobotsDisallowed,
            Self::BrowserFallbackRequired { .. } => ErrorKind::BrowserRequired,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config(_) | Self::Reqwest(_) | Self::InvalidTransition { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP-equivalent status for the caller
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidUrl => 400,
            ErrorKind::RobotsDisallowed => 403,
            ErrorKind::BrowserRequired => 409,
            ErrorKind::Cancelled => 499,
            ErrorKind::Internal => 500,
        }
    }

    /// Machine-readable reason, absent for unclassified internal failures
    pub fn reason(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::InvalidUrl => Some("invalid-url"),
            ErrorKind::RobotsDisallowed => Some("robots.txt"),
            ErrorKind::BrowserRequired => Some("browser-required"),
            ErrorKind::Cancelled => Some("cancelled"),
            ErrorKind::Internal => None,
        }
    }

    /// Findings collected before the session stopped, if the error carries them
    pub fn partial_findings(&self) -> Option<&[Finding]> {
        match self {
            Self::BrowserFallbackRequired {
                partial_findings, ..
            }
            | Self::Cancelled { partial_findings } => Some(partial_findings),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Cooperation, ScanOptions, Scanner, SiteCredentials};
pub use state::{Finding, Reason, SessionState, SourceType};
pub use url::{in_scope, normalize};
