/// Finding records produced by a scan
///
/// A finding is immutable once appended to a session's result list.
use crate::state::reason::{classify_status, classify_status_reason, Reason};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Which fetch strategy produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Lightweight HTTP request
    Primary,
    /// Rendered browser session
    Rendered,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Rendered => f.write_str("rendered"),
        }
    }
}

/// One audited resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Canonical absolute URL
    pub link: String,

    /// HTTP status, absent when none was obtained
    pub status_code: Option<u16>,

    /// True if the status is missing or >= 400
    pub broken: bool,

    pub time_taken_ms: u64,

    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
}

impl Finding {
    /// Finding for a fetched page whose body was read
    pub fn page(
        link: &Url,
        status: Option<u16>,
        body: Option<&str>,
        elapsed: Duration,
        source_type: SourceType,
    ) -> Self {
        Self {
            link: link.to_string(),
            status_code: status,
            broken: is_broken(status),
            time_taken_ms: millis(elapsed),
            source_type,
            reason: classify_status_reason(status, body),
        }
    }

    /// Finding for an asset probe, where only the status matters
    pub fn asset(
        link: &Url,
        status: Option<u16>,
        elapsed: Duration,
        source_type: SourceType,
    ) -> Self {
        Self {
            link: link.to_string(),
            status_code: status,
            broken: is_broken(status),
            time_taken_ms: millis(elapsed),
            source_type,
            reason: classify_status(status),
        }
    }

    /// Finding for a request that failed outright
    pub fn failure(
        link: &Url,
        status: Option<u16>,
        reason: Reason,
        elapsed: Duration,
        source_type: SourceType,
    ) -> Self {
        Self {
            link: link.to_string(),
            status_code: status,
            broken: true,
            time_taken_ms: millis(elapsed),
            source_type,
            reason: Some(reason),
        }
    }

    /// Finding synthesized from a status observed during a rendered session
    pub fn observed(link: &Url, status: u16) -> Self {
        Self::asset(link, Some(status), Duration::ZERO, SourceType::Rendered)
    }
}

/// A status is broken when it is missing or >= 400
pub fn is_broken(status: Option<u16>) -> bool {
    status.map_or(true, |code| code >= 400)
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
