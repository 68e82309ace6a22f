//! Escalation policy from a lightweight fetch to a rendered fetch

use crate::config::BrowserConfig;
use crate::state::{Finding, Reason};

/// Decides whether a primary finding warrants a rendered retry
///
/// A plain request that was rejected, throttled or timed out may succeed
/// when a real browser executes the page's scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    statuses: Vec<u16>,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            statuses: vec![401, 403, 429],
        }
    }
}

impl FallbackPolicy {
    pub fn new(statuses: Vec<u16>) -> Self {
        Self { statuses }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(config.fallback_statuses.clone())
    }

    pub fn statuses(&self) -> &[u16] {
        &self.statuses
    }

    pub fn should_fallback(&self, finding: &Finding) -> bool {
        let by_reason = match finding.reason {
            Some(reason) if reason.is_timeout() => true,
            Some(Reason::Blocked) => self.statuses.contains(&403),
            Some(Reason::Http(code)) => self.statuses.contains(&code),
            _ => false,
        };
        let by_status = finding
            .status_code
            .is_some_and(|status| self.statuses.contains(&status));

        by_reason || by_status
    }
}
