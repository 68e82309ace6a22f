//! Per-hostname request pacing
//!
//! One limiter is shared by every scan session in the process, so two scans
//! of the same host are paced together.

use crate::url::extract_host;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// Enforces a minimum interval between request starts to the same hostname
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum gap between two request starts
    interval: Duration,

    /// Start time of the most recent (or next reserved) request per hostname
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until a request to `url`'s hostname may start
    ///
    /// The slot is reserved under the lock and the recorded timestamp is the
    /// moment the wait ends, so concurrent callers queue behind each other
    /// instead of all reading the same stale timestamp.
    pub async fn await_turn(&self, url: &Url) {
        let Some(host) = extract_host(url) else {
            return;
        };

        let start_at = self.reserve(&host, Instant::now());
        let wait = start_at.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Rate limiting {} for {:?}", host, wait);
            tokio::time::sleep_until(start_at).await;
        }
    }

    /// Reserves the next request slot for `host` and returns its start time
    fn reserve(&self, host: &str, now: Instant) -> Instant {
        let mut last_request = self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let start_at = match last_request.get(host) {
            Some(last) => (*last + self.interval).max(now),
            None => now,
        };
        last_request.insert(host.to_string(), start_at);
        start_at
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
