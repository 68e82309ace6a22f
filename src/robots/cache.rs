//! Robots.txt caching implementation
//!
//! One cache is shared by every scan session in the process. Entries are
//! created lazily on the first page of an origin and expire after the
//! configured TTL (or live for the process lifetime without one).

use crate::crawler::{Cooperation, PageFetcher};
use crate::robots::ParsedRobots;
use crate::url::origin_string;
use crate::ScanError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use url::{Origin, Url};

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: Arc<ParsedRobots>,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content: Arc::new(content),
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the entry is older than `ttl`; entries without a TTL never go stale
    pub fn is_stale(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.age() > ttl)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Process-wide robots policy cache keyed by origin
///
/// Concurrent misses on the same origin may both fetch robots.txt; the last
/// write wins and both results are equivalent.
#[derive(Debug)]
pub struct RobotsCache {
    /// Product token matched against `User-agent` groups
    product_token: String,

    ttl: Option<Duration>,

    entries: RwLock<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `product_token` - The crawler name robots.txt groups are matched on
    /// * `ttl` - Entry lifetime; `None` keeps entries for the process lifetime
    pub fn new(product_token: impl Into<String>, ttl: Option<std::time::Duration>) -> Self {
        Self {
            product_token: product_token.into(),
            ttl: ttl.and_then(|ttl| Duration::from_std(ttl).ok()),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn product_token(&self) -> &str {
        &self.product_token
    }

    /// Returns the policy for `origin`, fetching robots.txt on a miss
    ///
    /// A failed fetch, a non-2xx status or a non-textual body caches the
    /// permissive sentinel so the origin is not refetched.
    pub async fn get_policy(
        &self,
        origin: &Origin,
        fetcher: &PageFetcher,
        cooperation: &Cooperation,
    ) -> Arc<ParsedRobots> {
        let key = origin_string(origin);
        if let Some(policy) = self.lookup(&key) {
            return policy;
        }

        let policy = fetch_policy(&key, fetcher, cooperation).await;
        let entry = CachedRobots::new(policy);
        let content = Arc::clone(&entry.content);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        content
    }

    /// Fails with [`ScanError::RobotsDisallowed`] when `policy` disallows `url`
    pub fn ensure_allowed(&self, url: &Url, policy: &ParsedRobots) -> Result<(), ScanError> {
        if policy.is_allowed(url.as_str(), &self.product_token) {
            Ok(())
        } else {
            tracing::info!("Disallowed by robots.txt: {}", url);
            Err(ScanError::RobotsDisallowed {
                url: url.to_string(),
            })
        }
    }

    /// Drops expired entries, returning how many were removed
    pub fn purge_stale(&self) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(self.ttl));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &str) -> Option<Arc<ParsedRobots>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(|entry| Arc::clone(&entry.content))
    }
}

async fn fetch_policy(origin: &str, fetcher: &PageFetcher, cooperation: &Cooperation) -> ParsedRobots {
    let Ok(robots_url) = Url::parse(&format!("{}/robots.txt", origin)) else {
        return ParsedRobots::allow_all();
    };

    match fetcher.fetch_text(&robots_url, cooperation).await {
        Ok(response) if response.is_success() && response.is_text() => {
            tracing::debug!("Fetched {}", robots_url);
            ParsedRobots::from_content(response.body.as_deref().unwrap_or_default())
        }
        Ok(response) => {
            tracing::debug!(
                "No usable robots.txt at {} (status {}), allowing all",
                robots_url,
                response.status
            );
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
