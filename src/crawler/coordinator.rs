//! Scan coordinator - main scan orchestration logic
//!
//! This module contains the scan loop that coordinates one scan session:
//! - Validating the start URL and seeding the frontier
//! - Gating every page against robots.txt
//! - Escalating from the primary fetch to a rendered fetch
//! - Extracting links and probing assets within the finding budget
//! - Driving the session state machine and honoring cancellation

use crate::config::{validate, Config};
use crate::crawler::fetcher::{build_http_client, FetchOutcome, PageFetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::options::ScanOptions;
use crate::crawler::parser::extract;
use crate::crawler::policy::FallbackPolicy;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::renderer::{default_renderer, PageRenderer, RenderedFetcher};
use crate::crawler::retry::RetryPolicy;
use crate::robots::RobotsCache;
use crate::state::{Finding, SessionState};
use crate::url::normalize;
use crate::ScanError;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::{Origin, Url};

/// Entry point for scans
///
/// A scanner holds the process-wide collaborators (robots cache, rate
/// limiter, renderer) and can run any number of concurrent scans; each scan
/// gets its own frontier and result list.
#[derive(Clone)]
pub struct Scanner {
    config: Arc<Config>,
    fetcher: PageFetcher,
    rendered: RenderedFetcher,
    robots: Arc<RobotsCache>,
}

impl Scanner {
    /// Creates a scanner with fresh shared state and the default renderer
    ///
    /// # Arguments
    ///
    /// * `config` - The scanner configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Scanner)` - Ready to scan
    /// * `Err(ScanError)` - Invalid configuration or HTTP client failure
    pub fn new(config: Config) -> Result<Self, ScanError> {
        let robots = Arc::new(RobotsCache::new(
            config.user_agent.robots_token(),
            config.scanner.robots_ttl(),
        ));
        let limiter = Arc::new(RateLimiter::new(config.scanner.rate_limit_interval()));
        let renderer = default_renderer(&config);
        Self::with_shared(config, robots, limiter, renderer)
    }

    /// Creates a scanner around caller-owned shared state
    ///
    /// Scanners built from the same `robots` and `limiter` share robots
    /// policies and per-host pacing.
    pub fn with_shared(
        config: Config,
        robots: Arc<RobotsCache>,
        limiter: Arc<RateLimiter>,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Self, ScanError> {
        validate(&config)?;

        let client = build_http_client(&config)?;
        let retry = RetryPolicy::new(config.scanner.max_retries, config.scanner.backoff_base());
        let policy = FallbackPolicy::from_config(&config.browser);
        let fetcher = PageFetcher::new(client, limiter, retry, policy);
        let rendered = RenderedFetcher::new(renderer, &config);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            rendered,
            robots,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn robots(&self) -> &Arc<RobotsCache> {
        &self.robots
    }

    /// Scans the site at `url` and returns its findings in discovery order
    pub async fn scan(&self, url: &str, options: ScanOptions) -> Result<Vec<Finding>, ScanError> {
        self.scan_with_cancel(url, options, CancellationToken::new())
            .await
    }

    /// Like [`Scanner::scan`], stopping early once `cancel` fires
    pub async fn scan_with_cancel(
        &self,
        url: &str,
        options: ScanOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<Finding>, ScanError> {
        ScanSession::new(self, options, cancel).run(url).await
    }
}

/// One scan invocation
struct ScanSession<'a> {
    scanner: &'a Scanner,
    options: ScanOptions,
    cancel: CancellationToken,
    state: SessionState,
    budget: usize,
    findings: Vec<Finding>,
}

impl<'a> ScanSession<'a> {
    fn new(scanner: &'a Scanner, mut options: ScanOptions, cancel: CancellationToken) -> Self {
        options.cooperation = options.cooperation.sanitized();
        let budget = options.budget(scanner.config.scanner.max_findings);
        Self {
            scanner,
            options,
            cancel,
            state: SessionState::Idle,
            budget,
            findings: Vec::new(),
        }
    }

    /// Runs the scan loop to a terminal state
    async fn run(&mut self, raw_url: &str) -> Result<Vec<Finding>, ScanError> {
        if self.cancel.is_cancelled() {
            self.transition(SessionState::Aborted)?;
            return Err(self.cancelled());
        }

        let start_url = normalize(raw_url, None).ok_or_else(|| ScanError::InvalidUrl {
            url: raw_url.to_string(),
        })?;
        let origin = start_url.origin();
        let mut frontier = Frontier::new(start_url.clone());

        self.transition(SessionState::Running)?;
        tracing::info!("Starting scan of {} (budget {})", start_url, self.budget);
        let started = Instant::now();

        while self.findings.len() < self.budget {
            if self.cancel.is_cancelled() {
                self.transition(SessionState::Aborted)?;
                return Err(self.cancelled());
            }

            let Some(url) = frontier.next_page() else {
                tracing::debug!("Frontier is empty");
                break;
            };

            if let Err(err) = self.process_page(&url, &origin, &mut frontier).await {
                let next = match err {
                    ScanError::BrowserFallbackRequired { .. } => SessionState::Blocked,
                    _ => SessionState::Aborted,
                };
                self.transition(next)?;
                tracing::info!("Scan of {} stopped ({}): {}", start_url, next, err);
                return Err(err);
            }

            if frontier.visited_count() % 10 == 0 {
                tracing::info!(
                    "Progress: {} pages visited, {} findings, {} in frontier",
                    frontier.visited_count(),
                    self.findings.len(),
                    frontier.len()
                );
            }
        }

        self.transition(SessionState::Completed)?;
        let mut findings = std::mem::take(&mut self.findings);
        findings.truncate(self.budget);

        tracing::info!(
            "Scan of {} completed: {} findings ({} broken) in {:?}",
            start_url,
            findings.len(),
            findings.iter().filter(|f| f.broken).count(),
            started.elapsed()
        );
        Ok(findings)
    }

    /// Processes one dequeued page
    ///
    /// This method:
    /// 1. Enforces the origin's robots policy
    /// 2. Fetches the page, escalating to a rendered fetch when warranted
    /// 3. Records the page finding
    /// 4. Enqueues discovered links and checks discovered assets
    async fn process_page(
        &mut self,
        url: &Url,
        origin: &Origin,
        frontier: &mut Frontier,
    ) -> Result<(), ScanError> {
        let scanner = self.scanner;
        let cooperation = &self.options.cooperation;

        let policy = self
            .guard(
                scanner
                    .robots
                    .get_policy(&url.origin(), &scanner.fetcher, cooperation),
            )
            .await?;
        scanner.robots.ensure_allowed(url, &policy)?;

        let mut outcome = self
            .guard(scanner.fetcher.fetch_page(url, cooperation))
            .await?;

        if outcome.should_fallback {
            if !self.options.allow_browser_fallback {
                self.findings.push(outcome.finding);
                return Err(ScanError::BrowserFallbackRequired {
                    url: url.to_string(),
                    partial_findings: self.findings.clone(),
                });
            }

            let rendered = self
                .guard(
                    scanner
                        .rendered
                        .fetch_rendered(url, origin, cooperation, self.budget),
                )
                .await?;
            outcome = merge_fallback(outcome, rendered);
        }

        self.findings.push(outcome.finding.clone());

        if self.findings.len() >= self.budget {
            return Ok(());
        }
        let Some(html) = outcome.html.as_deref() else {
            return Ok(());
        };

        let extracted = extract(html, url, origin);
        let links = if outcome.links.is_empty() {
            extracted.links
        } else {
            std::mem::take(&mut outcome.links)
        };
        let added = frontier.enqueue_bounded(links, self.findings.len(), self.budget);
        tracing::debug!("Queued {} new links from {}", added, url);

        for asset in extracted.assets {
            if self.findings.len() >= self.budget {
                break;
            }
            if !frontier.claim_asset(&asset) {
                continue;
            }

            let finding = match outcome.network_status.get(&asset) {
                Some(&status) => Finding::observed(&asset, status),
                None => {
                    self.guard(scanner.fetcher.probe_asset(&asset, cooperation))
                        .await?
                }
            };
            self.findings.push(finding);
        }

        Ok(())
    }

    /// Awaits `fut` unless the session is cancelled first
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, ScanError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(self.cancelled()),
            output = fut => Ok(output),
        }
    }

    fn cancelled(&self) -> ScanError {
        ScanError::Cancelled {
            partial_findings: self.findings.clone(),
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), ScanError> {
        if !self.state.can_transition_to(next) {
            return Err(ScanError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Session {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Combines a primary outcome with the rendered fetch that followed it
///
/// A rendered fetch that produced content supersedes the primary result.
/// Otherwise the primary finding is kept and only takes the rendered reason
/// when it has none of its own.
fn merge_fallback(primary: FetchOutcome, rendered: FetchOutcome) -> FetchOutcome {
    if rendered.html.is_some() {
        return rendered;
    }

    let mut primary = primary;
    if primary.finding.reason.is_none() {
        primary.finding.reason = rendered.finding.reason;
    }
    primary
}
