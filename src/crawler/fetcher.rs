//! Lightweight HTTP fetcher
//!
//! This module handles every plain HTTP request the scanner makes:
//! - Building the HTTP client with the declared crawler identity
//! - GET requests for pages and robots.txt
//! - HEAD (then GET on 405) probes for assets
//! - Rate limiting and retry of transient failures
//! - Status/body classification of the result

use crate::config::Config;
use crate::crawler::options::Cooperation;
use crate::crawler::policy::FallbackPolicy;
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::retry::{is_transient_status, FetchError, RetryPolicy};
use crate::state::{Finding, SourceType};
use reqwest::{redirect::Policy, Client, Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Result of fetching one page, from either strategy
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Body usable for link extraction, if any
    pub html: Option<String>,

    pub finding: Finding,

    /// The plain request was rejected or throttled; a rendered fetch may succeed
    pub should_fallback: bool,

    /// Anchors already discovered by the fetch itself (rendered DOM)
    pub links: Vec<Url>,

    /// Statuses of same-origin sub-requests observed while loading the page
    pub network_status: HashMap<Url, u16>,
}

impl FetchOutcome {
    pub fn new(finding: Finding, html: Option<String>) -> Self {
        Self {
            html,
            finding,
            should_fallback: false,
            links: Vec::new(),
            network_status: HashMap::new(),
        }
    }
}

/// Raw response of a lightweight request
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

impl TextResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the declared content type is textual (or undeclared)
    pub fn is_text(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.trim_start().starts_with("text/"))
    }

    /// True when the declared content type is HTML (or undeclared)
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
    }
}

/// Builds the HTTP client used for all lightweight requests
///
/// # Arguments
///
/// * `config` - The scanner configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use brokenlink_scanner::config::Config;
/// use brokenlink_scanner::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let timeout = config.scanner.request_timeout();

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(config.scanner.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Primary fetch strategy: one plain request per resource, paced and retried
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    policy: FallbackPolicy,
}

impl PageFetcher {
    pub fn new(
        client: Client,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        policy: FallbackPolicy,
    ) -> Self {
        Self {
            client,
            limiter,
            retry,
            policy,
        }
    }

    /// Fetches a page with a single GET (no script execution)
    ///
    /// Transient failures are retried; once retries are exhausted the page is
    /// recorded as a broken finding rather than an error.
    pub async fn fetch_page(&self, url: &Url, cooperation: &Cooperation) -> FetchOutcome {
        let start = Instant::now();

        let mut outcome = match self.request(Method::GET, url, cooperation, true).await {
            Ok(response) => {
                let is_html = response.is_html();
                let body = response.body.unwrap_or_default();
                let finding = Finding::page(
                    url,
                    Some(response.status),
                    Some(&body),
                    start.elapsed(),
                    SourceType::Primary,
                );
                let html = (is_html && !body.is_empty()).then_some(body);
                FetchOutcome::new(finding, html)
            }
            Err(err) => {
                tracing::debug!("GET {} failed: {}", url, err);
                let finding = Finding::failure(
                    url,
                    err.status(),
                    err.reason(),
                    start.elapsed(),
                    SourceType::Primary,
                );
                FetchOutcome::new(finding, None)
            }
        };

        outcome.should_fallback = self.policy.should_fallback(&outcome.finding);
        log_finding("GET", &outcome.finding);
        outcome
    }

    /// Checks an asset with HEAD, retrying once with GET when HEAD is not allowed
    pub async fn probe_asset(&self, url: &Url, cooperation: &Cooperation) -> Finding {
        let head = self.check_asset(Method::HEAD, url, cooperation).await;
        if head.status_code == Some(StatusCode::METHOD_NOT_ALLOWED.as_u16()) {
            tracing::debug!("HEAD not allowed for {}, retrying with GET", url);
            return self.check_asset(Method::GET, url, cooperation).await;
        }
        head
    }

    async fn check_asset(&self, method: Method, url: &Url, cooperation: &Cooperation) -> Finding {
        let start = Instant::now();
        let finding = match self.request(method.clone(), url, cooperation, false).await {
            Ok(response) => Finding::asset(
                url,
                Some(response.status),
                start.elapsed(),
                SourceType::Primary,
            ),
            Err(err) => Finding::failure(
                url,
                err.status(),
                err.reason(),
                start.elapsed(),
                SourceType::Primary,
            ),
        };
        log_finding(method.as_str(), &finding);
        finding
    }

    /// GETs a textual resource such as robots.txt
    pub async fn fetch_text(
        &self,
        url: &Url,
        cooperation: &Cooperation,
    ) -> Result<TextResponse, FetchError> {
        self.request(Method::GET, url, cooperation, true).await
    }

    /// Sends one request through the rate limiter and retry executor
    ///
    /// Transient statuses are surfaced as errors so they get retried; every
    /// other status is returned as a response.
    async fn request(
        &self,
        method: Method,
        url: &Url,
        cooperation: &Cooperation,
        read_body: bool,
    ) -> Result<TextResponse, FetchError> {
        self.retry
            .run(method.as_str(), url, || {
                let method = method.clone();
                async move {
                    self.limiter.await_turn(url).await;
                    tracing::trace!("{} {}", method, url);

                    let request = cooperation.apply(self.client.request(method, url.clone()));
                    let response = request
                        .send()
                        .await
                        .map_err(|e| FetchError::from_reqwest(url, e))?;

                    let status = response.status().as_u16();
                    if is_transient_status(status) {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }

                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);

                    let body = if read_body {
                        Some(
                            response
                                .text()
                                .await
                                .map_err(|e| FetchError::from_reqwest(url, e))?,
                        )
                    } else {
                        None
                    };

                    Ok(TextResponse {
                        status,
                        content_type,
                        body,
                    })
                }
            })
            .await
    }
}

fn log_finding(method: &str, finding: &Finding) {
    match (&finding.status_code, &finding.reason) {
        (Some(status), Some(reason)) => {
            tracing::debug!("{} {} -> {} ({})", method, finding.link, status, reason)
        }
        (Some(status), None) => tracing::debug!("{} {} -> {}", method, finding.link, status),
        (None, Some(reason)) => tracing::debug!("{} {} failed ({})", method, finding.link, reason),
        (None, None) => tracing::debug!("{} {} failed", method, finding.link),
    }
}
