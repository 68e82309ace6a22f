//! Rendered-browser fallback fetch
//!
//! The browser itself sits behind the [`PageRenderer`] trait so the scan
//! loop does not depend on a Chromium install. [`RenderedFetcher`] turns a
//! raw rendering into a finding, scoped links and an asset status map.

use crate::config::Config;
use crate::crawler::fetcher::FetchOutcome;
use crate::crawler::options::{Cooperation, SiteCredentials};
use crate::state::{Finding, NetworkErrorKind, Reason, SourceType};
use crate::url::{in_scope, normalize};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::{Origin, Url};

/// Language preference sent by the rendered session
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Everything a renderer needs to load one page
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: Url,
    pub user_agent: String,

    /// Headers added to every request of the session
    pub extra_headers: Vec<(String, String)>,

    /// Answers to HTTP authentication challenges
    pub credentials: Option<SiteCredentials>,

    pub navigation_timeout: Duration,

    /// Upper bound on the wait for network quiescence after navigation
    pub idle_timeout: Duration,
}

/// Raw result of a rendered page load
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// Status of the main document response, if one was observed
    pub status: Option<u16>,

    /// Serialized DOM after scripts ran
    pub html: Option<String>,

    /// Resolved `href` of every anchor in the rendered DOM
    pub anchors: Vec<String>,

    /// `(url, status)` of every response observed while loading
    pub responses: Vec<(String, u16)>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Browser rendering unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} timed out")]
    Timeout { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

impl RenderError {
    pub fn reason(&self) -> Reason {
        match self {
            Self::Unavailable(_) => Reason::BrowserUnavailable,
            Self::Timeout { .. } => Reason::Network(NetworkErrorKind::Timeout),
            Self::Launch(_) | Self::Navigation { .. } | Self::Protocol(_) => Reason::BrowserError,
        }
    }
}

/// A script-executing page loader
///
/// Implementations own any session they create and must release it before
/// `render` returns, on success and on failure. [`RenderedFetcher`] drives
/// each call on its own task, so `render` runs to completion even when the
/// scan that requested it is cancelled.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderedPage, RenderError>;
}

/// Renderer used when no browser backend is compiled in
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRenderer;

#[async_trait]
impl PageRenderer for DisabledRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedPage, RenderError> {
        tracing::debug!("Rendered fetch of {} skipped: no browser backend", request.url);
        Err(RenderError::Unavailable(
            "built without the `browser` feature".to_string(),
        ))
    }
}

/// Returns the renderer matching the enabled cargo features
pub fn default_renderer(config: &Config) -> Arc<dyn PageRenderer> {
    #[cfg(feature = "browser")]
    {
        Arc::new(crate::crawler::browser::ChromiumRenderer::new(config.browser.headless))
    }
    #[cfg(not(feature = "browser"))]
    {
        let _ = config;
        Arc::new(DisabledRenderer)
    }
}

/// Fallback fetch strategy wrapping a [`PageRenderer`]
#[derive(Clone)]
pub struct RenderedFetcher {
    renderer: Arc<dyn PageRenderer>,
    user_agent: String,
    navigation_timeout: Duration,
    idle_timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(renderer: Arc<dyn PageRenderer>, config: &Config) -> Self {
        Self {
            renderer,
            user_agent: config.user_agent.browser_user_agent.clone(),
            navigation_timeout: config.browser.navigation_timeout(),
            idle_timeout: config.browser.idle_timeout(),
        }
    }

    /// Loads `url` in a rendering session
    ///
    /// Links are restricted to `origin`, deduplicated and capped at
    /// `link_budget`. Only same-origin sub-request statuses are kept.
    /// Failures yield a broken finding; nothing is retried here.
    pub async fn fetch_rendered(
        &self,
        url: &Url,
        origin: &Origin,
        cooperation: &Cooperation,
        link_budget: usize,
    ) -> FetchOutcome {
        let start = Instant::now();
        tracing::info!("Falling back to rendered fetch for {}", url);

        let mut extra_headers = vec![("Accept-Language".to_string(), ACCEPT_LANGUAGE.to_string())];
        extra_headers.extend(
            cooperation
                .headers()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value)),
        );

        let request = RenderRequest {
            url: url.clone(),
            user_agent: self.user_agent.clone(),
            extra_headers,
            credentials: cooperation.site_credentials.clone(),
            navigation_timeout: self.navigation_timeout,
            idle_timeout: self.idle_timeout,
        };

        // Detached so a cancelled scan never interrupts session teardown
        let renderer = Arc::clone(&self.renderer);
        let session = tokio::spawn(async move { renderer.render(request).await });
        let rendered = session
            .await
            .unwrap_or_else(|e| Err(RenderError::Protocol(format!("Render task failed: {}", e))));

        match rendered {
            Ok(page) => {
                let html = page.html.filter(|body| !body.is_empty());
                let finding = Finding::page(
                    url,
                    page.status,
                    html.as_deref(),
                    start.elapsed(),
                    SourceType::Rendered,
                );
                tracing::debug!(
                    "Rendered {} -> {:?} ({} anchors, {} responses)",
                    url,
                    page.status,
                    page.anchors.len(),
                    page.responses.len()
                );

                let mut outcome = FetchOutcome::new(finding, html);
                outcome.links = scoped_links(&page.anchors, url, origin, link_budget);
                outcome.network_status = scoped_statuses(&page.responses, origin);
                outcome
            }
            Err(err) => {
                tracing::warn!("Rendered fetch of {} failed: {}", url, err);
                let finding = Finding::failure(
                    url,
                    None,
                    err.reason(),
                    start.elapsed(),
                    SourceType::Rendered,
                );
                FetchOutcome::new(finding, None)
            }
        }
    }
}

fn scoped_links(anchors: &[String], page_url: &Url, origin: &Origin, budget: usize) -> Vec<Url> {
    let mut seen = HashSet::new();
    anchors
        .iter()
        .filter_map(|href| normalize(href, Some(page_url)))
        .filter(|link| in_scope(link, origin))
        .filter(|link| seen.insert(link.clone()))
        .take(budget)
        .collect()
}

fn scoped_statuses(responses: &[(String, u16)], origin: &Origin) -> HashMap<Url, u16> {
    responses
        .iter()
        .filter_map(|(raw, status)| Some((normalize(raw, None)?, *status)))
        .filter(|(url, _)| in_scope(url, origin))
        .collect()
}
