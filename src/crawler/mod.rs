//! Crawler module for auditing a site
//!
//! This module contains the core scanning logic, including:
//! - Per-host rate limiting and retry of transient failures
//! - Primary HTTP fetching and the rendered-browser fallback
//! - HTML parsing for links and assets
//! - Frontier management and overall scan coordination

mod coordinator;
mod fetcher;
mod frontier;
mod options;
mod parser;
mod policy;
mod rate_limiter;
mod renderer;
mod retry;

#[cfg(feature = "browser")]
mod browser;

pub use coordinator::Scanner;
pub use fetcher::{build_http_client, FetchOutcome, PageFetcher, TextResponse};
pub use frontier::Frontier;
pub use options::{Cooperation, ScanOptions, SiteCredentials, API_KEY_HEADER};
pub use parser::{extract, ExtractedPage};
pub use policy::FallbackPolicy;
pub use rate_limiter::RateLimiter;
pub use renderer::{
    default_renderer, DisabledRenderer, PageRenderer, RenderError, RenderRequest, RenderedFetcher,
    RenderedPage, ACCEPT_LANGUAGE,
};
pub use retry::{
    classify_reqwest_error, is_transient_status, FetchError, RetryPolicy, TRANSIENT_STATUS_CODES,
};

#[cfg(feature = "browser")]
pub use browser::ChromiumRenderer;
