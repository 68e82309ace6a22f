//! Chromium-backed [`PageRenderer`]
//!
//! Each render launches an isolated browser, loads one page and tears the
//! browser down again. Page and browser are closed on every exit path;
//! close failures are logged and never mask the render result.

use crate::crawler::renderer::{PageRenderer, RenderError, RenderRequest, RenderedPage};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams as FetchEnableParams, EventAuthRequired,
    EventRequestPaused,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventResponseReceived, Headers, ResourceType,
    SetExtraHttpHeadersParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Quiet period after which the network counts as idle
const IDLE_WINDOW: Duration = Duration::from_millis(500);

const IDLE_POLL: Duration = Duration::from_millis(100);

const ANCHORS_JS: &str = "Array.from(document.querySelectorAll('a[href]'), a => a.href)";

#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    headless: bool,
}

impl ChromiumRenderer {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder().args([
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--no-first-run",
            "--disable-extensions",
        ]);
        if !self.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedPage, RenderError> {
        let (mut browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = match browser.new_page("about:blank").await {
            Ok(page) => {
                let result = load(&page, &request).await;
                if let Err(e) = page.close().await {
                    tracing::warn!("Failed to close page for {}: {}", request.url, e);
                }
                result
            }
            Err(e) => Err(RenderError::Protocol(e.to_string())),
        };

        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
        handler_task.abort();

        result
    }
}

/// Shared state filled by the response listener
#[derive(Debug)]
struct Observed {
    main_status: Option<u16>,
    responses: Vec<(String, u16)>,
    last_activity: Instant,
}

impl Observed {
    fn new() -> Self {
        Self {
            main_status: None,
            responses: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    /// Records one response; statuses outside the HTTP range are not kept
    fn record(&mut self, url: &str, status: i64, is_document: bool) {
        self.last_activity = Instant::now();
        let Ok(status) = u16::try_from(status) else {
            tracing::debug!("Ignoring response {} with status {}", url, status);
            return;
        };
        if is_document && self.main_status.is_none() {
            self.main_status = Some(status);
        }
        self.responses.push((url.to_string(), status));
    }
}

async fn load(page: &Page, request: &RenderRequest) -> Result<RenderedPage, RenderError> {
    let url = request.url.as_str();

    page.execute(SetUserAgentOverrideParams::new(request.user_agent.clone()))
        .await
        .map_err(protocol)?;
    page.execute(NetworkEnableParams::default())
        .await
        .map_err(protocol)?;

    let headers: serde_json::Map<String, serde_json::Value> = request
        .extra_headers
        .iter()
        .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
        .collect();
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(
        serde_json::Value::Object(headers),
    )))
    .await
    .map_err(protocol)?;

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if let Some(credentials) = &request.credentials {
        tasks.extend(answer_auth_challenges(page, &credentials.user, &credentials.pass).await?);
    }

    let observed = Arc::new(Mutex::new(Observed::new()));
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(protocol)?;
    let sink = Arc::clone(&observed);
    tasks.push(tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            sink.lock().unwrap_or_else(PoisonError::into_inner).record(
                &event.response.url,
                event.response.status,
                event.r#type == ResourceType::Document,
            );
        }
    }));

    let result = navigate(page, request, &observed).await;
    for task in tasks {
        task.abort();
    }
    let (html, anchors) = result?;

    let observed = observed.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::debug!(
        "Rendered {} with {} observed responses",
        url,
        observed.responses.len()
    );
    Ok(RenderedPage {
        status: observed.main_status,
        html: Some(html),
        anchors,
        responses: observed.responses.clone(),
    })
}

async fn navigate(
    page: &Page,
    request: &RenderRequest,
    observed: &Arc<Mutex<Observed>>,
) -> Result<(String, Vec<String>), RenderError> {
    let url = request.url.as_str();

    match tokio::time::timeout(request.navigation_timeout, page.goto(url)).await {
        Err(_) => {
            return Err(RenderError::Timeout {
                url: url.to_string(),
            })
        }
        Ok(Err(e)) => {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
        }
        Ok(Ok(_)) => {}
    }

    wait_for_network_idle(observed, request.idle_timeout).await;

    let html = page.content().await.map_err(protocol)?;
    let anchors = page
        .evaluate(ANCHORS_JS)
        .await
        .map_err(protocol)?
        .into_value::<Vec<String>>()
        .map_err(|e| RenderError::Protocol(e.to_string()))?;

    Ok((html, anchors))
}

/// Waits until no response arrived for [`IDLE_WINDOW`], at most `limit`
async fn wait_for_network_idle(observed: &Arc<Mutex<Observed>>, limit: Duration) {
    let start = Instant::now();
    loop {
        let quiet_for = observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_activity
            .elapsed();
        if quiet_for >= IDLE_WINDOW {
            return;
        }
        if start.elapsed() >= limit {
            tracing::debug!("Network never went idle within {:?}", limit);
            return;
        }
        tokio::time::sleep(IDLE_POLL).await;
    }
}

/// Intercepts requests so HTTP authentication challenges can be answered
async fn answer_auth_challenges(
    page: &Page,
    user: &str,
    pass: &str,
) -> Result<Vec<JoinHandle<()>>, RenderError> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(protocol)?;
    let mut challenges = page
        .event_listener::<EventAuthRequired>()
        .await
        .map_err(protocol)?;

    page.execute(FetchEnableParams {
        patterns: None,
        handle_auth_requests: Some(true),
    })
    .await
    .map_err(protocol)?;

    let resume_page = page.clone();
    let resume = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let params = ContinueRequestParams::new(event.request_id.clone());
            if let Err(e) = resume_page.execute(params).await {
                tracing::debug!("Failed to resume intercepted request: {}", e);
            }
        }
    });

    let auth_page = page.clone();
    let (user, pass) = (user.to_string(), pass.to_string());
    let auth = tokio::spawn(async move {
        while let Some(event) = challenges.next().await {
            let response = AuthChallengeResponse {
                response: AuthChallengeResponseResponse::ProvideCredentials,
                username: Some(user.clone()),
                password: Some(pass.clone()),
            };
            let params = ContinueWithAuthParams::new(event.request_id.clone(), response);
            if let Err(e) = auth_page.execute(params).await {
                tracing::debug!("Failed to answer auth challenge: {}", e);
            }
        }
    });

    Ok(vec![resume, auth])
}

fn protocol(err: chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Protocol(err.to_string())
}
