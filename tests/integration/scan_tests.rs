//! Integration tests for the scanner
//!
//! These tests use wiremock to create mock HTTP servers and run full scans
//! end-to-end. The rendered path is driven by a scripted renderer.

use async_trait::async_trait;
use brokenlink_scanner::config::Config;
use brokenlink_scanner::crawler::{
    DisabledRenderer, PageRenderer, RateLimiter, RenderError, RenderRequest, RenderedPage,
};
use brokenlink_scanner::robots::RobotsCache;
use brokenlink_scanner::{
    Cooperation, Finding, Reason, ScanError, ScanOptions, Scanner, SiteCredentials, SourceType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration without pacing or backoff delays
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.scanner.rate_limit_interval_ms = 0;
    config.scanner.backoff_base_ms = 1;
    config
}

fn create_scanner(config: Config, renderer: Arc<dyn PageRenderer>) -> Scanner {
    let robots = Arc::new(RobotsCache::new(
        config.user_agent.robots_token(),
        config.scanner.robots_ttl(),
    ));
    let limiter = Arc::new(RateLimiter::new(config.scanner.rate_limit_interval()));
    Scanner::with_shared(config, robots, limiter, renderer).expect("Failed to build scanner")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

fn link(server: &MockServer, p: &str) -> String {
    format!("{}{}", server.uri(), p)
}

fn find<'a>(findings: &'a [Finding], url: &str) -> &'a Finding {
    findings
        .iter()
        .find(|f| f.link == url)
        .unwrap_or_else(|| panic!("No finding for {}", url))
}

/// Renderer double returning one canned page for every request
struct ScriptedRenderer {
    page: RenderedPage,
    requests: Mutex<Vec<RenderRequest>>,
}

impl ScriptedRenderer {
    fn new(page: RenderedPage) -> Arc<Self> {
        Arc::new(Self {
            page,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, request: RenderRequest) -> Result<RenderedPage, RenderError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.page.clone())
    }
}

#[tokio::test]
async fn test_single_page_with_broken_image() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><h1>Home</h1><img src="/missing.png"></body></html>"#,
    )
    .await;
    Mock::given(method("HEAD"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    assert_eq!(findings.len(), 2);

    assert_eq!(findings[0].link, link(&server, "/"));
    assert_eq!(findings[0].status_code, Some(200));
    assert!(!findings[0].broken);
    assert_eq!(findings[0].reason, None);
    assert_eq!(findings[0].source_type, SourceType::Primary);

    assert_eq!(findings[1].link, link(&server, "/missing.png"));
    assert_eq!(findings[1].status_code, Some(404));
    assert!(findings[1].broken);
    assert_eq!(findings[1].reason, Some(Reason::Http(404)));
}

#[tokio::test]
async fn test_budget_caps_findings() {
    let server = MockServer::start().await;
    let links: String = (0..150)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &format!("<html><body>{}</body></html>", links)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p\d+$"))
        .respond_with(html("<html><body>leaf</body></html>"))
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    assert_eq!(findings.len(), 100);
    assert_eq!(findings[1].link, link(&server, "/p0"));
    assert_eq!(findings[99].link, link(&server, "/p98"));

    // Only the seed and the 99 queued pages were requested
    let requested = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count();
    assert_eq!(requested, 100);
}

#[tokio::test]
async fn test_whitelist_doubles_budget() {
    let server = MockServer::start().await;
    let links: String = (0..250)
        .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p\d+$"))
        .respond_with(html("leaf"))
        .mount(&server)
        .await;

    let options = ScanOptions {
        cooperation: Cooperation {
            whitelist_ip: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner.scan(&server.uri(), options).await.expect("Scan failed");

    assert_eq!(findings.len(), 200);
}

#[tokio::test]
async fn test_links_are_unique_and_in_scope() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r##"<a href="/a">A</a><a href="/a#x">A again</a><a href="/b">B</a>
            <a href="https://elsewhere.example/">External</a>"##,
    )
    .await;
    mount_page(&server, "/a", r#"<a href="/">Home</a><a href="/b">B</a>"#).await;
    mount_page(&server, "/b", r#"<a href="/a">A</a>"#).await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    let links: Vec<&str> = findings.iter().map(|f| f.link.as_str()).collect();
    assert_eq!(
        links,
        vec![
            link(&server, "/").as_str(),
            link(&server, "/a").as_str(),
            link(&server, "/b").as_str(),
        ]
    );
}

#[tokio::test]
async fn test_shared_asset_is_probed_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/next">Next</a><img src="/logo.png">"#).await;
    mount_page(&server, "/next", r#"<img src="/logo.png">"#).await;
    Mock::given(method("HEAD"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    assert_eq!(findings.len(), 3);
    assert!(findings.iter().all(|f| !f.broken));
}

#[tokio::test]
async fn test_head_not_allowed_falls_back_to_get() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<script src="/app.js"></script>"#).await;
    Mock::given(method("HEAD"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
        .expect(1)
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    let asset = find(&findings, &link(&server, "/app.js"));
    assert_eq!(asset.status_code, Some(200));
    assert!(!asset.broken);
}

#[tokio::test]
async fn test_robots_disallow_on_seed() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: BrokenLinkAI\nDisallow: /").await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("never fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let err = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::RobotsDisallowed { .. }));
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.reason(), Some("robots.txt"));
    assert!(err.partial_findings().is_none());
}

#[tokio::test]
async fn test_robots_disallow_on_deeper_page_aborts() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;
    mount_page(&server, "/", r#"<a href="/private/area">Private</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/private/area"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let err = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .unwrap_err();

    match err {
        ScanError::RobotsDisallowed { url } => assert_eq!(url, link(&server, "/private/area")),
        other => panic!("Unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_other_crawlers_rules_do_not_apply() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: SomeOtherBot\nDisallow: /").await;
    mount_page(&server, "/", "<p>ok</p>").await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");
    assert_eq!(findings.len(), 1);
}

#[tokio::test]
async fn test_robots_rules_follow_overridden_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .and(header("user-agent", "AcmeAudit/2.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_string("User-agent: AcmeAudit\nDisallow: /"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("never fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.user_agent.user_agent_override = Some("AcmeAudit/2.0".to_string());
    let scanner = create_scanner(config, Arc::new(DisabledRenderer));
    let err = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::RobotsDisallowed { .. }));
}

#[tokio::test]
async fn test_maintenance_page_is_retried_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.scanner.backoff_base_ms = 500;
    let scanner = create_scanner(config, Arc::new(DisabledRenderer));

    let start = Instant::now();
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    // 500ms before the second attempt, 1000ms before the third
    assert!(start.elapsed() >= Duration::from_millis(1500));
    assert_eq!(findings.len(), 1);
    assert!(findings[0].broken);
    assert_eq!(findings[0].status_code, Some(503));
    assert_eq!(findings[0].reason, Some(Reason::Maintenance));
}

#[tokio::test]
async fn test_requests_to_same_host_are_paced() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/a">A</a>"#).await;
    mount_page(&server, "/a", "leaf").await;

    let mut config = create_test_config();
    config.scanner.rate_limit_interval_ms = 500;
    let scanner = create_scanner(config, Arc::new(DisabledRenderer));

    let start = Instant::now();
    scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    // robots.txt, "/" and "/a" are three request starts on one host
    assert!(start.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn test_blocked_page_without_fallback_returns_partial_findings() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/members">Members</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/members"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let options = ScanOptions {
        allow_browser_fallback: false,
        ..Default::default()
    };
    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let err = scanner.scan(&server.uri(), options).await.unwrap_err();

    assert_eq!(err.status_code(), 409);
    assert_eq!(err.reason(), Some("browser-required"));
    let partial = err.partial_findings().expect("Missing partial findings");
    assert_eq!(partial.len(), 2);
    assert_eq!(partial[0].link, link(&server, "/"));
    assert_eq!(partial[1].link, link(&server, "/members"));
    assert_eq!(partial[1].status_code, Some(403));
    assert_eq!(partial[1].reason, Some(Reason::Blocked));
}

#[tokio::test]
async fn test_rendered_fallback_supersedes_blocked_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bot check"))
        .mount(&server)
        .await;
    mount_page(&server, "/about", "<p>about</p>").await;
    Mock::given(method("HEAD"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let renderer = ScriptedRenderer::new(RenderedPage {
        status: Some(200),
        html: Some(r#"<html><body><a href="/about">About</a><img src="/logo.png"></body></html>"#.to_string()),
        anchors: vec![link(&server, "/about"), "https://elsewhere.example/".to_string()],
        responses: vec![(link(&server, "/"), 200), (link(&server, "/logo.png"), 404)],
    });
    let scanner = create_scanner(create_test_config(), renderer.clone());

    let options = ScanOptions {
        cooperation: Cooperation {
            api_key: Some("k-123".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let findings = scanner.scan(&server.uri(), options).await.expect("Scan failed");

    assert_eq!(findings.len(), 3);

    let page = &findings[0];
    assert_eq!(page.link, link(&server, "/"));
    assert_eq!(page.source_type, SourceType::Rendered);
    assert_eq!(page.status_code, Some(200));
    assert!(!page.broken);

    let logo = find(&findings, &link(&server, "/logo.png"));
    assert_eq!(logo.source_type, SourceType::Rendered);
    assert_eq!(logo.status_code, Some(404));
    assert_eq!(logo.time_taken_ms, 0);

    let about = find(&findings, &link(&server, "/about"));
    assert_eq!(about.source_type, SourceType::Primary);

    let requests = renderer.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .extra_headers
        .contains(&("X-API-Key".to_string(), "k-123".to_string())));
}

#[tokio::test]
async fn test_unavailable_renderer_keeps_primary_finding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner
        .scan(&server.uri(), ScanOptions::default())
        .await
        .expect("Scan failed");

    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].status_code, Some(429));
    assert_eq!(findings[0].source_type, SourceType::Primary);
    assert_eq!(findings[0].reason, Some(Reason::Http(429)));
}

#[tokio::test]
async fn test_cooperation_is_sent_on_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .and(header("x-api-key", "secret"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-api-key", "secret"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(html(r#"<img src="/a.png">"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/a.png"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let options = ScanOptions {
        cooperation: Cooperation {
            whitelist_ip: false,
            site_credentials: Some(SiteCredentials {
                user: "user".to_string(),
                pass: "pass".to_string(),
            }),
            api_key: Some("secret".to_string()),
        },
        ..Default::default()
    };
    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let findings = scanner.scan(&server.uri(), options).await.expect("Scan failed");

    assert_eq!(findings.len(), 2);
    assert!(findings.iter().all(|f| !f.broken));
}

#[tokio::test]
async fn test_invalid_url_fails_without_network() {
    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));

    for raw in ["not a url", "ftp://example.com/file", "mailto:someone@example.com", ""] {
        let err = scanner
            .scan(raw, ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidUrl { .. }), "{raw}");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.reason(), Some("invalid-url"));
    }
}

#[tokio::test]
async fn test_cancellation_returns_partial_findings() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/slow">Slow</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("late").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = scanner
        .scan_with_cancel(&server.uri(), ScanOptions::default(), cancel)
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(err.reason(), Some("cancelled"));
    let partial = err.partial_findings().expect("Missing partial findings");
    assert_eq!(partial.len(), 1);
    assert_eq!(partial[0].link, link(&server, "/"));
}

/// Renderer whose session outlives the cancellation of the scan using it
struct LingeringRenderer {
    released: AtomicBool,
}

#[async_trait]
impl PageRenderer for LingeringRenderer {
    async fn render(&self, _request: RenderRequest) -> Result<RenderedPage, RenderError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.released.store(true, Ordering::SeqCst);
        Err(RenderError::Timeout {
            url: "unused".to_string(),
        })
    }
}

#[tokio::test]
async fn test_cancelled_fallback_still_releases_browser_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let renderer = Arc::new(LingeringRenderer {
        released: AtomicBool::new(false),
    });
    let scanner = create_scanner(create_test_config(), renderer.clone());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = scanner
        .scan_with_cancel(&server.uri(), ScanOptions::default(), cancel)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("cancelled"));
    assert!(!renderer.released.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(renderer.released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_robots_cache_is_shared_between_scans() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<p>home</p>").await;

    let scanner = create_scanner(create_test_config(), Arc::new(DisabledRenderer));
    let uri = server.uri();
    let (first, second) = tokio::join!(
        scanner.scan(&uri, ScanOptions::default()),
        async {
            // Let the first scan populate the cache
            tokio::time::sleep(Duration::from_millis(200)).await;
            scanner.scan(&uri, ScanOptions::default()).await
        }
    );

    assert_eq!(first.expect("First scan failed").len(), 1);
    assert_eq!(second.expect("Second scan failed").len(), 1);
    assert_eq!(scanner.robots().len(), 1);
}
