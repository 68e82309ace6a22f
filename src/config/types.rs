use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the scanner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Crawl budget, pacing and retry behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Maximum number of findings per scan (doubled for allow-listed callers)
    #[serde(rename = "max-findings")]
    pub max_findings: usize,

    /// Per-request timeout for lightweight fetches (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Maximum redirect hops followed by a lightweight fetch
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Minimum time between request starts to the same hostname (milliseconds)
    #[serde(rename = "rate-limit-interval-ms")]
    pub rate_limit_interval_ms: u64,

    /// Additional attempts after a transient failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff (milliseconds)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Lifetime of a cached robots.txt policy; 0 keeps it for the process lifetime
    #[serde(rename = "robots-ttl-secs")]
    pub robots_ttl_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_findings: 100,
            request_timeout_ms: 15_000,
            max_redirects: 5,
            rate_limit_interval_ms: 500,
            max_retries: 2,
            backoff_base_ms: 500,
            robots_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl ScannerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn robots_ttl(&self) -> Option<Duration> {
        (self.robots_ttl_secs > 0).then(|| Duration::from_secs(self.robots_ttl_secs))
    }
}

/// Declared identities for lightweight and rendered requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Product token, also used when evaluating robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Replaces the formatted crawler identity when set
    #[serde(rename = "user-agent-override")]
    pub user_agent_override: Option<String>,

    /// Browser-like identity used by rendered fetches
    #[serde(rename = "browser-user-agent")]
    pub browser_user_agent: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "BrokenLinkAI".to_string(),
            crawler_version: "0.1".to_string(),
            contact_url: "https://brokenlink.ai".to_string(),
            user_agent_override: None,
            browser_user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                 (KHTML, like Gecko) Chrome/126.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Full identity string sent on every lightweight request
    ///
    /// Format: `CrawlerName/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.user_agent_override {
            Some(agent) => agent.clone(),
            None => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.contact_url
            ),
        }
    }

    /// Product token matched against robots.txt `User-agent` lines
    ///
    /// Taken from the identity actually sent: the leading token of the
    /// override when one is set, the crawler name otherwise.
    pub fn robots_token(&self) -> &str {
        self.user_agent_override
            .as_deref()
            .and_then(|agent| agent.split(|c: char| c == '/' || c.is_whitespace()).next())
            .filter(|token| !token.is_empty())
            .unwrap_or(&self.crawler_name)
    }
}

/// Rendered fallback settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Navigation timeout (milliseconds)
    #[serde(rename = "navigation-timeout-ms")]
    pub navigation_timeout_ms: u64,

    /// Upper bound on the network-quiescence wait (milliseconds)
    #[serde(rename = "idle-timeout-ms")]
    pub idle_timeout_ms: u64,

    /// Primary statuses that escalate to a rendered fetch
    #[serde(rename = "fallback-statuses")]
    pub fallback_statuses: Vec<u16>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            navigation_timeout_ms: 10_000,
            idle_timeout_ms: 10_000,
            fallback_statuses: vec![401, 403, 429],
        }
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robots_token_defaults_to_crawler_name() {
        let agent = UserAgentConfig::default();
        assert_eq!(agent.robots_token(), "BrokenLinkAI");
        assert_eq!(
            agent.header_value(),
            "BrokenLinkAI/0.1 (+https://brokenlink.ai)"
        );
    }

    #[test]
    fn test_robots_token_follows_override() {
        let mut agent = UserAgentConfig::default();
        agent.user_agent_override = Some("AcmeAudit/2.0 (+https://acme.test)".to_string());
        assert_eq!(agent.robots_token(), "AcmeAudit");

        agent.user_agent_override = Some("AcmeAudit".to_string());
        assert_eq!(agent.robots_token(), "AcmeAudit");

        agent.user_agent_override = Some("Acme Audit".to_string());
        assert_eq!(agent.robots_token(), "Acme");
    }

    #[test]
    fn test_blank_override_falls_back_to_crawler_name() {
        let mut agent = UserAgentConfig::default();
        agent.user_agent_override = Some("/2.0".to_string());
        assert_eq!(agent.robots_token(), "BrokenLinkAI");
    }
}
