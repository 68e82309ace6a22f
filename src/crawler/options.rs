//! Caller-supplied options for one scan

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

/// Header carrying the site owner's API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Credentials for sites behind HTTP authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCredentials {
    pub user: String,
    pub pass: String,
}

/// Cooperation bundle a site owner can provide to ease scanning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cooperation {
    /// The scanner's address is allow-listed; doubles the finding budget
    #[serde(rename = "whitelistIP", default)]
    pub whitelist_ip: bool,

    #[serde(default)]
    pub site_credentials: Option<SiteCredentials>,

    #[serde(default)]
    pub api_key: Option<String>,
}

impl Cooperation {
    /// Drops blank API keys and trims the rest
    pub fn sanitized(mut self) -> Self {
        self.api_key = self
            .api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }

    /// Extra headers sent with every request of the scan
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        self.api_key
            .iter()
            .map(|key| (API_KEY_HEADER, key.clone()))
            .collect()
    }

    /// Applies credentials and headers to a lightweight request
    pub fn apply(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in self.headers() {
            request = request.header(name, value);
        }
        if let Some(credentials) = &self.site_credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.pass));
        }
        request
    }
}

/// Options for one scan invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOptions {
    #[serde(default)]
    pub cooperation: Cooperation,

    /// Permits escalating to a rendered browser fetch
    #[serde(default = "default_allow_browser_fallback")]
    pub allow_browser_fallback: bool,
}

fn default_allow_browser_fallback() -> bool {
    true
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            cooperation: Cooperation::default(),
            allow_browser_fallback: true,
        }
    }
}

impl ScanOptions {
    /// Finding budget for this scan given the configured base budget
    pub fn budget(&self, base: usize) -> usize {
        if self.cooperation.whitelist_ip {
            base.saturating_mul(2)
        } else {
            base
        }
    }
}
