//! Robots.txt directive matching
//!
//! Matching is delegated to the robotstxt crate, which implements Google's
//! reference rules (longest match wins, `Allow` wins ties).

use robotstxt::DefaultMatcher;

/// Parsed robots.txt directives for one origin
///
/// Either the raw directive text or a permissive sentinel used when
/// robots.txt could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,

    /// Sentinel flag: everything is allowed
    allow_all: bool,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Permissive sentinel cached when robots.txt is unreachable or invalid
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Checks whether `url` may be fetched by the crawler identified by `product_token`
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL (or path) to check
    /// * `product_token` - Crawler name matched against `User-agent` lines
    pub fn is_allowed(&self, url: &str, product_token: &str) -> bool {
        if self.allow_all || self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, product_token, url)
    }
}
