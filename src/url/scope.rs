use url::{Origin, Url};

/// Returns true if `url` shares the crawl's start origin (scheme, host and port)
///
/// # Examples
///
/// ```
/// use url::Url;
/// use brokenlink_scanner::url::in_scope;
///
/// let start = Url::parse("https://example.com/").unwrap();
/// let page = Url::parse("https://example.com/about").unwrap();
/// let other = Url::parse("https://blog.example.com/").unwrap();
///
/// assert!(in_scope(&page, &start.origin()));
/// assert!(!in_scope(&other, &start.origin()));
/// ```
pub fn in_scope(url: &Url, origin: &Origin) -> bool {
    url.origin() == *origin
}

/// Extracts the lowercase hostname a rate limit is keyed on
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Serializes an origin as `scheme://host[:port]`
pub fn origin_string(origin: &Origin) -> String {
    origin.ascii_serialization()
}
