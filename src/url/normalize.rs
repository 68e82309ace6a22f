use url::Url;

/// Normalizes a raw reference into a canonical absolute URL
///
/// # Normalization Steps
///
/// 1. Resolve `raw` against `base`, or parse it as absolute when no base is given
/// 2. Reject any scheme other than http/https
/// 3. Remove fragment (everything after #)
///
/// Host lowercasing, default-port elision and dot-segment removal come from
/// WHATWG parsing. Query strings are preserved untouched.
///
/// # Arguments
///
/// * `raw` - The reference as written (absolute or relative)
/// * `base` - The URL of the document the reference appeared in
///
/// # Returns
///
/// * `Some(Url)` - Canonical URL
/// * `None` - Unparsable or non-HTTP(S) reference; callers skip it
///
/// # Examples
///
/// ```
/// use brokenlink_scanner::url::normalize;
///
/// let url = normalize("HTTP://Example.COM/a/../b?x=1#top", None).unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b?x=1");
///
/// assert!(normalize("mailto:someone@example.com", None).is_none());
/// ```
pub fn normalize(raw: &str, base: Option<&Url>) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() && base.is_none() {
        return None;
    }

    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}
