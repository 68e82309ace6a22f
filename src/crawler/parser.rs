//! HTML parser for extracting links and assets
//!
//! This module handles parsing fetched HTML to extract:
//! - Anchors to follow (from `<a href>` tags)
//! - Assets to probe (images, scripts, stylesheets, media sources)
//!
//! Every reference is normalized against the page URL and restricted to the
//! scan's origin. Malformed references are dropped silently.

use crate::url::{in_scope, normalize};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::{Origin, Url};

/// Asset selectors paired with the attribute holding the reference
const ASSET_SELECTORS: [(&str, &str); 4] = [
    ("img[src]", "src"),
    ("script[src]", "src"),
    ("link[rel~='stylesheet'][href]", "href"),
    ("source[src]", "src"),
];

/// References extracted from one HTML page, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Same-origin anchor targets, unique within the page
    pub links: Vec<Url>,

    /// Same-origin asset references, unique within the page
    pub assets: Vec<Url>,
}

/// Parses HTML content and extracts same-origin links and assets
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The canonical URL of the page, used to resolve relative references
/// * `origin` - The scan origin; references outside it are dropped
///
/// # Example
///
/// ```
/// use brokenlink_scanner::crawler::extract;
/// use url::Url;
///
/// let html = r#"<a href="/about#team">About</a><img src="logo.png">"#;
/// let page = Url::parse("https://example.com/").unwrap();
/// let extracted = extract(html, &page, &page.origin());
/// assert_eq!(extracted.links[0].as_str(), "https://example.com/about");
/// assert_eq!(extracted.assets[0].as_str(), "https://example.com/logo.png");
/// ```
pub fn extract(html: &str, page_url: &Url, origin: &Origin) -> ExtractedPage {
    let document = Html::parse_document(html);

    let links = collect(&document, &[("a[href]", "href")], page_url, origin);
    let assets = collect(&document, &ASSET_SELECTORS, page_url, origin);

    ExtractedPage { links, assets }
}

fn collect(
    document: &Html,
    selectors: &[(&str, &str)],
    page_url: &Url,
    origin: &Origin,
) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for (css, attr) in selectors {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };

        for element in document.select(&selector) {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };
            let Some(url) = normalize(value, Some(page_url)) else {
                continue;
            };
            if in_scope(&url, origin) && seen.insert(url.clone()) {
                found.push(url);
            }
        }
    }

    found
}
