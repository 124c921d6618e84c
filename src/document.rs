//! Fetched documents
//!
//! A navigation swaps the page's body content for the body of the fetched
//! document and adopts its title. Extraction is deliberately shallow: the
//! response is HTML text and only `<title>` and `<body>` are looked at.

use crate::router::NavigationError;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// `Accept` header sent with document fetches
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// The parts of a fetched HTML document that a navigation swaps in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// Final URL of the document (after redirects)
    pub url: Url,
    /// Text of the `<title>` element, if any
    pub title: Option<String>,
    /// Inner HTML of `<body>`, or the whole response for fragment responses
    pub body: String,
}

fn title_pattern() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"))
}

fn body_pattern() -> &'static Regex {
    static BODY: OnceLock<Regex> = OnceLock::new();
    BODY.get_or_init(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").expect("valid body pattern"))
}

impl FetchedDocument {
    /// Extract title and body from an HTML response.
    pub fn from_html(url: Url, html: &str) -> Self {
        let title = title_pattern()
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|t| !t.is_empty());

        let body = body_pattern()
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .unwrap_or(html)
            .trim()
            .to_string();

        Self { url, title, body }
    }

    /// Size of the swapped-in content in bytes
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}

/// Reject responses that are not HTML, so links to PDFs or images fall back
/// to a native load. A response without a `Content-Type` is accepted.
pub fn ensure_html(content_type: Option<&str>) -> Result<(), NavigationError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "text/html" | "application/xhtml+xml" => Ok(()),
        _ => Err(NavigationError::Decode(format!(
            "not an HTML document: {}",
            content_type
        ))),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
