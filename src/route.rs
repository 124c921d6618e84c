//! Route keys and link classification
//!
//! A [`RouteKey`] identifies a navigable location: path plus query, never the
//! fragment. It is the lookup key for scroll records. Prefetch entries are keyed
//! by [`document_key`], the full URL without its fragment.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Attribute that opts an anchor out of client-side interception.
pub const OPT_OUT_ATTRIBUTE: &str = "data-waypoint-native";

/// Normalised identifier of a navigable location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    /// Build a route key from an absolute URL.
    ///
    /// The empty path becomes `/`, a trailing slash on any other path is removed,
    /// an empty query is dropped and the fragment is ignored.
    pub fn from_url(url: &Url) -> Self {
        let path = url.path().trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };

        match url.query() {
            Some(query) if !query.is_empty() => Self(format!("{path}?{query}")),
            _ => Self(path.to_string()),
        }
    }

    /// Normalise a path-and-query string such as `/docs/?page=2#intro`.
    pub fn parse(raw: &str) -> Self {
        match Url::parse("http://route.invalid/").and_then(|base| base.join(raw.trim())) {
            Ok(url) => Self::from_url(&url),
            Err(_) => Self(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Url> for RouteKey {
    fn from(url: &Url) -> Self {
        Self::from_url(url)
    }
}

/// Cache key for a fetched document: the URL with its fragment removed.
pub fn document_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// A click on an anchor element, as seen by the platform event source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    /// Raw `href` attribute, possibly relative
    pub href: String,
    /// Mouse button (0 = primary)
    pub button: i16,
    pub modifiers: Modifiers,
    /// `target` attribute of the anchor
    pub target: Option<String>,
    /// Whether the anchor carries a `download` attribute
    pub download: bool,
    /// Whether the anchor carries [`OPT_OUT_ATTRIBUTE`]
    pub opted_out: bool,
}

impl LinkClick {
    /// A plain primary-button click with no modifiers.
    pub fn primary(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    /// Builder method: set modifier keys
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Builder method: set the `target` attribute
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Builder method: mark the anchor as opted out
    pub fn opted_out(mut self) -> Self {
        self.opted_out = true;
        self
    }
}

/// What the router does with a click
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickDecision {
    /// Prevent the default action and navigate client-side to the URL
    Intercept(Url),
    /// Let the browser handle the click natively
    PassThrough(PassReason),
}

/// Why a click is left to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    NonPrimaryButton,
    ModifierKey,
    ExternalTarget,
    Download,
    OptedOut,
    Unresolvable,
    NotHttp,
    CrossOrigin,
    SamePageFragment,
}

/// Decide whether a click on a link should be intercepted.
pub fn classify_link(click: &LinkClick, current: &Url) -> ClickDecision {
    if click.button != 0 {
        return ClickDecision::PassThrough(PassReason::NonPrimaryButton);
    }
    if click.modifiers.any() {
        return ClickDecision::PassThrough(PassReason::ModifierKey);
    }
    if let Some(target) = click.target.as_deref().map(str::trim) {
        if !target.is_empty() && !target.eq_ignore_ascii_case("_self") {
            return ClickDecision::PassThrough(PassReason::ExternalTarget);
        }
    }
    if click.download {
        return ClickDecision::PassThrough(PassReason::Download);
    }
    if click.opted_out {
        return ClickDecision::PassThrough(PassReason::OptedOut);
    }

    let url = match current.join(click.href.trim()) {
        Ok(url) => url,
        Err(_) => return ClickDecision::PassThrough(PassReason::Unresolvable),
    };
    if !is_http(&url) {
        return ClickDecision::PassThrough(PassReason::NotHttp);
    }
    if url.origin() != current.origin() {
        return ClickDecision::PassThrough(PassReason::CrossOrigin);
    }
    if url.fragment().is_some() && document_key(&url) == document_key(current) {
        return ClickDecision::PassThrough(PassReason::SamePageFragment);
    }

    ClickDecision::Intercept(url)
}

/// Resolve an `href` against the current location, keeping only same-origin
/// `http(s)` targets.
pub fn resolve_internal(href: &str, current: &Url) -> Option<Url> {
    let url = current.join(href.trim()).ok()?;
    (is_http(&url) && url.origin() == current.origin()).then_some(url)
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Url {
        Url::parse("https://app.test/courses/rust?tab=intro").unwrap()
    }

    #[test]
    fn test_route_key_normalisation() {
        let url = Url::parse("https://app.test/a/?x=1#section").unwrap();
        assert_eq!(RouteKey::from_url(&url).as_str(), "/a?x=1");

        let root = Url::parse("https://app.test").unwrap();
        assert_eq!(RouteKey::from_url(&root).as_str(), "/");

        let empty_query = Url::parse("https://app.test/b?").unwrap();
        assert_eq!(RouteKey::from_url(&empty_query).as_str(), "/b");
    }

    #[test]
    fn test_route_key_parse_matches_url_form() {
        assert_eq!(RouteKey::parse("/docs/?page=2#intro").as_str(), "/docs?page=2");
        assert_eq!(RouteKey::parse("/a"), RouteKey::parse("/a/"));
        assert_ne!(RouteKey::parse("/a?x=1"), RouteKey::parse("/a?x=2"));
    }

    #[test]
    fn test_document_key_drops_fragment_only() {
        let url = Url::parse("https://app.test/a?x=1#top").unwrap();
        assert_eq!(document_key(&url), "https://app.test/a?x=1");
    }

    #[test]
    fn test_intercepts_same_origin_links() {
        let decision = classify_link(&LinkClick::primary("/courses/go"), &here());
        assert_eq!(
            decision,
            ClickDecision::Intercept(Url::parse("https://app.test/courses/go").unwrap())
        );

        let relative = classify_link(&LinkClick::primary("lessons/1"), &here());
        assert!(matches!(relative, ClickDecision::Intercept(url) if url.path() == "/courses/lessons/1"));
    }

    #[test]
    fn test_passes_through_cross_origin_and_opt_out() {
        assert_eq!(
            classify_link(&LinkClick::primary("https://other.test/"), &here()),
            ClickDecision::PassThrough(PassReason::CrossOrigin)
        );
        assert_eq!(
            classify_link(&LinkClick::primary("/pro").opted_out(), &here()),
            ClickDecision::PassThrough(PassReason::OptedOut)
        );
        assert_eq!(
            classify_link(&LinkClick::primary("mailto:team@app.test"), &here()),
            ClickDecision::PassThrough(PassReason::NotHttp)
        );
    }

    #[test]
    fn test_passes_through_modified_clicks() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        assert_eq!(
            classify_link(&LinkClick::primary("/a").with_modifiers(ctrl), &here()),
            ClickDecision::PassThrough(PassReason::ModifierKey)
        );
        assert_eq!(
            classify_link(&LinkClick::primary("/a").with_target("_blank"), &here()),
            ClickDecision::PassThrough(PassReason::ExternalTarget)
        );
        assert!(matches!(
            classify_link(&LinkClick::primary("/a").with_target("_self"), &here()),
            ClickDecision::Intercept(_)
        ));

        let middle = LinkClick {
            button: 1,
            ..LinkClick::primary("/a")
        };
        assert_eq!(
            classify_link(&middle, &here()),
            ClickDecision::PassThrough(PassReason::NonPrimaryButton)
        );
    }

    #[test]
    fn test_same_page_fragment_is_native() {
        assert_eq!(
            classify_link(&LinkClick::primary("#faq"), &here()),
            ClickDecision::PassThrough(PassReason::SamePageFragment)
        );
        assert!(matches!(
            classify_link(&LinkClick::primary("/other#faq"), &here()),
            ClickDecision::Intercept(_)
        ));
    }

    #[test]
    fn test_resolve_internal() {
        assert!(resolve_internal("/x", &here()).is_some());
        assert!(resolve_internal("https://other.test/x", &here()).is_none());
        assert!(resolve_internal("javascript:void(0)", &here()).is_none());
    }
}
