//! Page-view reporting
//!
//! One page view is reported per completed navigation. Where the views go is
//! up to the host: the browser shell forwards them to `gtag`, the CLI logs them.

use crate::route::RouteKey;
use crate::router::NavigationTrigger;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

/// A page view after a completed navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub route: RouteKey,
    pub url: Url,
    pub title: Option<String>,
    pub trigger: NavigationTrigger,
    pub at: DateTime<Utc>,
}

/// Receives page views
pub trait PageViewReporter {
    fn report(&self, view: &PageView);
}

/// Reporter that writes page views to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPageViews;

impl PageViewReporter for TracingPageViews {
    fn report(&self, view: &PageView) {
        tracing::info!(
            route = %view.route,
            title = view.title.as_deref().unwrap_or(""),
            trigger = ?view.trigger,
            "Page view"
        );
    }
}
