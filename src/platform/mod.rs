//! Platform ports
//!
//! These traits isolate everything the navigation lifecycle needs from its host:
//! the active page (location, history, scroll offset, content swap), document
//! fetching, timers, the clock, and the source of DOM events. The browser shell
//! implements them over `web-sys`; [`HeadlessPage`] and the native adapters
//! implement them for the CLI and tests.
//!
//! Execution is single-threaded, so none of the ports require `Send`.

pub mod headless;
#[cfg(feature = "native")]
pub mod native;

pub use headless::HeadlessPage;
#[cfg(feature = "native")]
pub use native::{HttpFetcher, TokioSleeper};

use crate::document::FetchedDocument;
use crate::router::{NavigationError, Router};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::LocalBoxFuture;
use std::rc::Weak;
use std::time::Duration;
use url::Url;

/// Name of the lifecycle event dispatched on the global event target after
/// every completed navigation
pub const NAVIGATION_END_EVENT: &str = "waypoint:router:end";

/// The active document and its browsing context
pub trait Page {
    /// Current location, including query and fragment
    fn location(&self) -> Url;

    /// Current document title
    fn title(&self) -> Option<String>;

    /// Current vertical scroll offset in CSS pixels
    fn scroll_y(&self) -> f64;

    /// Scroll vertically to `y`
    fn scroll_to(&self, y: f64);

    /// Add a history entry for `url` without loading it
    fn push_history(&self, url: &Url);

    /// Replace the current history entry with `url` without loading it
    fn replace_history(&self, url: &Url);

    /// Move through session history (`-1` = back, `1` = forward)
    fn history_go(&self, delta: i32);

    /// Replace the active content with the fetched document
    fn swap_document(&self, document: &FetchedDocument);

    /// Hand the URL to the browser for a full page load
    fn navigate_native(&self, url: &Url);

    /// Dispatch a payload-less lifecycle event on the global event target
    fn dispatch_lifecycle(&self, event: &str);
}

/// Fetches documents over the network
#[async_trait(?Send)]
pub trait DocumentFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, NavigationError>;
}

/// Async timer abstraction
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Wall-clock abstraction
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of DOM events (clicks, hovers, visibility, history changes)
///
/// `attach` starts forwarding events to the router and returns a handle that
/// stops forwarding when detached. The router is passed weakly so listeners
/// never keep it alive.
pub trait EventSource {
    fn attach(&self, router: Weak<Router>) -> Box<dyn ListenerHandle>;
}

/// Registered listeners of an [`EventSource`]
pub trait ListenerHandle {
    fn detach(self: Box<Self>);
}
