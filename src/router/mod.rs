//! Client-side navigation router
//!
//! Intercepts in-app link clicks, keeps session history in step, prefetches
//! linked documents and swaps fetched content into the page without a full
//! reload. Every navigation is bracketed by `Start`/`End` events on the
//! router's [`EventBus`].
//!
//! - **error**: Error types
//! - **events**: Navigation events and the event bus
//! - **prefetch**: Prefetch cache

pub mod error;
pub mod events;
pub mod prefetch;

pub use error::{FetchResult, NavigationError};
pub use events::{EventBus, NavigationEvent, NavigationPhase, NavigationTrigger, SubscriptionId};
pub use prefetch::{PrefetchCache, PrefetchEntry, PrefetchState, Prefetched};

use crate::platform::{
    Clock, DocumentFetcher, EventSource, ListenerHandle, Page, Sleeper, NAVIGATION_END_EVENT,
};
use crate::route::{classify_link, document_key, resolve_internal, ClickDecision, LinkClick, RouteKey};
use futures_util::future::{self, Either, LocalBoxFuture};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Delay between pointer entering a link and its prefetch starting
pub const HOVER_DEBOUNCE: Duration = Duration::from_millis(100);

/// Deadline for the document fetch of the active navigation
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on prefetch requests in flight at once
pub const MAX_CONCURRENT_PREFETCHES: usize = 4;

/// How long an unused prefetched document is kept
pub const PREFETCH_RETENTION: Duration = Duration::from_secs(30);

/// When linked documents are fetched ahead of a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchMode {
    /// After the pointer rests on a link
    #[default]
    Hover,
    /// When a link scrolls into the viewport
    Visible,
    /// Never
    None,
}

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RouterConfig {
    #[serde(default, alias = "prefetchMode")]
    pub prefetch_mode: PrefetchMode,

    /// Log navigation lifecycle at `info` instead of `debug`
    #[serde(default)]
    pub logging: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            prefetch_mode: PrefetchMode::Hover,
            logging: false,
        }
    }
}

/// How a navigation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Content was swapped in and `End` emitted
    Completed,
    /// A newer navigation started before this one finished; its result was dropped
    Superseded,
    /// The fetch failed and the browser was asked to load the URL natively
    FellBack(NavigationError),
    /// Only the fragment changed; nothing to fetch
    Unchanged,
}

macro_rules! lifecycle_log {
    ($router:expr, $($arg:tt)+) => {
        if $router.config.logging {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// The navigation router
pub struct Router {
    config: RouterConfig,
    page: Rc<dyn Page>,
    fetcher: Rc<dyn DocumentFetcher>,
    sleeper: Rc<dyn Sleeper>,
    clock: Rc<dyn Clock>,
    events: EventBus,
    cache: RefCell<PrefetchCache>,
    prefetch_permits: Semaphore,
    generation: Cell<u64>,
    displayed: RefCell<Url>,
    hovers: RefCell<HashMap<String, u64>>,
    next_hover: Cell<u64>,
    listeners: RefCell<Option<Box<dyn ListenerHandle>>>,
}

impl Router {
    /// Create a router for the page's current document
    pub fn new(
        config: RouterConfig,
        page: Rc<dyn Page>,
        fetcher: Rc<dyn DocumentFetcher>,
        sleeper: Rc<dyn Sleeper>,
        clock: Rc<dyn Clock>,
    ) -> Rc<Self> {
        let displayed = page.location();

        Rc::new(Self {
            config,
            page,
            fetcher,
            sleeper,
            clock,
            events: EventBus::default(),
            cache: RefCell::new(PrefetchCache::new()),
            prefetch_permits: Semaphore::new(MAX_CONCURRENT_PREFETCHES),
            generation: Cell::new(0),
            displayed: RefCell::new(displayed),
            hovers: RefCell::new(HashMap::new()),
            next_hover: Cell::new(0),
            listeners: RefCell::new(None),
        })
    }

    /// Attach DOM listeners through `source`. Returns `false` if the router
    /// was already initialized, in which case nothing is attached.
    pub fn initialize(self: &Rc<Self>, source: &dyn EventSource) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        if listeners.is_some() {
            tracing::debug!("Router already initialized");
            return false;
        }

        *listeners = Some(source.attach(Rc::downgrade(self)));
        lifecycle_log!(self, route = %self.current_route(), prefetch = ?self.config.prefetch_mode, "Router initialized");
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.listeners.borrow().is_some()
    }

    /// Detach DOM listeners. The router may be initialized again afterwards.
    pub fn shutdown(&self) {
        let handle = self.listeners.borrow_mut().take();
        if let Some(handle) = handle {
            handle.detach();
            tracing::debug!("Router listeners detached");
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register a synchronous navigation listener
    pub fn subscribe(&self, listener: impl Fn(&NavigationEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Route of the document currently displayed
    pub fn current_route(&self) -> RouteKey {
        RouteKey::from_url(&self.displayed.borrow())
    }

    /// Decide whether a link click is handled client-side.
    pub fn classify_click(&self, click: &LinkClick) -> ClickDecision {
        classify_link(click, &self.page.location())
    }

    /// Navigate to `url` client-side.
    ///
    /// Emits `Start`, pushes a history entry unless the browser already moved
    /// (`History`), fetches the document (bounded by [`NAVIGATION_TIMEOUT`]),
    /// swaps it in and emits `End`. If a newer navigation starts meanwhile this
    /// one is abandoned. On failure the browser loads `url` natively.
    ///
    /// While the fetch runs it is registered as the pending prefetch of `url`,
    /// so a prefetch of the same document joins it instead of fetching again.
    pub async fn navigate(&self, url: Url, trigger: NavigationTrigger) -> NavigationOutcome {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let key = document_key(&url);
        self.hovers.borrow_mut().remove(&key);

        let start = NavigationEvent::start(Some(self.current_route()), RouteKey::from_url(&url), trigger);
        lifecycle_log!(self, from = ?start.from, to = %start.to, ?trigger, "Navigation started");
        self.events.emit(&start);

        if trigger != NavigationTrigger::History {
            self.page.push_history(&url);
        }

        let (fetch, registered) = self.document_for(&url, &key);
        let deadline = self.sleeper.sleep(NAVIGATION_TIMEOUT);
        let result = match future::select(fetch, deadline).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => Err(NavigationError::Timeout(NAVIGATION_TIMEOUT)),
        };
        if let Some(id) = registered {
            self.cache.borrow_mut().discard(&key, id);
        }

        if self.generation.get() != generation {
            tracing::debug!(to = %start.to, "Navigation superseded");
            return NavigationOutcome::Superseded;
        }

        match result {
            Ok(document) => {
                let url = match redirected(&url, &document.url) {
                    Some(target) => {
                        tracing::debug!(from = %url, to = %target, "Navigation was redirected");
                        self.page.replace_history(&target);
                        target
                    }
                    None => url,
                };

                self.page.swap_document(&document);
                *self.displayed.borrow_mut() = url;

                lifecycle_log!(self, to = %start.to, title = ?document.title, "Navigation finished");
                self.events.emit(&start.end());
                self.page.dispatch_lifecycle(NAVIGATION_END_EVENT);

                let evicted = self
                    .cache
                    .borrow_mut()
                    .evict_stale(self.clock.now(), PREFETCH_RETENTION);
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted stale prefetches");
                }
                NavigationOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(to = %start.to, "Navigation failed, loading natively: {}", e);
                self.page.navigate_native(&url);
                NavigationOutcome::FellBack(e)
            }
        }
    }

    /// Handle a back/forward change of the page location.
    pub async fn on_history_change(&self) -> NavigationOutcome {
        let location = self.page.location();
        if document_key(&location) == document_key(&self.displayed.borrow()) {
            *self.displayed.borrow_mut() = location;
            return NavigationOutcome::Unchanged;
        }

        self.navigate(location, NavigationTrigger::History).await
    }

    /// Navigate programmatically to `href`, resolved against the current
    /// location. Targets on another origin are loaded natively.
    pub async fn go(&self, href: &str) -> NavigationOutcome {
        let location = self.page.location();
        match resolve_internal(href, &location) {
            Some(url) => self.navigate(url, NavigationTrigger::Programmatic).await,
            None => match location.join(href) {
                Ok(url) => {
                    tracing::debug!(url = %url, "External target, loading natively");
                    self.page.navigate_native(&url);
                    NavigationOutcome::FellBack(NavigationError::Network(
                        "target is not on this origin".to_string(),
                    ))
                }
                Err(e) => NavigationOutcome::FellBack(NavigationError::Decode(e.to_string())),
            },
        }
    }

    /// Step back in session history. The host reports the resulting location
    /// change through [`Router::on_history_change`].
    pub fn back(&self) {
        self.page.history_go(-1);
    }

    /// Step forward in session history.
    pub fn forward(&self) {
        self.page.history_go(1);
    }

    /// Pointer entered a link. Under [`PrefetchMode::Hover`] the link is
    /// prefetched once the pointer has rested for [`HOVER_DEBOUNCE`].
    pub async fn hover(&self, href: &str) {
        if self.config.prefetch_mode != PrefetchMode::Hover {
            return;
        }
        let Some(url) = resolve_internal(href, &self.page.location()) else {
            return;
        };

        let key = document_key(&url);
        let token = self.next_hover.get();
        self.next_hover.set(token + 1);
        self.hovers.borrow_mut().insert(key.clone(), token);

        self.sleeper.sleep(HOVER_DEBOUNCE).await;

        {
            let mut hovers = self.hovers.borrow_mut();
            if hovers.get(&key) != Some(&token) {
                return;
            }
            hovers.remove(&key);
        }

        self.prefetch(url).await;
    }

    /// Pointer left a link before its debounce elapsed.
    pub fn unhover(&self, href: &str) {
        if let Some(url) = resolve_internal(href, &self.page.location()) {
            self.hovers.borrow_mut().remove(&document_key(&url));
        }
    }

    /// A link scrolled into view. Prefetched under [`PrefetchMode::Visible`].
    pub async fn link_visible(&self, href: &str) {
        if self.config.prefetch_mode != PrefetchMode::Visible {
            return;
        }
        if let Some(url) = resolve_internal(href, &self.page.location()) {
            self.prefetch(url).await;
        }
    }

    /// Fetch `url` into the prefetch cache.
    ///
    /// At most one fetch per URL is in flight and at most
    /// [`MAX_CONCURRENT_PREFETCHES`] prefetches overall. A prefetch waiting for
    /// a slot is not cached yet, so navigations never queue behind the limit.
    /// Returns the state the entry ended in, `Pending` if another prefetch or
    /// the navigation to the same URL is still running, or `None` for URLs that
    /// are never prefetched.
    pub async fn prefetch(&self, url: Url) -> Option<PrefetchState> {
        if url.origin() != self.page.location().origin() {
            return None;
        }

        let key = document_key(&url);
        if let Some(state) = self.prefetch_skip(&key) {
            return state;
        }

        let Ok(_permit) = self.prefetch_permits.acquire().await else {
            return None;
        };
        // The document may have been fetched or displayed while waiting.
        if let Some(state) = self.prefetch_skip(&key) {
            return state;
        }

        let fetcher = Rc::clone(&self.fetcher);
        let target = url.clone();
        let fetch: LocalBoxFuture<'static, FetchResult<Prefetched>> =
            async move { fetcher.fetch(&target).await.map(Rc::new) }.boxed_local();
        let shared = fetch.shared();

        let id = self
            .cache
            .borrow_mut()
            .insert_pending(key.clone(), url, self.clock.now(), shared.clone());
        tracing::debug!(url = %key, "Prefetch started");

        match shared.await {
            Ok(document) => {
                self.cache
                    .borrow_mut()
                    .mark_ready(&key, id, document, self.clock.now());
                Some(PrefetchState::Ready)
            }
            Err(e) => {
                tracing::debug!(url = %key, "Prefetch failed: {}", e);
                self.cache.borrow_mut().discard(&key, id);
                Some(PrefetchState::Failed)
            }
        }
    }

    /// State of the prefetch entry for `url`, if any
    pub fn prefetch_state(&self, url: &Url) -> Option<PrefetchState> {
        self.cache.borrow().state(&document_key(url))
    }

    pub fn prefetched_count(&self) -> usize {
        self.cache.borrow().len()
    }

    /// `Some(result)` when `prefetch` has nothing to do for `key`
    fn prefetch_skip(&self, key: &str) -> Option<Option<PrefetchState>> {
        if let Some(state) = self.cache.borrow().state(key) {
            return Some(Some(state));
        }
        if document_key(&self.displayed.borrow()) == key {
            return Some(None);
        }
        None
    }

    /// The document for a navigation: a consumed prefetch entry, or a new
    /// fetch registered as pending under `key` with the returned entry id.
    fn document_for(
        &self,
        url: &Url,
        key: &str,
    ) -> (LocalBoxFuture<'static, FetchResult<Prefetched>>, Option<u64>) {
        if let Some(entry) = self.cache.borrow_mut().take(key) {
            tracing::debug!(url = %url, state = ?entry.state, "Using prefetched document");
            return (entry.future().boxed_local(), None);
        }

        let fetcher = Rc::clone(&self.fetcher);
        let target = url.clone();
        let fetch: LocalBoxFuture<'static, FetchResult<Prefetched>> =
            async move { fetcher.fetch(&target).await.map(Rc::new) }.boxed_local();
        let shared = fetch.shared();

        let id = self.cache.borrow_mut().insert_pending(
            key.to_string(),
            url.clone(),
            self.clock.now(),
            shared.clone(),
        );
        (shared.boxed_local(), Some(id))
    }
}

/// The final URL of a redirected fetch, keeping the requested fragment
fn redirected(requested: &Url, fetched: &Url) -> Option<Url> {
    if document_key(requested) == document_key(fetched) {
        return None;
    }
    let mut target = fetched.clone();
    if target.fragment().is_none() {
        target.set_fragment(requested.fragment());
    }
    Some(target)
}

impl Drop for Router {
    fn drop(&mut self) {
        if let Some(handle) = self.listeners.get_mut().take() {
            handle.detach();
        }
    }
}
