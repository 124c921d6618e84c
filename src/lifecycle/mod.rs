//! Lifecycle Coordinator
//!
//! Wires the router, the scroll store and the sign-in completer together at
//! application start:
//!
//! - before each navigation the scroll offset of the page being left is saved
//! - after each navigation the offset is restored (back/forward) or reset to
//!   the top, and a page view is reported
//! - the pending sign-in, if any, is finished once
//!
//! - **analytics**: Page-view reporting

pub mod analytics;

pub use analytics::{PageView, PageViewReporter, TracingPageViews};

use crate::config::Config;
use crate::platform::{Clock, DocumentFetcher, EventSource, Page, Sleeper};
use crate::router::{NavigationTrigger, Router, SubscriptionId};
use crate::scroll::ScrollStore;
use crate::signin::{DeferredSignIn, IdentityProvider, SignInOutcome, SignInResult};
use crate::storage::KeyValueStore;
use std::cell::RefCell;
use std::rc::Rc;

/// Host services the lifecycle runs on
pub struct LifecycleDeps {
    pub page: Rc<dyn Page>,
    pub fetcher: Rc<dyn DocumentFetcher>,
    pub storage: Rc<dyn KeyValueStore>,
    pub identity: Rc<dyn IdentityProvider>,
    pub sleeper: Rc<dyn Sleeper>,
    pub clock: Rc<dyn Clock>,
    pub page_views: Rc<dyn PageViewReporter>,
}

/// The composed navigation lifecycle
pub struct Lifecycle {
    router: Rc<Router>,
    scroll: Rc<ScrollStore>,
    sign_in: Rc<DeferredSignIn>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

impl Lifecycle {
    /// Build the components and subscribe scroll handling and page-view
    /// reporting to navigation events.
    pub fn start(config: &Config, deps: LifecycleDeps) -> Self {
        let router = Router::new(
            config.router.clone(),
            Rc::clone(&deps.page),
            deps.fetcher,
            deps.sleeper,
            Rc::clone(&deps.clock),
        );
        let scroll = Rc::new(ScrollStore::new(
            config.scroll.clone(),
            Rc::clone(&deps.page),
            Rc::clone(&deps.storage),
            Rc::clone(&deps.clock),
        ));
        let sign_in = Rc::new(DeferredSignIn::new(
            config.signin.clone(),
            Rc::clone(&deps.page),
            deps.storage,
            deps.identity,
        ));

        let saver = Rc::clone(&scroll);
        let on_start = router.subscribe(move |event| {
            if !event.is_start() {
                return;
            }
            if let Some(from) = &event.from {
                saver.save(from);
            }
        });

        let restorer = Rc::clone(&scroll);
        let page = deps.page;
        let clock = deps.clock;
        let page_views = deps.page_views;
        let on_end = router.subscribe(move |event| {
            if !event.is_end() {
                return;
            }
            if event.trigger == NavigationTrigger::History {
                restorer.restore(&event.to);
            } else {
                restorer.reset();
            }

            page_views.report(&PageView {
                route: event.to.clone(),
                url: page.location(),
                title: page.title(),
                trigger: event.trigger,
                at: clock.now(),
            });
        });

        tracing::info!(
            route = %router.current_route(),
            prefetch = ?config.router.prefetch_mode,
            "Navigation lifecycle started"
        );

        Self {
            router,
            scroll,
            sign_in,
            subscriptions: RefCell::new(vec![on_start, on_end]),
        }
    }

    /// Attach the router's DOM listeners. See [`Router::initialize`].
    pub fn attach(&self, source: &dyn EventSource) -> bool {
        self.router.initialize(source)
    }

    /// Finish an email-link sign-in carried by the current URL.
    pub async fn finish_pending_sign_in(&self) -> SignInResult<SignInOutcome> {
        self.sign_in.complete().await
    }

    /// Drop the event subscriptions and detach DOM listeners.
    pub fn shutdown(&self) {
        for id in self.subscriptions.borrow_mut().drain(..) {
            self.router.unsubscribe(id);
        }
        self.router.shutdown();
        tracing::debug!("Navigation lifecycle stopped");
    }

    pub fn router(&self) -> &Rc<Router> {
        &self.router
    }

    pub fn scroll(&self) -> &Rc<ScrollStore> {
        &self.scroll
    }

    pub fn sign_in(&self) -> &Rc<DeferredSignIn> {
        &self.sign_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{HeadlessPage, TokioSleeper};
    use crate::route::{ClickDecision, LinkClick, RouteKey};
    use crate::router::NavigationOutcome;
    use crate::signin::{SignInError, SignInState};
    use crate::storage::{keys, MemoryStore};
    use crate::testing::{
        url, FakeEventSource, ManualClock, RecordedPageViews, ScriptedFetcher, ScriptedIdentity,
    };

    struct Harness {
        page: Rc<HeadlessPage>,
        storage: Rc<MemoryStore>,
        identity: Rc<ScriptedIdentity>,
        views: Rc<RecordedPageViews>,
        lifecycle: Lifecycle,
    }

    fn harness(start: &str, storage: MemoryStore, identity: ScriptedIdentity) -> Harness {
        let page = Rc::new(HeadlessPage::new(url(start)));
        let storage = Rc::new(storage);
        let identity = Rc::new(identity);
        let views = Rc::new(RecordedPageViews::default());
        let fetcher = ScriptedFetcher::new()
            .page("/", "Home")
            .page("/a", "A")
            .page("/b", "B");

        let lifecycle = Lifecycle::start(
            &Config::default(),
            LifecycleDeps {
                page: page.clone(),
                fetcher: Rc::new(fetcher),
                storage: storage.clone(),
                identity: identity.clone(),
                sleeper: Rc::new(TokioSleeper),
                clock: Rc::new(ManualClock::new()),
                page_views: views.clone(),
            },
        );

        Harness {
            page,
            storage,
            identity,
            views,
            lifecycle,
        }
    }

    async fn click(h: &Harness, href: &str) -> NavigationOutcome {
        let router = h.lifecycle.router();
        match router.classify_click(&LinkClick::primary(href)) {
            ClickDecision::Intercept(target) => router.navigate(target, NavigationTrigger::Click).await,
            other => panic!("click on {href} not intercepted: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_navigation_saves_scroll_and_starts_at_top() {
        let h = harness("/a", MemoryStore::new(), ScriptedIdentity::default());
        h.page.scroll_to(1200.0);

        assert_eq!(click(&h, "/b").await, NavigationOutcome::Completed);

        let saved = h.lifecycle.scroll().get(&RouteKey::parse("/a")).unwrap();
        assert_eq!(saved.offset_y, 1200);
        assert_eq!(h.page.scroll_y(), 0.0);

        let views = h.views.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].route, RouteKey::parse("/b"));
        assert_eq!(views[0].title.as_deref(), Some("B"));
        assert_eq!(views[0].trigger, NavigationTrigger::Click);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_navigation_restores_scroll() {
        let h = harness("/a", MemoryStore::new(), ScriptedIdentity::default());
        h.page.scroll_to(1200.0);
        click(&h, "/b").await;
        h.page.scroll_to(300.0);

        h.lifecycle.router().back();
        assert_eq!(
            h.lifecycle.router().on_history_change().await,
            NavigationOutcome::Completed
        );

        assert_eq!(h.page.location().path(), "/a");
        assert_eq!(h.page.scroll_y(), 1200.0);
        assert_eq!(
            h.lifecycle.scroll().get(&RouteKey::parse("/b")).unwrap().offset_y,
            300
        );
        assert_eq!(h.views.views().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_unsaved_route_lands_on_top() {
        let h = harness("/", MemoryStore::new(), ScriptedIdentity::default());
        h.page.scroll_to(50.0);
        click(&h, "/a").await;
        h.lifecycle.scroll().clear();
        h.page.scroll_to(400.0);

        h.lifecycle.router().back();
        h.lifecycle.router().on_history_change().await;
        assert_eq!(h.page.scroll_y(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_navigation_reports_no_page_view() {
        let h = harness("/", MemoryStore::new(), ScriptedIdentity::default());

        let outcome = click(&h, "/missing").await;
        assert!(matches!(outcome, NavigationOutcome::FellBack(_)));
        assert!(h.views.views().is_empty());
        assert_eq!(h.page.native_navigations(), vec![url("/missing")]);
    }

    #[tokio::test]
    async fn test_pending_sign_in_completes_at_startup() {
        let storage = MemoryStore::with_entries([(keys::EMAIL_FOR_SIGN_IN, "user@example.com")]);
        let h = harness("/?signInLink=TOKEN123", storage, ScriptedIdentity::accepting("TOKEN123"));

        let outcome = h.lifecycle.finish_pending_sign_in().await.unwrap();
        assert!(matches!(outcome, SignInOutcome::SignedIn(_)));
        assert_eq!(h.lifecycle.sign_in().state(), SignInState::Succeeded);
        assert!(!h.storage.contains(keys::EMAIL_FOR_SIGN_IN));
        assert_eq!(h.page.location().query(), None);

        assert_eq!(
            h.lifecycle.finish_pending_sign_in().await,
            Ok(SignInOutcome::Settled)
        );
        assert_eq!(h.identity.completions().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_without_email_is_surfaced() {
        let h = harness("/?signInLink=TOKEN123", MemoryStore::new(), ScriptedIdentity::accepting("TOKEN123"));

        assert_eq!(
            h.lifecycle.finish_pending_sign_in().await,
            Err(SignInError::EmailMissing)
        );
        assert!(h.identity.completions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_scroll_handling() {
        let h = harness("/a", MemoryStore::new(), ScriptedIdentity::default());
        let source = FakeEventSource::default();
        assert!(h.lifecycle.attach(&source));
        assert!(!h.lifecycle.attach(&source));

        h.lifecycle.shutdown();
        assert_eq!(source.detached(), 1);

        h.page.scroll_to(700.0);
        click(&h, "/b").await;
        assert!(h.lifecycle.scroll().is_empty());
        assert!(h.views.views().is_empty());
    }
}
