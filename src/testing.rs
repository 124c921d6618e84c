//! Scripted platform doubles shared by unit tests

use crate::document::FetchedDocument;
use crate::lifecycle::{PageView, PageViewReporter};
use crate::platform::{Clock, DocumentFetcher, EventSource, ListenerHandle};
use crate::route::document_key;
use crate::router::{NavigationError, Router};
use crate::signin::{IdentityError, IdentityProvider, Session, SignInLinkRequest};
use crate::storage::{KeyValueStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;
use url::Url;

pub const ORIGIN: &str = "https://app.test/";

/// Absolute URL on the test origin
pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN)
        .and_then(|base| base.join(path))
        .unwrap()
}

struct Response {
    result: Result<String, NavigationError>,
    delay: Duration,
    redirect_to: Option<String>,
}

/// Fetcher answering from a per-URL script, with optional delays
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: RefCell<HashMap<String, Response>>,
    calls: RefCell<Vec<Url>>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, path: &str, title: &str) -> Self {
        self.page_after(path, title, Duration::ZERO)
    }

    pub fn page_after(self, path: &str, title: &str, delay: Duration) -> Self {
        let html = format!("<html><head><title>{title}</title></head><body>{title} body</body></html>");
        self.respond(path, Ok(html), delay)
    }

    pub fn failing(self, path: &str, error: NavigationError) -> Self {
        self.respond(path, Err(error), Duration::ZERO)
    }

    /// `path` answers with the page titled `title` served from `target`
    pub fn redirect(self, path: &str, target: &str, title: &str) -> Self {
        let fetcher = self.page(path, title);
        if let Some(response) = fetcher.responses.borrow_mut().get_mut(&document_key(&url(path))) {
            response.redirect_to = Some(target.to_string());
        }
        fetcher
    }

    fn respond(self, path: &str, result: Result<String, NavigationError>, delay: Duration) -> Self {
        self.responses.borrow_mut().insert(
            document_key(&url(path)),
            Response {
                result,
                delay,
                redirect_to: None,
            },
        );
        self
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let key = document_key(&url(path));
        self.calls
            .borrow()
            .iter()
            .filter(|u| document_key(u) == key)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }
}

#[async_trait(?Send)]
impl DocumentFetcher for ScriptedFetcher {
    async fn fetch(&self, target: &Url) -> Result<FetchedDocument, NavigationError> {
        self.calls.borrow_mut().push(target.clone());
        self.in_flight.set(self.in_flight.get() + 1);
        self.max_in_flight
            .set(self.max_in_flight.get().max(self.in_flight.get()));

        let (result, delay, served_from) = match self.responses.borrow().get(&document_key(target)) {
            Some(response) => (
                response.result.clone(),
                response.delay,
                response.redirect_to.as_deref().map(url),
            ),
            None => (Err(NavigationError::Status(404)), Duration::ZERO, None),
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.set(self.in_flight.get() - 1);

        let served_from = served_from.unwrap_or_else(|| target.clone());
        result.map(|html| FetchedDocument::from_html(served_from, &html))
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap();
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Store whose every operation fails
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> StorageResult<Option<String>> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }

    fn remove(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Unavailable("storage disabled".into()))
    }
}

/// Event source that records attach/detach calls
#[derive(Default)]
pub struct FakeEventSource {
    attached: Rc<Cell<usize>>,
    detached: Rc<Cell<usize>>,
    router: RefCell<Option<Weak<Router>>>,
}

impl FakeEventSource {
    pub fn attached(&self) -> usize {
        self.attached.get()
    }

    pub fn detached(&self) -> usize {
        self.detached.get()
    }

    /// The router handed to the last `attach`, if still alive
    pub fn router(&self) -> Option<Rc<Router>> {
        self.router.borrow().as_ref().and_then(Weak::upgrade)
    }
}

struct FakeHandle {
    detached: Rc<Cell<usize>>,
}

impl ListenerHandle for FakeHandle {
    fn detach(self: Box<Self>) {
        self.detached.set(self.detached.get() + 1);
    }
}

impl EventSource for FakeEventSource {
    fn attach(&self, router: Weak<Router>) -> Box<dyn ListenerHandle> {
        self.attached.set(self.attached.get() + 1);
        *self.router.borrow_mut() = Some(router);
        Box::new(FakeHandle {
            detached: Rc::clone(&self.detached),
        })
    }
}

/// Identity provider with a fixed set of valid codes
#[derive(Default)]
pub struct ScriptedIdentity {
    valid_codes: RefCell<Vec<String>>,
    unreachable: Cell<bool>,
    completions: RefCell<Vec<(String, String)>>,
    sent: RefCell<Vec<SignInLinkRequest>>,
}

impl ScriptedIdentity {
    pub fn accepting(code: &str) -> Self {
        let identity = Self::default();
        identity.valid_codes.borrow_mut().push(code.to_string());
        identity
    }

    pub fn unreachable() -> Self {
        let identity = Self::default();
        identity.unreachable.set(true);
        identity
    }

    /// `(email, code)` pairs passed to `complete_sign_in`
    pub fn completions(&self) -> Vec<(String, String)> {
        self.completions.borrow().clone()
    }

    pub fn sent(&self) -> Vec<SignInLinkRequest> {
        self.sent.borrow().clone()
    }
}

#[async_trait(?Send)]
impl IdentityProvider for ScriptedIdentity {
    async fn send_sign_in_link(&self, request: &SignInLinkRequest) -> Result<(), IdentityError> {
        if self.unreachable.get() {
            return Err(IdentityError::Network("connection refused".into()));
        }
        self.sent.borrow_mut().push(request.clone());
        Ok(())
    }

    async fn complete_sign_in(&self, email: &str, code: &str) -> Result<Session, IdentityError> {
        self.completions
            .borrow_mut()
            .push((email.to_string(), code.to_string()));

        if self.unreachable.get() {
            return Err(IdentityError::Network("connection refused".into()));
        }
        if !self.valid_codes.borrow().iter().any(|c| c == code) {
            return Err(IdentityError::Rejected("INVALID_OOB_CODE".into()));
        }

        Ok(Session {
            user_id: format!("uid-{code}"),
            email: email.to_string(),
            id_token: format!("id-{code}"),
            refresh_token: format!("refresh-{code}"),
            is_new_user: false,
        })
    }
}

/// Reporter that keeps every page view
#[derive(Default)]
pub struct RecordedPageViews {
    views: RefCell<Vec<PageView>>,
}

impl RecordedPageViews {
    pub fn views(&self) -> Vec<PageView> {
        self.views.borrow().clone()
    }
}

impl PageViewReporter for RecordedPageViews {
    fn report(&self, view: &PageView) {
        self.views.borrow_mut().push(view.clone());
    }
}
