//! Headless page
//!
//! A [`Page`] without a browser: it keeps a session history stack, a scroll
//! offset and the last swapped-in document, and records native navigations and
//! dispatched lifecycle events so callers can inspect what a browser would have
//! done. The CLI drives the router through it.

use super::Page;
use crate::document::FetchedDocument;
use std::cell::{Cell, RefCell};
use url::Url;

/// In-process stand-in for a browser tab
#[derive(Debug)]
pub struct HeadlessPage {
    history: RefCell<Vec<Url>>,
    index: Cell<usize>,
    scroll_y: Cell<f64>,
    document: RefCell<Option<FetchedDocument>>,
    swaps: Cell<usize>,
    native: RefCell<Vec<Url>>,
    dispatched: RefCell<Vec<String>>,
}

impl HeadlessPage {
    /// Open a page at `url` with a single history entry
    pub fn new(url: Url) -> Self {
        Self {
            history: RefCell::new(vec![url]),
            index: Cell::new(0),
            scroll_y: Cell::new(0.0),
            document: RefCell::new(None),
            swaps: Cell::new(0),
            native: RefCell::new(Vec::new()),
            dispatched: RefCell::new(Vec::new()),
        }
    }

    /// Builder method: load initial content
    pub fn with_document(self, document: FetchedDocument) -> Self {
        *self.document.borrow_mut() = Some(document);
        self
    }

    /// The last document swapped in
    pub fn document(&self) -> Option<FetchedDocument> {
        self.document.borrow().clone()
    }

    /// Number of content swaps performed
    pub fn swap_count(&self) -> usize {
        self.swaps.get()
    }

    /// URLs handed to the browser for a full page load
    pub fn native_navigations(&self) -> Vec<Url> {
        self.native.borrow().clone()
    }

    /// Lifecycle events dispatched so far, oldest first
    pub fn dispatched_events(&self) -> Vec<String> {
        self.dispatched.borrow().clone()
    }

    /// Number of entries in session history
    pub fn history_len(&self) -> usize {
        self.history.borrow().len()
    }
}

impl Page for HeadlessPage {
    fn location(&self) -> Url {
        self.history.borrow()[self.index.get()].clone()
    }

    fn title(&self) -> Option<String> {
        self.document.borrow().as_ref().and_then(|d| d.title.clone())
    }

    fn scroll_y(&self) -> f64 {
        self.scroll_y.get()
    }

    fn scroll_to(&self, y: f64) {
        self.scroll_y.set(y.max(0.0));
    }

    fn push_history(&self, url: &Url) {
        let mut history = self.history.borrow_mut();
        history.truncate(self.index.get() + 1);
        history.push(url.clone());
        self.index.set(history.len() - 1);
    }

    fn replace_history(&self, url: &Url) {
        self.history.borrow_mut()[self.index.get()] = url.clone();
    }

    fn history_go(&self, delta: i32) {
        let len = self.history.borrow().len() as i64;
        let target = (self.index.get() as i64 + delta as i64).clamp(0, len - 1);
        self.index.set(target as usize);
    }

    fn swap_document(&self, document: &FetchedDocument) {
        *self.document.borrow_mut() = Some(document.clone());
        self.swaps.set(self.swaps.get() + 1);
    }

    fn navigate_native(&self, url: &Url) {
        tracing::debug!(url = %url, "Native navigation requested");
        self.native.borrow_mut().push(url.clone());
    }

    fn dispatch_lifecycle(&self, event: &str) {
        self.dispatched.borrow_mut().push(event.to_string());
    }
}
