//! The browser page
//!
//! [`Page`] over `window`, `document` and `history`.

use url::Url;
use waypoint::platform::Page;
use waypoint::FetchedDocument;
use web_sys::{Document, Event, ScrollRestoration, Window};

pub struct WebPage {
    window: Window,
    document: Document,
    initial: Url,
}

impl WebPage {
    /// The page of the current browsing context, `None` outside a window.
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        let initial = Url::parse(&window.location().href().ok()?).ok()?;

        // Scroll positions are restored from the store, not by the browser.
        let manual = window
            .history()
            .and_then(|history| history.set_scroll_restoration(ScrollRestoration::Manual));
        if let Err(e) = manual {
            tracing::warn!("Setting history.scrollRestoration failed: {:?}", e);
        }

        Some(Self {
            window,
            document,
            initial,
        })
    }
}

impl Page for WebPage {
    fn location(&self) -> Url {
        self.window
            .location()
            .href()
            .ok()
            .and_then(|href| Url::parse(&href).ok())
            .unwrap_or_else(|| self.initial.clone())
    }

    fn title(&self) -> Option<String> {
        Some(self.document.title()).filter(|t| !t.is_empty())
    }

    fn scroll_y(&self) -> f64 {
        self.window.scroll_y().unwrap_or(0.0)
    }

    fn scroll_to(&self, y: f64) {
        self.window.scroll_to_with_x_and_y(0.0, y);
    }

    fn push_history(&self, url: &Url) {
        let pushed = self.window.history().and_then(|history| {
            history.push_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(url.as_str()))
        });
        if let Err(e) = pushed {
            tracing::warn!(url = %url, "pushState failed: {:?}", e);
        }
    }

    fn replace_history(&self, url: &Url) {
        let replaced = self.window.history().and_then(|history| {
            history.replace_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(url.as_str()))
        });
        if let Err(e) = replaced {
            tracing::warn!(url = %url, "replaceState failed: {:?}", e);
        }
    }

    fn history_go(&self, delta: i32) {
        if let Err(e) = self.window.history().and_then(|history| history.go_with_delta(delta)) {
            tracing::warn!(delta, "history.go failed: {:?}", e);
        }
    }

    fn swap_document(&self, document: &FetchedDocument) {
        if let Some(title) = &document.title {
            self.document.set_title(title);
        }
        match self.document.body() {
            Some(body) => body.set_inner_html(&document.body),
            None => tracing::warn!("Document has no body to swap into"),
        }
    }

    fn navigate_native(&self, url: &Url) {
        if let Err(e) = self.window.location().set_href(url.as_str()) {
            tracing::error!(url = %url, "Native navigation failed: {:?}", e);
        }
    }

    fn dispatch_lifecycle(&self, event: &str) {
        let dispatched = Event::new(event).and_then(|e| self.window.dispatch_event(&e));
        if let Err(e) = dispatched {
            tracing::warn!(event, "Dispatching lifecycle event failed: {:?}", e);
        }
    }
}
