//! Waypoint browser shell
//!
//! Runs the navigation lifecycle against the live page: intercepts links,
//! prefetches, restores scroll positions and finishes email-link sign-ins.
//! Sign-in results are announced as a `waypoint:signin` event on `window`.

mod analytics;
mod config;
mod dom;
mod fetch;
mod listeners;
mod storage;

use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::spawn_local;
use waypoint::signin::{SignInError, SignInOutcome, SignInResult};
use waypoint::storage::{KeyValueStore, MemoryStore};
use waypoint::{Config, Lifecycle, LifecycleDeps};
use web_sys::{CustomEvent, CustomEventInit, Window};

use crate::analytics::GtagPageViews;
use crate::dom::WebPage;
use crate::fetch::{FetchIdentityProvider, GlooFetcher, GlooSleeper};
use crate::listeners::DomEvents;
use crate::storage::LocalStorageStore;

const SIGN_IN_EVENT: &str = "waypoint:signin";

thread_local! {
    static APP: RefCell<Option<Rc<Lifecycle>>> = const { RefCell::new(None) };
}

fn main() {
    console_error_panic_hook::set_once();

    let config = config::load();
    init_tracing(&config);

    let (Some(window), Some(page)) = (web_sys::window(), WebPage::new()) else {
        tracing::error!("Not running in a browser window");
        return;
    };
    let Some(document) = window.document() else {
        tracing::error!("Window has no document");
        return;
    };

    let storage: Rc<dyn KeyValueStore> = match LocalStorageStore::open() {
        Ok(store) => Rc::new(store),
        Err(e) => {
            tracing::warn!("localStorage unavailable, state lasts for this page only: {}", e);
            Rc::new(MemoryStore::new())
        }
    };

    let lifecycle = Rc::new(Lifecycle::start(
        &config,
        LifecycleDeps {
            page: Rc::new(page),
            fetcher: Rc::new(GlooFetcher),
            storage,
            identity: Rc::new(FetchIdentityProvider::new(
                &config.identity.endpoint,
                &config.identity.api_key,
            )),
            sleeper: Rc::new(GlooSleeper),
            clock: Rc::new(waypoint::platform::SystemClock),
            page_views: Rc::new(GtagPageViews),
        },
    ));

    lifecycle.attach(&DomEvents::new(window.clone(), document));
    APP.with(|app| *app.borrow_mut() = Some(Rc::clone(&lifecycle)));

    spawn_local(async move {
        let result = finish_sign_in(&window, &lifecycle).await;
        announce(&window, &result);
    });
}

fn init_tracing(config: &Config) {
    let level = match config.logging.level.to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );
}

/// Finish a pending sign-in, asking for the address when this browser does
/// not remember it.
async fn finish_sign_in(window: &Window, lifecycle: &Lifecycle) -> SignInResult<SignInOutcome> {
    match lifecycle.finish_pending_sign_in().await {
        Err(SignInError::EmailMissing) => {
            let email = window
                .prompt_with_message("Please provide your email for confirmation")
                .ok()
                .flatten()
                .unwrap_or_default();
            lifecycle.sign_in().confirm_email(&email).await
        }
        result => result,
    }
}

#[derive(Serialize)]
struct SignInDetail {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_new_user: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SignInDetail {
    fn from_result(result: &SignInResult<SignInOutcome>) -> Option<Self> {
        let detail = match result {
            Ok(SignInOutcome::NoPendingLink) | Ok(SignInOutcome::Settled) => return None,
            Ok(SignInOutcome::SignedIn(session)) => Self {
                status: "signed_in",
                email: Some(session.email.clone()),
                is_new_user: Some(session.is_new_user),
                error: None,
            },
            Err(e) => Self {
                status: "failed",
                email: None,
                is_new_user: None,
                error: Some(e.to_string()),
            },
        };
        Some(detail)
    }
}

fn announce(window: &Window, result: &SignInResult<SignInOutcome>) {
    let Some(detail) = SignInDetail::from_result(result) else {
        return;
    };

    let detail = serde_json::to_string(&detail)
        .ok()
        .and_then(|json| js_sys::JSON::parse(&json).ok())
        .unwrap_or(JsValue::NULL);

    let init = CustomEventInit::new();
    init.set_detail(&detail);
    let dispatched = CustomEvent::new_with_event_init_dict(SIGN_IN_EVENT, &init)
        .and_then(|event| window.dispatch_event(&event));
    if let Err(e) = dispatched {
        tracing::warn!("Dispatching {} failed: {:?}", SIGN_IN_EVENT, e);
    }
}
