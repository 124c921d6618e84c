//! # Waypoint
//!
//! Client-side navigation lifecycle for multi-page web applications that want
//! single-page transitions: link interception, prefetching, per-route scroll
//! restoration and deferred email-link sign-in.
//!
//! ## Features
//!
//! - **Client-side navigation**: same-origin links swap content in place and
//!   keep history in step; anything unusual is left to the browser
//! - **Prefetching**: on hover or on visibility, deduplicated and bounded
//! - **Safe fallback**: failed or slow navigations turn into native page loads
//! - **Scroll restoration**: back/forward lands where the reader left off
//! - **Deferred sign-in**: finishes an email-link sign-in across page loads
//!
//! ## Modules
//!
//! - [`router`]: Navigation router, events and prefetch cache
//! - [`scroll`]: Scroll Position Store
//! - [`signin`]: Deferred sign-in completer and identity provider port
//! - [`lifecycle`]: Composition of the above
//! - [`platform`]: Host ports (page, fetcher, timers, DOM events)
//! - [`storage`]: Key-value persistence
//!
//! The core is single-threaded and host-agnostic. The `native` feature adds
//! tokio timers, `reqwest` clients and file storage; the browser shell lives
//! in the `waypoint-web` crate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use waypoint::lifecycle::{Lifecycle, LifecycleDeps, TracingPageViews};
//! use waypoint::platform::{HeadlessPage, HttpFetcher, SystemClock, TokioSleeper};
//! use waypoint::router::NavigationTrigger;
//! use waypoint::signin::RestIdentityProvider;
//! use waypoint::storage::MemoryStore;
//! use waypoint::Config;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let start = url::Url::parse("https://example.com/")?;
//!
//!     let lifecycle = Lifecycle::start(
//!         &config,
//!         LifecycleDeps {
//!             page: Rc::new(HeadlessPage::new(start.clone())),
//!             fetcher: Rc::new(HttpFetcher::new(std::time::Duration::from_secs(5))?),
//!             storage: Rc::new(MemoryStore::new()),
//!             identity: Rc::new(RestIdentityProvider::new(
//!                 &config.identity.endpoint,
//!                 &config.identity.api_key,
//!                 std::time::Duration::from_secs(10),
//!             )?),
//!             sleeper: Rc::new(TokioSleeper),
//!             clock: Rc::new(SystemClock),
//!             page_views: Rc::new(TracingPageViews),
//!         },
//!     );
//!
//!     let next = start.join("/docs")?;
//!     let outcome = lifecycle
//!         .router()
//!         .navigate(next, NavigationTrigger::Programmatic)
//!         .await;
//!     println!("{outcome:?}");
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod lifecycle;
pub mod platform;
pub mod route;
pub mod router;
pub mod scroll;
pub mod signin;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export top-level types for convenience
pub use config::{generate_default_config, Config, ConfigError};

pub use document::FetchedDocument;

pub use lifecycle::{Lifecycle, LifecycleDeps, PageView, PageViewReporter, TracingPageViews};

pub use route::{classify_link, ClickDecision, LinkClick, Modifiers, PassReason, RouteKey};

pub use router::{
    NavigationError, NavigationEvent, NavigationOutcome, NavigationPhase, NavigationTrigger,
    PrefetchMode, Router, RouterConfig,
};

pub use scroll::{ScrollConfig, ScrollRecord, ScrollStore};

pub use signin::{
    DeferredSignIn, IdentityError, IdentityProvider, Session, SignInConfig, SignInError,
    SignInOutcome, SignInState,
};

pub use storage::{KeyValueStore, MemoryStore, StorageError, StorageResult};
