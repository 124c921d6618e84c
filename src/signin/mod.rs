//! Deferred email-link sign-in
//!
//! Signing in by email link spans two page loads. On the first, the user asks
//! for a link and the address is persisted locally. On the second, the app is
//! opened from the link with a marker parameter carrying the sign-in code, and
//! [`DeferredSignIn::complete`] redeems it.
//!
//! State machine:
//!
//! ```text
//! Idle ──► NoPendingLink
//!   │
//!   ├───► LinkDetectedNoEmail ──(confirm_email)──┐
//!   │                                            ▼
//!   └──────────────────────────────────────► Completing ──► Succeeded
//!                                                      └──► Failed
//! ```
//!
//! Once `Succeeded` or `Failed` is reached the persisted email is gone, the
//! marker is removed from the address bar and further calls do nothing.
//!
//! - **error**: Error types
//! - **provider**: Identity provider port and wire types
//! - **rest**: REST provider (native only)

pub mod error;
pub mod provider;
#[cfg(feature = "native")]
pub mod rest;

pub use error::{IdentityError, SignInError, SignInResult};
pub use provider::{IdentityProvider, Session, SignInLinkRequest, DEFAULT_IDENTITY_ENDPOINT};
#[cfg(feature = "native")]
pub use rest::RestIdentityProvider;

use crate::platform::Page;
use crate::storage::{keys, KeyValueStore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;
use url::{form_urlencoded, Url};

/// Sign-in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInConfig {
    /// Query or fragment parameter that carries the sign-in code
    #[serde(default = "default_marker_param")]
    pub marker_param: String,

    /// Storage key of the email awaiting confirmation
    #[serde(default = "default_email_key")]
    pub email_key: String,
}

fn default_marker_param() -> String {
    "signInLink".to_string()
}

fn default_email_key() -> String {
    keys::EMAIL_FOR_SIGN_IN.to_string()
}

impl Default for SignInConfig {
    fn default() -> Self {
        Self {
            marker_param: default_marker_param(),
            email_key: default_email_key(),
        }
    }
}

/// Progress of the deferred sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInState {
    /// Not run yet
    Idle,
    NoPendingLink,
    LinkDetectedNoEmail,
    Completing,
    Succeeded,
    Failed,
}

impl SignInState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NoPendingLink | Self::Succeeded | Self::Failed)
    }
}

/// Successful result of a completion attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The URL carries no sign-in link
    NoPendingLink,
    /// The link was redeemed
    SignedIn(Session),
    /// The flow already finished (or is finishing) on this page load
    Settled,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

/// Check that `email` looks like an address, returning it trimmed.
pub fn validate_email(email: &str) -> SignInResult<String> {
    let email = email.trim();
    if email_pattern().is_match(email) {
        Ok(email.to_string())
    } else {
        Err(SignInError::InvalidEmail(email.to_string()))
    }
}

/// Finishes an email-link sign-in started on a previous page load
pub struct DeferredSignIn {
    config: SignInConfig,
    page: Rc<dyn Page>,
    storage: Rc<dyn KeyValueStore>,
    identity: Rc<dyn IdentityProvider>,
    state: Cell<SignInState>,
}

impl DeferredSignIn {
    pub fn new(
        config: SignInConfig,
        page: Rc<dyn Page>,
        storage: Rc<dyn KeyValueStore>,
        identity: Rc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            page,
            storage,
            identity,
            state: Cell::new(SignInState::Idle),
        }
    }

    pub fn state(&self) -> SignInState {
        self.state.get()
    }

    /// Email persisted by [`DeferredSignIn::request_link`], if readable
    pub fn pending_email(&self) -> Option<String> {
        match self.storage.get(&self.config.email_key) {
            Ok(email) => email.filter(|e| !e.trim().is_empty()),
            Err(e) => {
                tracing::warn!("Could not read pending sign-in email: {}", e);
                None
            }
        }
    }

    /// Sign-in code carried by the current URL, if any
    pub fn pending_code(&self) -> Option<String> {
        find_marker(&self.page.location(), &self.config.marker_param)
    }

    /// Finish a pending sign-in, if the current URL carries a sign-in link.
    ///
    /// Returns `Err(EmailMissing)` without contacting the provider when the
    /// address the link was sent to is unknown; call
    /// [`DeferredSignIn::confirm_email`] once the user has supplied it.
    pub async fn complete(&self) -> SignInResult<SignInOutcome> {
        match self.state.get() {
            SignInState::Succeeded | SignInState::Failed | SignInState::Completing => {
                return Ok(SignInOutcome::Settled);
            }
            SignInState::NoPendingLink => return Ok(SignInOutcome::NoPendingLink),
            SignInState::Idle | SignInState::LinkDetectedNoEmail => {}
        }

        let Some(code) = self.pending_code() else {
            self.state.set(SignInState::NoPendingLink);
            tracing::debug!("No pending sign-in link");
            return Ok(SignInOutcome::NoPendingLink);
        };

        let Some(email) = self.pending_email() else {
            self.state.set(SignInState::LinkDetectedNoEmail);
            tracing::info!("Sign-in link found but no email is stored on this device");
            return Err(SignInError::EmailMissing);
        };

        self.redeem(&email, &code).await
    }

    /// Finish a pending sign-in with an email supplied by the user.
    pub async fn confirm_email(&self, email: &str) -> SignInResult<SignInOutcome> {
        match self.state.get() {
            SignInState::Succeeded | SignInState::Failed | SignInState::Completing => {
                return Ok(SignInOutcome::Settled);
            }
            SignInState::NoPendingLink => return Ok(SignInOutcome::NoPendingLink),
            SignInState::Idle | SignInState::LinkDetectedNoEmail => {}
        }

        let email = validate_email(email)?;
        let Some(code) = self.pending_code() else {
            self.state.set(SignInState::NoPendingLink);
            return Ok(SignInOutcome::NoPendingLink);
        };

        self.redeem(&email, &code).await
    }

    /// Ask the provider to email a sign-in link returning to `continue_url`.
    ///
    /// The address is persisted first so the return visit can finish without
    /// asking for it again; it is removed if the link could not be sent.
    pub async fn request_link(&self, email: &str, continue_url: Url) -> SignInResult<()> {
        let email = validate_email(email)?;

        if let Err(e) = self.storage.set(&self.config.email_key, &email) {
            tracing::warn!("Could not persist sign-in email, it will be asked for again: {}", e);
        }

        let request = SignInLinkRequest {
            email,
            continue_url,
        };
        if let Err(e) = self.identity.send_sign_in_link(&request).await {
            self.clear_email();
            tracing::warn!(email = %request.email, "Sending sign-in link failed: {}", e);
            return Err(e.into());
        }

        tracing::info!(email = %request.email, "Sign-in link requested");
        Ok(())
    }

    async fn redeem(&self, email: &str, code: &str) -> SignInResult<SignInOutcome> {
        self.state.set(SignInState::Completing);
        tracing::debug!(email, "Completing sign-in");

        let result = if code.trim().is_empty() {
            Err(SignInError::TokenInvalid("empty sign-in code".to_string()))
        } else {
            self.identity
                .complete_sign_in(email, code.trim())
                .await
                .map_err(SignInError::from)
        };

        // Whatever the outcome the link is spent.
        self.clear_email();
        self.strip_marker();

        match result {
            Ok(session) => {
                self.state.set(SignInState::Succeeded);
                tracing::info!(user_id = %session.user_id, is_new_user = session.is_new_user, "Signed in");
                Ok(SignInOutcome::SignedIn(session))
            }
            Err(e) => {
                self.state.set(SignInState::Failed);
                tracing::warn!("Sign-in failed: {}", e);
                Err(e)
            }
        }
    }

    fn clear_email(&self) {
        if let Err(e) = self.storage.remove(&self.config.email_key) {
            tracing::warn!("Could not clear pending sign-in email: {}", e);
        }
    }

    fn strip_marker(&self) {
        let location = self.page.location();
        let cleaned = without_marker(&location, &self.config.marker_param);
        if cleaned != location {
            self.page.replace_history(&cleaned);
        }
    }
}

/// Value of `param` in the query or, failing that, in a `key=value` fragment
fn find_marker(url: &Url, param: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            let fragment = url.fragment()?;
            form_urlencoded::parse(fragment.as_bytes())
                .find(|(key, _)| key == param)
                .map(|(_, value)| value.into_owned())
        })
}

/// `url` with `param` removed from query and fragment, other parameters kept
fn without_marker(url: &Url, param: &str) -> Url {
    let mut cleaned = url.clone();

    if url.query_pairs().any(|(key, _)| key == param) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            cleaned.set_query(None);
        } else {
            cleaned.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    if let Some(fragment) = url.fragment() {
        let pairs: Vec<(String, String)> = form_urlencoded::parse(fragment.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if pairs.iter().any(|(key, _)| key == param) {
            let kept: Vec<_> = pairs.into_iter().filter(|(key, _)| key != param).collect();
            if kept.is_empty() {
                cleaned.set_fragment(None);
            } else {
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(kept)
                    .finish();
                cleaned.set_fragment(Some(&encoded));
            }
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPage;
    use crate::storage::MemoryStore;
    use crate::testing::{url, FailingStore, ScriptedIdentity};

    struct Harness {
        page: Rc<HeadlessPage>,
        storage: Rc<MemoryStore>,
        identity: Rc<ScriptedIdentity>,
        completer: DeferredSignIn,
    }

    fn harness(location: &str, email: Option<&str>, identity: ScriptedIdentity) -> Harness {
        let page = Rc::new(HeadlessPage::new(url(location)));
        let storage = Rc::new(match email {
            Some(email) => MemoryStore::with_entries([(keys::EMAIL_FOR_SIGN_IN, email)]),
            None => MemoryStore::new(),
        });
        let identity = Rc::new(identity);
        let completer = DeferredSignIn::new(
            SignInConfig::default(),
            page.clone(),
            storage.clone(),
            identity.clone(),
        );
        Harness {
            page,
            storage,
            identity,
            completer,
        }
    }

    #[tokio::test]
    async fn test_no_marker_is_no_pending_link() {
        let h = harness("/courses?tab=1", Some("user@example.com"), ScriptedIdentity::default());

        assert_eq!(h.completer.complete().await, Ok(SignInOutcome::NoPendingLink));
        assert_eq!(h.completer.state(), SignInState::NoPendingLink);
        assert!(h.identity.completions().is_empty());
        assert!(h.storage.contains(keys::EMAIL_FOR_SIGN_IN));
    }

    #[tokio::test]
    async fn test_link_without_email_asks_for_it() {
        let h = harness("/?signInLink=TOKEN123", None, ScriptedIdentity::accepting("TOKEN123"));

        assert_eq!(h.completer.complete().await, Err(SignInError::EmailMissing));
        assert_eq!(h.completer.state(), SignInState::LinkDetectedNoEmail);
        assert!(h.identity.completions().is_empty());
        assert_eq!(h.page.location().query(), Some("signInLink=TOKEN123"));
    }

    #[tokio::test]
    async fn test_confirm_email_finishes_flow() {
        let h = harness("/?signInLink=TOKEN123", None, ScriptedIdentity::accepting("TOKEN123"));
        let _ = h.completer.complete().await;

        assert_eq!(
            h.completer.confirm_email("bad address").await,
            Err(SignInError::InvalidEmail("bad address".into()))
        );
        assert_eq!(h.completer.state(), SignInState::LinkDetectedNoEmail);

        let outcome = h.completer.confirm_email(" user@example.com ").await.unwrap();
        assert!(matches!(outcome, SignInOutcome::SignedIn(ref s) if s.email == "user@example.com"));
        assert_eq!(h.completer.state(), SignInState::Succeeded);
        assert_eq!(h.page.location().query(), None);
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let h = harness(
            "/lesson?ref=mail&signInLink=TOKEN123#top",
            Some("user@example.com"),
            ScriptedIdentity::accepting("TOKEN123"),
        );

        let outcome = h.completer.complete().await.unwrap();
        let SignInOutcome::SignedIn(session) = outcome else {
            panic!("expected a session");
        };
        assert_eq!(session.user_id, "uid-TOKEN123");
        assert_eq!(h.completer.state(), SignInState::Succeeded);
        assert_eq!(
            h.identity.completions(),
            vec![("user@example.com".to_string(), "TOKEN123".to_string())]
        );

        assert!(!h.storage.contains(keys::EMAIL_FOR_SIGN_IN));
        let location = h.page.location();
        assert_eq!(location.query(), Some("ref=mail"));
        assert_eq!(location.fragment(), Some("top"));
        assert_eq!(h.page.history_len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_token_fails_and_clears() {
        let h = harness(
            "/?signInLink=TOKEN123",
            Some("user@example.com"),
            ScriptedIdentity::accepting("OTHER"),
        );

        let err = h.completer.complete().await.unwrap_err();
        assert!(matches!(err, SignInError::TokenInvalid(_)));
        assert_eq!(h.completer.state(), SignInState::Failed);
        assert!(!h.storage.contains(keys::EMAIL_FOR_SIGN_IN));
        assert!(!h.page.location().as_str().contains("signInLink"));
    }

    #[tokio::test]
    async fn test_provider_outage_is_provider_error() {
        let h = harness("/?signInLink=T", Some("user@example.com"), ScriptedIdentity::unreachable());

        let err = h.completer.complete().await.unwrap_err();
        assert!(matches!(err, SignInError::Provider(_)));
        assert_eq!(h.completer.state(), SignInState::Failed);
    }

    #[tokio::test]
    async fn test_empty_token_is_invalid_without_provider_call() {
        let h = harness("/?signInLink=", Some("user@example.com"), ScriptedIdentity::accepting(""));

        let err = h.completer.complete().await.unwrap_err();
        assert!(matches!(err, SignInError::TokenInvalid(_)));
        assert!(h.identity.completions().is_empty());
        assert!(!h.storage.contains(keys::EMAIL_FOR_SIGN_IN));
    }

    #[tokio::test]
    async fn test_settled_completer_is_idempotent() {
        let h = harness(
            "/?signInLink=TOKEN123",
            Some("user@example.com"),
            ScriptedIdentity::accepting("TOKEN123"),
        );
        h.completer.complete().await.unwrap();

        // A stale email and link must not be redeemed twice.
        h.storage.set(keys::EMAIL_FOR_SIGN_IN, "user@example.com").unwrap();
        h.page.replace_history(&url("/?signInLink=TOKEN123"));

        assert_eq!(h.completer.complete().await, Ok(SignInOutcome::Settled));
        assert_eq!(h.completer.confirm_email("user@example.com").await, Ok(SignInOutcome::Settled));
        assert_eq!(h.identity.completions().len(), 1);
        assert_eq!(h.completer.state(), SignInState::Succeeded);
    }

    #[tokio::test]
    async fn test_failed_completer_is_idempotent() {
        let h = harness(
            "/?signInLink=TOKEN123",
            Some("user@example.com"),
            ScriptedIdentity::accepting("OTHER"),
        );
        assert!(h.completer.complete().await.is_err());
        assert_eq!(h.completer.state(), SignInState::Failed);

        h.storage.set(keys::EMAIL_FOR_SIGN_IN, "user@example.com").unwrap();
        h.page.replace_history(&url("/?signInLink=TOKEN123"));

        assert_eq!(h.completer.complete().await, Ok(SignInOutcome::Settled));
        assert_eq!(h.completer.confirm_email("user@example.com").await, Ok(SignInOutcome::Settled));
        assert_eq!(h.identity.completions().len(), 1);
        assert_eq!(h.completer.state(), SignInState::Failed);
    }

    #[tokio::test]
    async fn test_marker_in_fragment() {
        let h = harness(
            "/welcome#signInLink=TOKEN123&step=2",
            Some("user@example.com"),
            ScriptedIdentity::accepting("TOKEN123"),
        );

        assert!(h.completer.complete().await.is_ok());
        assert_eq!(h.page.location().fragment(), Some("step=2"));
    }

    #[tokio::test]
    async fn test_unreadable_storage_is_treated_as_missing_email() {
        let page = Rc::new(HeadlessPage::new(url("/?signInLink=T")));
        let identity = Rc::new(ScriptedIdentity::accepting("T"));
        let completer = DeferredSignIn::new(
            SignInConfig::default(),
            page,
            Rc::new(FailingStore),
            identity.clone(),
        );

        assert_eq!(completer.complete().await, Err(SignInError::EmailMissing));
        assert!(completer.confirm_email("user@example.com").await.is_ok());
        assert_eq!(identity.completions().len(), 1);
    }

    #[tokio::test]
    async fn test_request_link_persists_email() {
        let h = harness("/", None, ScriptedIdentity::default());
        let continue_url = url("/finish");

        h.completer
            .request_link("user@example.com", continue_url.clone())
            .await
            .unwrap();

        assert_eq!(h.completer.pending_email().as_deref(), Some("user@example.com"));
        let sent = h.identity.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].continue_url, continue_url);
    }

    #[tokio::test]
    async fn test_request_link_failure_forgets_email() {
        let h = harness("/", None, ScriptedIdentity::unreachable());

        let err = h
            .completer
            .request_link("user@example.com", url("/finish"))
            .await
            .unwrap_err();
        assert!(matches!(err, SignInError::Provider(_)));
        assert!(h.completer.pending_email().is_none());

        assert!(matches!(
            h.completer.request_link("nope", url("/finish")).await,
            Err(SignInError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_without_marker_keeps_other_params() {
        let original = url("/a?x=1&signInLink=T&y=2");
        let cleaned = without_marker(&original, "signInLink");
        assert_eq!(cleaned.query(), Some("x=1&y=2"));

        let untouched = url("/a?x=1");
        assert_eq!(without_marker(&untouched, "signInLink"), untouched);
    }

    #[test]
    fn test_fragment_marker_leaves_query_encoding_alone() {
        let original = url("/a?q=a%20b&flag#signInLink=T");
        let cleaned = without_marker(&original, "signInLink");

        assert_eq!(cleaned.query(), Some("q=a%20b&flag"));
        assert_eq!(cleaned.fragment(), None);
    }
}
