//! Network and timer adapters
//!
//! Document fetching and the identity provider over `fetch` (via `gloo-net`),
//! and a [`Sleeper`] over `setTimeout`.

use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use std::time::Duration;
use url::Url;
use waypoint::platform::{DocumentFetcher, Sleeper};
use waypoint::signin::provider::{
    endpoint_url, error_from_response, EmailLinkSignInRequest, EmailLinkSignInResponse,
    SendOobCodeRequest,
};
use waypoint::signin::{IdentityError, IdentityProvider, Session, SignInLinkRequest};
use waypoint::document::{ensure_html, ACCEPT_HTML};
use waypoint::{FetchedDocument, NavigationError};

/// Sleeper backed by `setTimeout`
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooSleeper;

impl Sleeper for GlooSleeper {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        TimeoutFuture::new(millis).boxed_local()
    }
}

/// Document fetcher using the Fetch API
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooFetcher;

#[async_trait(?Send)]
impl DocumentFetcher for GlooFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedDocument, NavigationError> {
        let response = Request::get(url.as_str())
            .header("Accept", ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| NavigationError::Network(e.to_string()))?;

        if !response.ok() {
            return Err(NavigationError::Status(response.status()));
        }
        ensure_html(response.headers().get("content-type").as_deref())?;

        let final_url = Url::parse(&response.url()).unwrap_or_else(|_| url.clone());
        let html = response
            .text()
            .await
            .map_err(|e| NavigationError::Decode(e.to_string()))?;

        Ok(FetchedDocument::from_html(final_url, &html))
    }
}

/// Identity provider speaking the Identity Toolkit REST API through `fetch`
pub struct FetchIdentityProvider {
    base_url: String,
    api_key: String,
}

impl FetchIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn post<T: serde::Serialize>(&self, method: &str, body: &T) -> Result<String, IdentityError> {
        let url = endpoint_url(&self.base_url, method, &self.api_key);

        let response = Request::post(&url)
            .json(body)
            .map_err(|e| IdentityError::Decode(e.to_string()))?
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))?;

        if response.ok() {
            Ok(text)
        } else {
            Err(error_from_response(status, &text))
        }
    }
}

#[async_trait(?Send)]
impl IdentityProvider for FetchIdentityProvider {
    async fn send_sign_in_link(&self, request: &SignInLinkRequest) -> Result<(), IdentityError> {
        self.post("accounts:sendOobCode", &SendOobCodeRequest::email_sign_in(request))
            .await
            .map(|_| ())
    }

    async fn complete_sign_in(&self, email: &str, code: &str) -> Result<Session, IdentityError> {
        let body = EmailLinkSignInRequest {
            email,
            oob_code: code,
        };
        let text = self.post("accounts:signInWithEmailLink", &body).await?;

        let response: EmailLinkSignInResponse =
            serde_json::from_str(&text).map_err(|e| IdentityError::Decode(e.to_string()))?;
        Ok(response.into_session(email))
    }
}
