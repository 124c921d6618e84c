//! Identity Toolkit REST client
//!
//! Native [`IdentityProvider`] over `reqwest`.

use super::error::IdentityError;
use super::provider::{
    endpoint_url, error_from_response, EmailLinkSignInRequest, EmailLinkSignInResponse,
    IdentityProvider, SendOobCodeRequest, Session, SignInLinkRequest,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Identity provider speaking the Identity Toolkit REST API
pub struct RestIdentityProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestIdentityProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize>(&self, method: &str, body: &T) -> Result<String, IdentityError> {
        let url = endpoint_url(&self.base_url, method, &self.api_key);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))?;

        if status.is_success() {
            Ok(text)
        } else {
            tracing::debug!(method, status = status.as_u16(), "Identity request failed");
            Err(error_from_response(status.as_u16(), &text))
        }
    }
}

#[async_trait(?Send)]
impl IdentityProvider for RestIdentityProvider {
    async fn send_sign_in_link(&self, request: &SignInLinkRequest) -> Result<(), IdentityError> {
        self.post("accounts:sendOobCode", &SendOobCodeRequest::email_sign_in(request))
            .await?;
        tracing::info!(email = %request.email, "Sign-in link sent");
        Ok(())
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
