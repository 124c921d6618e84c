//! Identity provider boundary
//!
//! The completer needs exactly two remote operations: sending a sign-in link to
//! an email address and redeeming the code carried back by that link. The wire
//! types follow the Identity Toolkit REST API (`accounts:sendOobCode` and
//! `accounts:signInWithEmailLink`), shared by the native and browser clients.

use super::error::IdentityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Default endpoint of the Identity Toolkit REST API
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

/// Request to email a sign-in link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInLinkRequest {
    pub email: String,
    /// Where the link returns the user to
    pub continue_url: Url,
}

/// An authenticated session returned by the provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub is_new_user: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("is_new_user", &self.is_new_user)
            .finish()
    }
}

/// Remote identity operations used by the sign-in flow
#[async_trait(?Send)]
pub trait IdentityProvider {
    /// Email a sign-in link that returns to `request.continue_url`
    async fn send_sign_in_link(&self, request: &SignInLinkRequest) -> Result<(), IdentityError>;

    /// Redeem the code from a sign-in link for `email`
    async fn complete_sign_in(&self, email: &str, code: &str) -> Result<Session, IdentityError>;
}

// ============================================
// Request/Response DTOs
// ============================================

/// Body of `accounts:sendOobCode`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOobCodeRequest<'a> {
    pub request_type: &'static str,
    pub email: &'a str,
    pub continue_url: &'a str,
    pub can_handle_code_in_app: bool,
}

impl<'a> SendOobCodeRequest<'a> {
    pub fn email_sign_in(request: &'a SignInLinkRequest) -> Self {
        Self {
            request_type: "EMAIL_SIGNIN",
            email: &request.email,
            continue_url: request.continue_url.as_str(),
            can_handle_code_in_app: true,
        }
    }
}

/// Body of `accounts:signInWithEmailLink`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLinkSignInRequest<'a> {
    pub email: &'a str,
    pub oob_code: &'a str,
}

/// Response of `accounts:signInWithEmailLink`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailLinkSignInResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: String,
    pub id_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub is_new_user: bool,
}

impl EmailLinkSignInResponse {
    pub fn into_session(self, email: &str) -> Session {
        Session {
            user_id: self.local_id,
            email: if self.email.is_empty() {
                email.to_string()
            } else {
                self.email
            },
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            is_new_user: self.is_new_user,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Build the URL of an API method, e.g. `accounts:sendOobCode`
pub fn endpoint_url(base: &str, method: &str, api_key: &str) -> String {
    format!("{}/{}?key={}", base.trim_end_matches('/'), method, api_key)
}

/// Interpret a non-success response body
pub fn error_from_response(status: u16, body: &str) -> IdentityError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if (400..500).contains(&status) => IdentityError::Rejected(envelope.error.message),
        Ok(envelope) => IdentityError::Api {
            status,
            message: envelope.error.message,
        },
        Err(_) => IdentityError::Api {
            status,
            message: body.chars().take(200).collect(),
        },
    }
}
