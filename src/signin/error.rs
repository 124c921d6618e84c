//! Sign-in error types

use thiserror::Error;

/// Errors returned by identity provider calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The provider could not be reached
    #[error("Identity provider unreachable: {0}")]
    Network(String),

    /// The provider refused the request; carries its error code
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    /// Unexpected HTTP status without a recognisable error body
    #[error("Identity provider error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("Unexpected identity provider response: {0}")]
    Decode(String),
}

impl IdentityError {
    /// Whether the provider refused the sign-in code itself
    pub fn is_invalid_code(&self) -> bool {
        matches!(self, Self::Rejected(code) if is_code_rejection(code))
    }
}

fn is_code_rejection(code: &str) -> bool {
    // Codes may carry a suffix such as "INVALID_OOB_CODE : The action code is invalid."
    let code = code.split_whitespace().next().unwrap_or_default();
    matches!(
        code,
        "INVALID_OOB_CODE" | "EXPIRED_OOB_CODE" | "INVALID_ACTION_CODE" | "EXPIRED_ACTION_CODE"
    )
}

/// Errors surfaced by the sign-in completer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignInError {
    /// The link token was missing, malformed, expired or rejected
    #[error("Sign-in link is invalid or expired: {0}")]
    TokenInvalid(String),

    /// A link is present but the email it was sent to is not known on this device
    #[error("Email address required to finish signing in")]
    EmailMissing,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Any other provider failure
    #[error("Sign-in failed: {0}")]
    Provider(String),
}

impl From<IdentityError> for SignInError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(code) if is_code_rejection(&code) => Self::TokenInvalid(code),
            IdentityError::Rejected(code) if code.starts_with("INVALID_EMAIL") => {
                Self::InvalidEmail(code)
            }
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Result type for sign-in operations
pub type SignInResult<T> = Result<T, SignInError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_code_maps_to_token_invalid() {
        let err: SignInError = IdentityError::Rejected("EXPIRED_OOB_CODE".into()).into();
        assert_eq!(err, SignInError::TokenInvalid("EXPIRED_OOB_CODE".into()));

        let with_detail = IdentityError::Rejected("INVALID_OOB_CODE : bad".into());
        assert!(with_detail.is_invalid_code());
    }

    #[test]
    fn test_other_failures_map_to_provider() {
        let err: SignInError = IdentityError::Network("refused".into()).into();
        assert!(matches!(err, SignInError::Provider(_)));

        let err: SignInError = IdentityError::Rejected("INVALID_EMAIL".into()).into();
        assert!(matches!(err, SignInError::InvalidEmail(_)));
    }
}
