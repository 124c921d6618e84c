//! Navigation error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a document for a navigation or prefetch
///
/// For the active navigation every variant leads to a native full-page load of
/// the target; for a prefetch the error is discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// Transport-level failure (DNS, connection reset, CORS, offline)
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("Request failed with status {0}")]
    Status(u16),

    /// The active navigation fetch did not finish in time
    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be read
    #[error("Response error: {0}")]
    Decode(String),
}

/// Result type for document fetches
pub type FetchResult<T> = Result<T, NavigationError>;
