//! Error types for model providers

use thiserror::Error;

/// Failure of a single provider invocation
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// The provider refused the request for quota reasons
    #[error("Rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The response could not be interpreted as a tool call
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credentials were rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Any other non-success status
    #[error("API error ({status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
