//! Error types for structured extraction

use thiserror::Error;

use crate::model::ProviderError;

/// Error type for extraction
///
/// All variants but `Unrecoverable` and `NoProviders` describe one failed
/// attempt; the engine only ever returns the terminal ones.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{provider} timed out")]
    ProviderTimeout { provider: String },

    #[error("{provider} is rate limited")]
    ProviderRateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{provider} returned an invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("{provider} left required fields empty: {}", fields.join(", "))]
    MissingRequired {
        provider: String,
        fields: Vec<String>,
    },

    /// Authentication, API or transport failure
    #[error("{provider} failed: {message}")]
    ProviderFailed { provider: String, message: String },

    #[error("No provider produced a valid record after {} attempts", failures.len())]
    Unrecoverable { failures: Vec<ExtractionError> },

    #[error("No model provider is configured")]
    NoProviders,
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::ProviderTimeout { .. } => "provider_timeout",
            ExtractionError::ProviderRateLimited { .. } => "provider_rate_limited",
            ExtractionError::InvalidResponse { .. } | ExtractionError::MissingRequired { .. } => {
                "invalid_response"
            }
            ExtractionError::ProviderFailed { .. } => "provider_error",
            ExtractionError::Unrecoverable { .. } | ExtractionError::NoProviders => "unrecoverable",
        }
    }

    pub(crate) fn from_provider(provider: &str, err: ProviderError) -> Self {
        let provider = provider.to_string();
        match err {
            ProviderError::Timeout => ExtractionError::ProviderTimeout { provider },
            ProviderError::RateLimited { retry_after_secs } => {
                ExtractionError::ProviderRateLimited {
                    provider,
                    retry_after_secs,
                }
            }
            ProviderError::InvalidResponse(reason) => {
                ExtractionError::InvalidResponse { provider, reason }
            }
            other => ExtractionError::ProviderFailed {
                provider,
                message: other.to_string(),
            },
        }
    }

    /// Whether a second attempt against the same provider is worthwhile
    pub(crate) fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ExtractionError::ProviderFailed { .. }
                | ExtractionError::Unrecoverable { .. }
                | ExtractionError::NoProviders
        )
    }

    /// Whether the next attempt should use the strict prompt
    pub(crate) fn needs_strict_prompt(&self) -> bool {
        matches!(
            self,
            ExtractionError::InvalidResponse { .. } | ExtractionError::MissingRequired { .. }
        )
    }
}
