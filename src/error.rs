//! Error types for the oppcrawl crate

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::crawler::CrawlError;
use crate::extraction::ExtractionError;
use crate::reducer::ReductionError;
use crate::store::DbError;

/// Result type for oppcrawl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
///
/// Every variant is fatal to the invocation that raised it. Nothing is
/// persisted once one of these has been returned.
#[derive(Debug, Error)]
pub enum Error {
    /// The page could not be fetched or rendered
    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// The page yielded no usable text
    #[error("Reduction error: {0}")]
    Reduction(#[from] ReductionError),

    /// No provider produced a valid record
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// The persistence collaborator failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    /// The input URL was rejected before any work was done
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A domain configuration or setting was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

/// Serializable failure handed to the outer API/CLI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Which stage failed
    pub kind: &'static str,

    /// Stage-specific failure kind (e.g. `network`, `unrecoverable`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<&'static str>,

    /// Human-readable message
    pub message: String,
}

impl Error {
    /// Build the typed payload the thin API layer translates for users
    pub fn payload(&self) -> ErrorPayload {
        let (kind, detail) = match self {
            Error::Crawl(e) => ("crawl", Some(e.kind().as_str())),
            Error::Reduction(_) => ("reduction", Some("no_content")),
            Error::Extraction(e) => ("extraction", Some(e.kind())),
            Error::Persistence(_) => ("persistence", None),
            Error::InvalidUrl(_) => ("invalid_url", None),
            Error::InvalidConfig(_) => ("invalid_config", None),
        };
        ErrorPayload {
            kind,
            detail,
            message: self.to_string(),
        }
    }
}
