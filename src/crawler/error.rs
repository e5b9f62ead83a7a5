//! Error types for the crawler module

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a crawl failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlErrorKind {
    Network,
    Render,
    Timeout,
}

impl CrawlErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlErrorKind::Network => "network",
            CrawlErrorKind::Render => "render",
            CrawlErrorKind::Timeout => "timeout",
        }
    }
}

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Transport-level failure (DNS, connect, TLS, body read)
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The server answered with a non-2xx status
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Browser launch, navigation or DOM capture failed
    #[error("Render error for {url}: {message}")]
    Render { url: String, message: String },

    /// The step exceeded its deadline
    #[error("Timed out after {after:?} crawling {url}")]
    Timeout { url: String, after: Duration },

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl CrawlError {
    pub fn kind(&self) -> CrawlErrorKind {
        match self {
            CrawlError::Network { .. } | CrawlError::Status { .. } | CrawlError::Client(_) => {
                CrawlErrorKind::Network
            }
            CrawlError::Render { .. } => CrawlErrorKind::Render,
            CrawlError::Timeout { .. } => CrawlErrorKind::Timeout,
        }
    }

    /// Classify a reqwest failure for `url`
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            CrawlError::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else if let Some(status) = err.status() {
            CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            CrawlError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn render(url: &str, err: impl std::fmt::Display) -> Self {
        CrawlError::Render {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let status = CrawlError::Status {
            url: "https://example.org".into(),
            status: 503,
        };
        assert_eq!(status.kind(), CrawlErrorKind::Network);
        assert!(status.to_string().contains("503"));

        assert_eq!(
            CrawlError::render("https://example.org", "launch failed").kind(),
            CrawlErrorKind::Render
        );
        assert_eq!(
            serde_json::to_value(CrawlErrorKind::Timeout).unwrap(),
            "timeout"
        );
    }
}
