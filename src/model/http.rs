//! HTTP client shared by the model providers
//!
//! Handles authentication, URL building and the mapping from HTTP status to
//! [`ProviderError`]. Retries are not done here; the extraction engine owns
//! the retry and failover policy.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};
use url::Url;

use super::error::ProviderError;

/// How requests authenticate
#[derive(Clone)]
pub enum Auth {
    /// `?key=...` query parameter (Gemini Developer API)
    QueryKey(String),
    /// `Authorization: Bearer ...` header (OpenAI)
    Bearer(String),
}

/// HTTP client for a provider's REST API
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: ReqwestClient,

    /// Scheme and host, without a trailing slash
    base_url: String,

    auth: Auth,
}

#[cfg(test)]
impl HttpClient {
    /// Set the base URL (for testing only)
    pub fn set_base_url(&mut self, url: String) {
        self.base_url = url;
    }
}

impl HttpClient {
    pub fn new(
        base_url: impl Into<String>,
        auth: Auth,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            auth,
        })
    }

    fn build_url(&self, path: &str) -> Result<Url, ProviderError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        Url::parse(&url).map_err(|e| ProviderError::InvalidResponse(format!("Invalid URL: {}", e)))
    }

    /// POST a JSON body and decode a JSON response
    #[instrument(skip(self, body), level = "debug")]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let url = self.build_url(path)?;
        let mut request = self.client.post(url).json(body);

        request = match &self.auth {
            Auth::QueryKey(key) => request.query(&[("key", key)]),
            Auth::Bearer(token) => request.bearer_auth(token),
        };

        debug!("Sending POST request to {}", path);
        self.execute_request(request).await
    }

    async fn execute_request<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Http(e)
            }
        })?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let response_text = response.text().await.unwrap_or_default();
            error!("API error: {} - {}", status, response_text);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        let response_text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Http(e)
            }
        })?;

        if status.is_success() {
            return serde_json::from_str(&response_text).map_err(|e| {
                error!("Failed to parse response: {}", e);
                ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
            });
        }

        error!("API error: {} - {}", status, response_text);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Auth(
                "Invalid API key or credentials".to_string(),
            )),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                Err(ProviderError::Timeout)
            }
            _ => Err(ProviderError::Api {
                status_code: status.as_u16(),
                message: response_text,
            }),
        }
    }
}
