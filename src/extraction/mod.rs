//! # Structured Extraction Module
//!
//! Turns cleaned page text into a [`VolunteerOpportunity`] through a
//! schema-bound tool call.
//!
//! ## Retry and failover
//!
//! Providers are tried in order, the chosen one first. Each provider gets at
//! most two attempts: a retryable failure (timeout, rate limit, malformed
//! answer, missing required field) earns one more try, and after a rejected
//! answer that try uses a stricter prompt. Authentication and API failures go
//! straight to the next provider. When every provider is exhausted the
//! engine returns `ExtractionError::Unrecoverable` with every attempt's
//! failure in order.

mod coerce;
mod error;
mod prompt;
mod schema;

pub use coerce::{CoerceError, coerce_record};
pub use error::ExtractionError;
pub use prompt::{EXTRACT_TOOL_NAME, PromptMode, extraction_request, extraction_tool};
pub use schema::VolunteerOpportunity;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::model::{ExtractionProvider, ModelChoice, ProviderSet, ToolRequest};

const ATTEMPTS_PER_PROVIDER: usize = 2;

/// The retry/failover extraction engine
#[derive(Clone)]
pub struct Extractor {
    providers: ProviderSet,
    invoke_timeout: Duration,
    max_backoff: Duration,
}

impl Extractor {
    pub fn new(providers: ProviderSet) -> Self {
        Self {
            providers,
            invoke_timeout: Duration::from_secs(60),
            max_backoff: Duration::from_secs(5),
        }
    }

    pub fn from_settings(providers: ProviderSet, settings: &Settings) -> Self {
        Self::new(providers).with_invoke_timeout(settings.model_timeout)
    }

    /// Bound on a single provider invocation
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Cap on the pause before retrying a rate-limited provider
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Providers in the order they are tried for `choice`
    fn ordered(&self, choice: ModelChoice) -> Vec<Arc<dyn ExtractionProvider>> {
        let preferred = self.providers.iter().filter(|(c, _)| *c == choice);
        let rest = self.providers.iter().filter(|(c, _)| *c != choice);
        preferred.chain(rest).map(|(_, p)| Arc::clone(p)).collect()
    }

    /// Extract one record from `text`, attributing it to `source_url`
    #[instrument(skip(self, text), fields(model = %choice, chars = text.len()))]
    pub async fn extract(
        &self,
        text: &str,
        source_url: &str,
        choice: ModelChoice,
    ) -> Result<VolunteerOpportunity, ExtractionError> {
        let providers = self.ordered(choice);
        if providers.is_empty() {
            return Err(ExtractionError::NoProviders);
        }

        let mut failures = Vec::new();
        for (index, provider) in providers.iter().enumerate() {
            if index > 0 {
                warn!(provider = provider.name(), "Failing over to next provider");
            }

            let mut mode = PromptMode::Normal;
            for attempt in 1..=ATTEMPTS_PER_PROVIDER {
                let request = extraction_request(text, source_url, mode);
                match self.attempt(&**provider, &request, source_url).await {
                    Ok(record) => {
                        info!(provider = provider.name(), attempt, "Extracted record");
                        return Ok(record);
                    }
                    Err(err) => {
                        warn!(provider = provider.name(), attempt, error = %err, "Extraction attempt failed");
                        let retry = err.is_retryable() && attempt < ATTEMPTS_PER_PROVIDER;
                        if err.needs_strict_prompt() {
                            mode = PromptMode::Strict;
                        }
                        if let ExtractionError::ProviderRateLimited {
                            retry_after_secs: Some(secs),
                            ..
                        } = &err
                        {
                            if retry {
                                tokio::time::sleep(Duration::from_secs(*secs).min(self.max_backoff))
                                    .await;
                            }
                        }
                        failures.push(err);
                        if !retry {
                            break;
                        }
                    }
                }
            }
        }

        Err(ExtractionError::Unrecoverable { failures })
    }

    /// Invoke the preferred provider once with an arbitrary tool request
    ///
    /// Used for auxiliary calls such as selector proposals; no retry or failover.
    pub async fn invoke_tool(
        &self,
        choice: ModelChoice,
        request: &ToolRequest,
    ) -> Result<Value, ExtractionError> {
        let provider = self
            .ordered(choice)
            .into_iter()
            .next()
            .ok_or(ExtractionError::NoProviders)?;
        self.invoke(&*provider, request).await
    }

    async fn invoke(
        &self,
        provider: &dyn ExtractionProvider,
        request: &ToolRequest,
    ) -> Result<Value, ExtractionError> {
        match tokio::time::timeout(self.invoke_timeout, provider.invoke(request)).await {
            Ok(result) => result.map_err(|e| ExtractionError::from_provider(provider.name(), e)),
            Err(_) => Err(ExtractionError::ProviderTimeout {
                provider: provider.name().to_string(),
            }),
        }
    }

    async fn attempt(
        &self,
        provider: &dyn ExtractionProvider,
        request: &ToolRequest,
        source_url: &str,
    ) -> Result<VolunteerOpportunity, ExtractionError> {
        let args = self.invoke(provider, request).await?;
        coerce_record(&args, source_url).map_err(|e| match e {
            CoerceError::NotAnObject => ExtractionError::InvalidResponse {
                provider: provider.name().to_string(),
                reason: "tool arguments are not an object".to_string(),
            },
            CoerceError::MissingRequired(fields) => ExtractionError::MissingRequired {
                provider: provider.name().to_string(),
                fields,
            },
        })
    }
}
