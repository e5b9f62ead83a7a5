//! # Model Provider Module
//!
//! The boundary between the extraction engine and the LLM services. Every
//! provider receives the same [`ToolRequest`] (instruction, page text and a
//! JSON-schema tool declaration) and must answer with the arguments of a call
//! to that tool, or a typed [`ProviderError`].
//!
//! ## Key Components
//!
//! - `ExtractionProvider`: the polymorphic invocation seam
//! - `ToolSchema`: a tool declaration derived from a `schemars` type
//! - `GeminiProvider` / `OpenAiProvider`: REST adapters over a shared `HttpClient`
//! - `RateLimitedProvider`: client-side quota enforcement with `governor`
//!
//! Adding a provider means implementing the trait and registering it in
//! [`providers_from_settings`]; the extraction engine needs no changes.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Settings;

pub mod error;
pub mod gemini;
pub mod http;
#[cfg(test)]
pub mod mock_model;
pub mod openai;
pub mod ratelimited;

pub use error::ProviderError;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use ratelimited::RateLimitedProvider;

/// Which provider family to use first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Gemini,
    Gpt,
}

impl ModelChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Gemini => "gemini",
            ModelChoice::Gpt => "gpt",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ModelChoice::Gemini),
            "gpt" | "openai" => Ok(ModelChoice::Gpt),
            other => Err(format!("model must be gemini or gpt, got {other:?}")),
        }
    }
}

/// A function declaration the model is forced to call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments, restricted to the subset both providers accept
    pub parameters: Value,
}

impl ToolSchema {
    /// Declare a tool whose arguments have the shape of `T`
    pub fn for_type<T: JsonSchema>(name: impl Into<String>, description: impl Into<String>) -> Self {
        let root = schemars::schema_for!(T);
        let parameters = serde_json::to_value(&root)
            .map(|v| sanitize_schema(&v))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}));

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Keep only the schema keywords the Gemini and OpenAI function APIs share
fn sanitize_schema(schema: &Value) -> Value {
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in object {
        match key.as_str() {
            "type" => {
                let ty = match value {
                    Value::Array(types) => types
                        .iter()
                        .find(|t| t.as_str() != Some("null"))
                        .cloned()
                        .unwrap_or(Value::String("string".into())),
                    other => other.clone(),
                };
                out.insert(key.clone(), ty);
            }
            "description" | "required" | "enum" => {
                out.insert(key.clone(), value.clone());
            }
            "items" => {
                out.insert(key.clone(), sanitize_schema(value));
            }
            "properties" => {
                let props = value
                    .as_object()
                    .map(|props| {
                        props
                            .iter()
                            .map(|(name, prop)| (name.clone(), sanitize_schema(prop)))
                            .collect::<Map<_, _>>()
                    })
                    .unwrap_or_default();
                out.insert(key.clone(), Value::Object(props));
            }
            _ => {}
        }
    }
    Value::Object(out)
}

/// One schema-bound invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRequest {
    /// Instruction for the model
    pub system: String,
    /// Context the model reads (the page text)
    pub user: String,
    /// The tool the model must call
    pub tool: ToolSchema,
}

/// A model provider that answers tool-bound requests
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Invoke the model and return the arguments of its call to `request.tool`
    async fn invoke(&self, request: &ToolRequest) -> Result<Value, ProviderError>;
}

/// Provider registry, keyed by model family
pub type ProviderSet = Vec<(ModelChoice, Arc<dyn ExtractionProvider>)>;

/// Build the providers whose API keys are configured, each rate limited
pub fn providers_from_settings(settings: &Settings) -> Result<ProviderSet, ProviderError> {
    let quota = Quota::per_minute(
        NonZeroU32::new(settings.model_requests_per_minute).unwrap_or(NonZeroU32::MIN),
    );
    let mut providers: ProviderSet = Vec::new();

    if let Some(key) = &settings.gemini_api_key {
        let provider = GeminiProvider::new(key, &settings.gemini_model, settings.model_timeout)?;
        providers.push((
            ModelChoice::Gemini,
            Arc::new(RateLimitedProvider::new(provider, RateLimiter::direct(quota))),
        ));
    }

    if let Some(key) = &settings.openai_api_key {
        let provider = OpenAiProvider::new(key, &settings.openai_model, settings.model_timeout)?;
        providers.push((
            ModelChoice::Gpt,
            Arc::new(RateLimitedProvider::new(provider, RateLimiter::direct(quota))),
        ));
    }

    Ok(providers)
}
