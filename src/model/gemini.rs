//! Gemini `generateContent` adapter
//!
//! Sends the request with a single function declaration and function calling
//! mode `ANY`, so the model must answer with a call to that function.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::http::{Auth, HttpClient};
use super::{ExtractionProvider, ProviderError, ToolRequest};

const BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Content represents a piece of content that can be processed by the model
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Content {
    /// The role of the content (e.g., "user", "model")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part {
            text: Some(text.into()),
            function_call: None,
        });
        self
    }
}

/// A part of content: text or a function call
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub function_calling_config: FunctionCallingConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallingConfig {
    /// `ANY` forces a function call
    pub mode: String,
    pub allowed_function_names: Vec<String>,
}

/// Generation configuration for content generation
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub tools: Vec<Tool>,
    pub tool_config: ToolConfig,
    pub generation_config: GenerationConfig,
}

/// Response from content generation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Arguments of the first call to `name`
    ///
    /// A JSON object returned as plain text is accepted as well; some models
    /// answer that way despite the forced mode.
    pub fn function_args(&self, name: &str) -> Result<Value, ProviderError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(ProviderError::InvalidResponse(format!(
                "prompt blocked: {reason}"
            )));
        }

        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("no candidates".to_string()))?;
        let parts = candidate
            .content
            .as_ref()
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();

        if let Some(call) = parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .find(|call| call.name == name)
        {
            return Ok(call.args.clone());
        }

        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        match serde_json::from_str::<Value>(strip_code_fence(&text)) {
            Ok(value) if value.is_object() => Ok(value),
            _ => Err(ProviderError::InvalidResponse(format!(
                "no call to {name} (finish reason {:?})",
                candidate.finish_reason
            ))),
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Gemini Developer API provider
#[derive(Clone)]
pub struct GeminiProvider {
    http_client: HttpClient,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: HttpClient::new(BASE_URL, Auth::QueryKey(api_key.to_string()), timeout)?,
            model: model.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_base_url(&mut self, url: String) {
        self.http_client.set_base_url(url);
    }

    fn build_request(request: &ToolRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::new().with_role("user").with_text(&request.user)],
            system_instruction: Some(Content::new().with_text(&request.system)),
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: request.tool.name.clone(),
                    description: request.tool.description.clone(),
                    parameters: request.tool.parameters.clone(),
                }],
            }],
            tool_config: ToolConfig {
                function_calling_config: FunctionCallingConfig {
                    mode: "ANY".to_string(),
                    allowed_function_names: vec![request.tool.name.clone()],
                },
            },
            generation_config: GenerationConfig {
                temperature: Some(0.0),
            },
        }
    }
}

#[async_trait]
impl ExtractionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %self.model, tool = %request.tool.name))]
    async fn invoke(&self, request: &ToolRequest) -> Result<Value, ProviderError> {
        let path = format!("{}/models/{}:generateContent", API_VERSION, self.model);
        let body = Self::build_request(request);

        debug!("Generating content from model {}", self.model);
        let response: GenerateContentResponse = self.http_client.post(&path, &body).await?;
        response.function_args(&request.tool.name)
    }
}
