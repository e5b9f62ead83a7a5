//! OpenAI chat completions adapter with a forced tool choice

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::http::{Auth, HttpClient};
use super::{ExtractionProvider, ProviderError, ToolRequest};

const BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Message<'a>>,
    tools: Vec<ToolDefinition<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ToolDefinition<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDefinition<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDefinition<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Clone, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolChoiceFunction<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct ToolChoiceFunction<'a> {
    name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCall {
    function: CalledFunction,
}

#[derive(Debug, Clone, Deserialize)]
struct CalledFunction {
    name: String,
    /// JSON-encoded arguments
    arguments: String,
}

impl ChatResponse {
    fn function_args(&self, name: &str) -> Result<Value, ProviderError> {
        let call = self
            .choices
            .first()
            .into_iter()
            .flat_map(|choice| choice.message.tool_calls.iter().flatten())
            .find(|call| call.function.name == name)
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no call to {name}")))?;

        serde_json::from_str(&call.function.arguments).map_err(|e| {
            ProviderError::InvalidResponse(format!("tool arguments are not JSON: {e}"))
        })
    }
}

/// OpenAI chat completions provider
#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: HttpClient::new(BASE_URL, Auth::Bearer(api_key.to_string()), timeout)?,
            model: model.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_base_url(&mut self, url: String) {
        self.http_client.set_base_url(url);
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "gpt"
    }

    #[instrument(skip(self, request), fields(model = %self.model, tool = %request.tool.name))]
    async fn invoke(&self, request: &ToolRequest) -> Result<Value, ProviderError> {
        let tool = &request.tool;
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            tools: vec![ToolDefinition {
                kind: "function",
                function: FunctionDefinition {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: &tool.parameters,
                },
            }],
            tool_choice: ToolChoice {
                kind: "function",
                function: ToolChoiceFunction { name: &tool.name },
            },
        };

        debug!("Requesting chat completion from model {}", self.model);
        let response: ChatResponse = self.http_client.post("v1/chat/completions", &body).await?;
        response.function_args(&tool.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolSchema;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn request() -> ToolRequest {
        ToolRequest {
            system: "Extract the listing.".to_string(),
            user: "Page Text:\nFood drive".to_string(),
            tool: ToolSchema {
                name: "extract_volunteer_opportunity".to_string(),
                description: "Record one opportunity".to_string(),
                parameters: json!({"type": "object"}),
            },
        }
    }

    fn provider(server: &mockito::ServerGuard) -> OpenAiProvider {
        let mut provider =
            OpenAiProvider::new("sk-test", "gpt-4.1-mini", Duration::from_secs(5)).unwrap();
        provider.set_base_url(server.url());
        provider
    }

    #[tokio::test]
    async fn test_invoke_parses_tool_call_arguments() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4.1-mini",
                "tool_choice": {"type": "function", "function": {"name": "extract_volunteer_opportunity"}}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {
                        "name": "extract_volunteer_opportunity",
                        "arguments": "{\"title\": \"Food drive\", \"tags\": [\"food\"]}"
                    }}
                ]}}]}"#,
            )
            .create_async()
            .await;

        let args = provider(&server).invoke(&request()).await.unwrap();

        assert_eq!(args, json!({"title": "Food drive", "tags": ["food"]}));
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_invalid() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"tool_calls": [
                    {"function": {"name": "extract_volunteer_opportunity", "arguments": "{\"title\": "}}
                ]}}]}"#,
            )
            .create_async()
            .await;

        let err = provider(&server).invoke(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_tool_call_is_invalid() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"content": "Sorry"}}]}"#)
            .create_async()
            .await;

        let err = provider(&server).invoke(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
