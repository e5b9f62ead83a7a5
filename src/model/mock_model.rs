//! # Mock Provider for Testing
//!
//! Provides a `MockProvider` that implements `ExtractionProvider` with a script
//! of responses, so the extraction engine and the pipeline can be exercised
//! without network calls. Every request is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{ExtractionProvider, ProviderError, ToolRequest};

/// A scripted provider; answers are consumed in order
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    responses: Arc<Mutex<VecDeque<Result<Value, ProviderError>>>>,
    requests: Arc<Mutex<Vec<ToolRequest>>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(name: &str, responses: Vec<Result<Value, ProviderError>>) -> Self {
        Self {
            name: name.to_string(),
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep before answering, to exercise invocation timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<Value, ProviderError> {
        self.requests.lock().await.push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".to_string())))
    }
}
