use std::sync::Arc;

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use serde_json::Value;
use tracing::{Instrument, debug_span, info_span};

use super::{ExtractionProvider, ProviderError, ToolRequest};

/// Waits for a governor permit before every invocation
#[derive(Clone)]
pub struct RateLimitedProvider<P: ExtractionProvider> {
    provider: P,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl<P> RateLimitedProvider<P>
where
    P: ExtractionProvider,
{
    pub fn new(provider: P, limiter: DefaultDirectRateLimiter) -> Self {
        Self {
            provider,
            limiter: Arc::new(limiter),
        }
    }
}

#[async_trait]
impl<P: ExtractionProvider> ExtractionProvider for RateLimitedProvider<P> {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<Value, ProviderError> {
        self.limiter.until_ready().instrument(debug_span!("limiter")).await;
        self.provider
            .invoke(request)
            .instrument(info_span!("invoke", provider = self.provider.name()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ToolSchema;
    use crate::model::mock_model::MockProvider;
    use governor::{Quota, RateLimiter};
    use serde_json::json;
    use std::num::NonZeroU32;
    use std::time::Duration;

    fn request() -> ToolRequest {
        ToolRequest {
            system: String::new(),
            user: String::new(),
            tool: ToolSchema {
                name: "t".to_string(),
                description: String::new(),
                parameters: json!({"type": "object"}),
            },
        }
    }

    #[tokio::test]
    async fn test_second_call_waits_for_permit() {
        let mock = MockProvider::new("gemini", vec![Ok(json!({"a": 1})), Ok(json!({"a": 2}))]);
        let quota = Quota::with_period(Duration::from_millis(200))
            .unwrap()
            .allow_burst(NonZeroU32::new(1).unwrap());
        let limited = RateLimitedProvider::new(mock.clone(), RateLimiter::direct(quota));

        let start = std::time::Instant::now();
        assert_eq!(limited.invoke(&request()).await.unwrap(), json!({"a": 1}));
        assert_eq!(limited.invoke(&request()).await.unwrap(), json!({"a": 2}));

        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(limited.name(), "gemini");
        assert_eq!(mock.call_count().await, 2);
    }
}
