//! Mock model provider for testing.
//!
//! Configurable to return scripted responses or inject errors, and records
//! every request so tests can verify what the executor sent.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    CompletionRequest, CompletionResponse, ModelError, ModelProvider, ProviderInfo, TokenUsage,
};

/// A scripted reply.
#[derive(Debug, Clone)]
enum MockReply {
    Success(String),
    Error(ModelError),
}

/// Mock implementation of the [`ModelProvider`] port.
///
/// Replies are consumed in order; once exhausted, a fixed marker response
/// is returned.
#[derive(Debug, Clone)]
pub struct MockModelProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Duration,
    info: ProviderInfo,
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            info: ProviderInfo::new("mock", "mock-model-1"),
        }
    }

    /// Queues a successful response.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.replies
            .lock()
            .expect("mock replies lock")
            .push_back(MockReply::Success(content.into()));
        self
    }

    /// Queues an error.
    pub fn with_error(self, error: ModelError) -> Self {
        self.replies
            .lock()
            .expect("mock replies lock")
            .push_back(MockReply::Error(error));
        self
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of completed calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock calls lock").len()
    }

    /// All recorded requests.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().expect("mock calls lock").clone()
    }

    fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .expect("mock replies lock")
            .pop_front()
            .unwrap_or_else(|| MockReply::Success("mock response".to_string()))
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        self.calls.lock().expect("mock calls lock").push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_reply() {
            MockReply::Success(content) => Ok(CompletionResponse {
                content,
                model: self.info.model.clone(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                },
            }),
            MockReply::Error(err) => Err(err),
        }
    }

    fn estimate_tokens(&self, text: &str) -> u32 {
        (text.len() / 4).max(1) as u32
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ChatRole;

    fn request() -> CompletionRequest {
        CompletionRequest::new("system").with_message(ChatRole::User, "hola")
    }

    #[tokio::test]
    async fn returns_responses_in_order() {
        let provider = MockModelProvider::new()
            .with_response("primero")
            .with_response("segundo");

        let r1 = provider.complete(request()).await.unwrap();
        let r2 = provider.complete(request()).await.unwrap();

        assert_eq!(r1.content, "primero");
        assert_eq!(r2.content, "segundo");
    }

    #[tokio::test]
    async fn returns_marker_after_exhaustion() {
        let provider = MockModelProvider::new().with_response("único");
        provider.complete(request()).await.unwrap();
        let r = provider.complete(request()).await.unwrap();
        assert_eq!(r.content, "mock response");
    }

    #[tokio::test]
    async fn returns_configured_error() {
        let provider = MockModelProvider::new().with_error(ModelError::Timeout { timeout_secs: 30 });
        let result = provider.complete(request()).await;
        assert_eq!(result.unwrap_err(), ModelError::Timeout { timeout_secs: 30 });
    }

    #[tokio::test]
    async fn records_calls() {
        let provider = MockModelProvider::new().with_response("ok");
        assert_eq!(provider.call_count(), 0);
        provider.complete(request()).await.unwrap();
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.calls()[0].messages[0].content, "hola");
    }

    #[tokio::test]
    async fn respects_delay() {
        let provider = MockModelProvider::new()
            .with_response("lento")
            .with_delay(Duration::from_millis(30));
        let start = std::time::Instant::now();
        provider.complete(request()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn estimates_tokens_roughly() {
        let provider = MockModelProvider::new();
        assert_eq!(provider.estimate_tokens("Hi"), 1);
        assert!(provider.estimate_tokens(&"x".repeat(400)) >= 100);
    }
}
