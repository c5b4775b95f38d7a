//! Model provider port - interface to the language model.
//!
//! The core invokes the model once per turn with a fully built system
//! prompt and the recent message history, and expects JSON-parseable text
//! back. Parsing and validation are owned by the core, never by adapters.
//! Retry policy, if any, belongs to the adapter; the core never retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for language model completions.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generates a single completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError>;

    /// Estimates token count for text (rough, for budget decisions).
    fn estimate_tokens(&self, text: &str) -> u32;

    /// Provider information (name, model).
    fn provider_info(&self) -> ProviderInfo;
}

/// Request for one model completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Full system prompt from the prompt builder.
    pub system_prompt: String,
    /// Recent conversation history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature; kept low for consistency.
    pub temperature: f32,
    /// Bounded output length.
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    pub fn with_message(mut self, role: ChatRole, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A message in the model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of the message sender, in provider wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Response from a model completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Raw generated text, expected to be JSON-parseable.
    pub content: String,
    /// Model that generated the response.
    pub model: String,
    /// Token usage for observability.
    pub usage: TokenUsage,
}

/// Token usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Model provider errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ModelError {
    /// Returns true if a later attempt could succeed. The core never
    /// retries; this is for the transport layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::Timeout { .. }
                | ModelError::Network(_)
                | ModelError::Unavailable { .. }
        )
    }
}
