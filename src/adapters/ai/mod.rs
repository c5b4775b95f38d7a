//! Model provider adapters.
//!
//! Implementations of the `ModelProvider` port.
//!
//! - `OpenAiProvider` - OpenAI-compatible chat-completions client
//! - `MockModelProvider` - scripted mock for testing

mod mock_provider;
mod openai_provider;

pub use mock_provider::MockModelProvider;
pub use openai_provider::{OpenAiConfig, OpenAiProvider};
