//! Ports - Interfaces to external collaborators.
//!
//! The conversation core only talks to the outside world through these
//! traits: the language model, the session store, and the service-record
//! source. Adapters implement them; the core owns the contracts.

mod model_provider;
mod service_records;
mod session_store;

pub use model_provider::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, ModelError, ModelProvider,
    ProviderInfo, TokenUsage,
};
pub use service_records::{RecordError, ServiceRecordSource};
pub use session_store::{SessionStore, StoreError};
