//! Session store port - durable session persistence.
//!
//! The core treats this as awaitable key/value storage of serialized
//! sessions. TTL and expiry are owned by the adapter; the core never
//! deletes sessions except through this interface. The store must
//! guarantee at most one in-flight turn per session identifier (via an
//! external lock or the store's own atomicity).

use async_trait::async_trait;

use crate::domain::conversation::ConversationSession;
use crate::domain::foundation::SessionId;

/// Port for durable session state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session, or `None` if absent/expired.
    async fn get(&self, session_id: &SessionId) -> Result<Option<ConversationSession>, StoreError>;

    /// Persists a session, refreshing its TTL.
    async fn save(&self, session: &ConversationSession) -> Result<(), StoreError>;

    /// Removes a session.
    async fn delete(&self, session_id: &SessionId) -> Result<(), StoreError>;
}

/// Session store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("session serialization failed: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),
}
