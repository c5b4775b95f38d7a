//! In-memory session store.
//!
//! Used for tests and local development. Sessions are stored serialized,
//! so a save/load cycle exercises the same serde path as the Redis store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::conversation::ConversationSession;
use crate::domain::foundation::SessionId;
use crate::ports::{SessionStore, StoreError};

/// Serialize-through in-memory implementation of [`SessionStore`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &SessionId) -> Result<Option<ConversationSession>, StoreError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match sessions.get(session_id) {
            Some(raw) => {
                let session = serde_json::from_str(raw)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &ConversationSession) -> Result<(), StoreError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sessions.insert(session.session_id, raw);
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sessions.remove(session_id);
        Ok(())
    }
}
