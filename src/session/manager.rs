//! Session lifecycle management over a pluggable store
//!
//! Read and append calls here never fail a chat turn: storage errors are
//! logged and surface as an empty history or a `false` return.

use crate::errors::{AgentError, Result};
use crate::session::store::{SessionRecord, SessionStore, StoredMessage};
use crate::types::{Metadata, Role};
use chrono::Utc;
use std::sync::Arc;

/// Session manager
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create a new session and return its id
    pub async fn create_session(&self, user_id: Option<&str>, metadata: Option<Metadata>) -> Result<String> {
        let record = SessionRecord::new(user_id.map(str::to_string), metadata.unwrap_or_default());
        self.store.save_session(&record).await?;

        tracing::info!(session_id = %record.session_id, user_id = ?record.user_id, "session created");
        Ok(record.session_id)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.store.get_session(session_id).await
    }

    /// Apply `update` to a stored record; `false` if the session is unknown
    pub async fn update_session<F>(&self, session_id: &str, update: F) -> Result<bool>
    where
        F: FnOnce(&mut SessionRecord) + Send,
    {
        let Some(mut record) = self.store.get_session(session_id).await? else {
            return Ok(false);
        };

        update(&mut record);
        // The id is the storage key and cannot be changed through an update
        record.session_id = session_id.to_string();
        self.store.save_session(&record).await?;
        Ok(true)
    }

    /// Bump the message count and last-active time
    pub async fn increment_message_count(&self, session_id: &str) -> Result<bool> {
        self.update_session(session_id, |record| {
            record.message_count += 1;
            record.last_active = Utc::now();
        })
        .await
    }

    /// Remove a session record together with its history
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let deleted = self.store.delete_session(session_id).await?;
        if deleted {
            tracing::info!(session_id, "session deleted");
        }
        Ok(deleted)
    }

    /// All live sessions owned by `user_id`
    pub async fn get_user_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        Ok(self
            .store
            .list_sessions()
            .await?
            .into_iter()
            .filter(|record| record.user_id.as_deref() == Some(user_id))
            .collect())
    }

    /// History oldest-first; empty on unknown sessions and storage errors
    pub async fn get_conversation_history(&self, session_id: &str, limit: Option<usize>) -> Vec<StoredMessage> {
        match self.store.get_history(session_id, limit).await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(session_id, store = self.store.name(), error = %e, "failed to read history");
                Vec::new()
            }
        }
    }

    /// Append a message and bump the session's counters.
    ///
    /// Returns whether the message was stored. A missing session record
    /// does not block the append.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        metadata: Option<Metadata>,
    ) -> bool {
        if let Err(e) = self
            .store
            .append_message(session_id, role.as_str(), content, metadata)
            .await
        {
            tracing::warn!(session_id, store = self.store.name(), error = %e, "failed to append message");
            return false;
        }

        if let Err(e) = self.increment_message_count(session_id).await {
            tracing::warn!(session_id, error = %e, "failed to update message count");
        }
        true
    }

    /// Drop a session's history, keeping its record
    pub async fn clear_history(&self, session_id: &str) -> Result<()> {
        self.store.clear_history(session_id).await?;
        self.update_session(session_id, |record| {
            record.message_count = 0;
            record.last_active = Utc::now();
        })
        .await?;
        Ok(())
    }

    /// Fetch a record or fail with [`AgentError::SessionNotFound`]
    pub async fn require_session(&self, session_id: &str) -> Result<SessionRecord> {
        self.get_session(session_id)
            .await?
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("store", &self.store.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::in_memory::InMemorySessionStore;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemorySessionStore::new()))
    }

    #[tokio::test]
    async fn test_create_session() {
        let manager = manager();
        let mut meta = Metadata::new();
        meta.insert("team".to_string(), json!("platform"));

        let id = manager.create_session(Some("bob"), Some(meta)).await.unwrap();
        let record = manager.get_session(&id).await.unwrap().unwrap();

        assert_eq!(record.session_id, id);
        assert_eq!(record.user_id.as_deref(), Some("bob"));
        assert_eq!(record.message_count, 0);
        assert_eq!(record.metadata["team"], "platform");
    }

    #[tokio::test]
    async fn test_add_message_updates_counters() {
        let manager = manager();
        let id = manager.create_session(None, None).await.unwrap();
        let created = manager.get_session(&id).await.unwrap().unwrap();

        assert!(manager.add_message(&id, Role::User, "Hello", None).await);
        assert!(manager.add_message(&id, Role::Assistant, "Hi there!", None).await);

        let record = manager.get_session(&id).await.unwrap().unwrap();
        assert_eq!(record.message_count, 2);
        assert!(record.last_active >= created.last_active);

        let history = manager.get_conversation_history(&id, None).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_history_limit() {
        let manager = manager();
        let id = manager.create_session(None, None).await.unwrap();
        for i in 0..5 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            manager.add_message(&id, role, &format!("message {}", i + 1), None).await;
        }

        assert_eq!(manager.get_conversation_history(&id, None).await.len(), 5);
        let limited = manager.get_conversation_history(&id, Some(3)).await;
        assert_eq!(limited.len(), 3);
        assert_eq!(limited[2].content, "message 5");
    }

    #[tokio::test]
    async fn test_update_unknown_session() {
        let manager = manager();
        assert!(!manager.update_session("missing", |r| r.message_count = 9).await.unwrap());
        assert!(matches!(
            manager.require_session("missing").await,
            Err(AgentError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_cannot_rekey() {
        let manager = manager();
        let id = manager.create_session(None, None).await.unwrap();

        manager
            .update_session(&id, |r| r.session_id = "other".to_string())
            .await
            .unwrap();

        assert!(manager.get_session(&id).await.unwrap().is_some());
        assert!(manager.get_session("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_sessions_are_isolated() {
        let manager = manager();
        let a1 = manager.create_session(Some("alice"), None).await.unwrap();
        let a2 = manager.create_session(Some("alice"), None).await.unwrap();
        let b1 = manager.create_session(Some("bob"), None).await.unwrap();

        manager.add_message(&a1, Role::User, "alice's question", None).await;
        manager.add_message(&b1, Role::User, "bob's question", None).await;

        let alice: Vec<String> = manager
            .get_user_sessions("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.session_id)
            .collect();
        assert_eq!(alice.len(), 2);
        assert!(alice.contains(&a1) && alice.contains(&a2));

        let bob_history = manager.get_conversation_history(&b1, None).await;
        assert_eq!(bob_history.len(), 1);
        assert_eq!(bob_history[0].content, "bob's question");
    }

    #[tokio::test]
    async fn test_clear_history_resets_count() {
        let manager = manager();
        let id = manager.create_session(None, None).await.unwrap();
        manager.add_message(&id, Role::User, "one", None).await;
        manager.add_message(&id, Role::User, "two", None).await;

        manager.clear_history(&id).await.unwrap();

        assert!(manager.get_conversation_history(&id, None).await.is_empty());
        assert_eq!(manager.get_session(&id).await.unwrap().unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let manager = manager();
        let id = manager.create_session(None, None).await.unwrap();
        manager.add_message(&id, Role::User, "hello", None).await;

        assert!(manager.delete_session(&id).await.unwrap());
        assert!(manager.get_session(&id).await.unwrap().is_none());
        assert!(manager.get_conversation_history(&id, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_history_is_empty() {
        let manager = manager();
        assert!(manager.get_conversation_history("never-created", None).await.is_empty());
    }
}
