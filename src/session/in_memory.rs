//! In-memory session store, for tests and single-process deployments.

use crate::errors::Result;
use crate::session::store::{
    apply_limit, Expiring, RetentionPolicy, SessionRecord, SessionStore, StoredMessage,
};
use crate::types::Metadata;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, Expiring<SessionRecord>>,
    histories: HashMap<String, Expiring<Vec<StoredMessage>>>,
}

impl Tables {
    fn len(&self) -> usize {
        self.sessions.len() + self.histories.len()
    }

    /// Drop expired entries, returning how many went
    fn evict_expired(&mut self, ttl: Duration) -> usize {
        let before = self.len();
        self.sessions.retain(|_, entry| !entry.is_expired(ttl));
        self.histories.retain(|_, entry| !entry.is_expired(ttl));
        before - self.len()
    }
}

/// Session store backed by process memory
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    tables: Arc<RwLock<Tables>>,
    policy: RetentionPolicy,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_policy(RetentionPolicy::default())
    }

    pub fn with_policy(policy: RetentionPolicy) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            policy,
        }
    }

    /// Remove expired records and histories; returns how many were dropped.
    ///
    /// Writes already evict expired entries, so this is only needed to
    /// reclaim memory in a store that has gone idle.
    pub async fn purge_expired(&self) -> usize {
        self.tables.write().await.evict_expired(self.policy.session_ttl)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.evict_expired(self.policy.session_ttl);
        tables
            .sessions
            .insert(record.session_id.clone(), Expiring::now(record.clone()));
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .get(session_id)
            .filter(|entry| !entry.is_expired(self.policy.session_ttl))
            .map(|entry| entry.value.clone()))
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let had_session = tables.sessions.remove(session_id).is_some();
        let had_history = tables.histories.remove(session_id).is_some();
        Ok(had_session || had_history)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<SessionRecord> = tables
            .sessions
            .values()
            .filter(|entry| !entry.is_expired(self.policy.session_ttl))
            .map(|entry| entry.value.clone())
            .collect();

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn get_history(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<StoredMessage>> {
        let tables = self.tables.read().await;
        let history = tables
            .histories
            .get(session_id)
            .filter(|entry| !entry.is_expired(self.policy.session_ttl))
            .map(|entry| entry.value.clone())
            .unwrap_or_default();

        Ok(apply_limit(history, limit))
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.evict_expired(self.policy.session_ttl);

        let mut history = tables
            .histories
            .remove(session_id)
            .map(|entry| entry.value)
            .unwrap_or_default();
        history.push(StoredMessage::new(role, content, metadata));
        self.policy.trim(&mut history);

        tables.histories.insert(session_id.to_string(), Expiring::now(history));
        Ok(())
    }

    async fn clear_history(&self, session_id: &str) -> Result<()> {
        self.tables.write().await.histories.remove(session_id);
        Ok(())
    }
}
