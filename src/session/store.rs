//! Session store contract
//!
//! Durable per-session state lives behind [`SessionStore`]: session
//! metadata records and an append-only, oldest-first message history.
//! Backends expire both after a retention period of inactivity.

use crate::errors::{AgentError, Result};
use crate::types::{Message, Metadata, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default time-to-live for session data (7 days)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Default cap on stored messages per session
pub const DEFAULT_MAX_HISTORY_LENGTH: usize = 100;

/// Session metadata record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub message_count: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SessionRecord {
    /// Fresh record with a random v4 id
    pub fn new(user_id: Option<String>, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
            last_active: now,
            message_count: 0,
            metadata,
        }
    }
}

/// A message as persisted by a store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl StoredMessage {
    pub fn new(role: &str, content: &str, metadata: Option<Metadata>) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata: metadata.unwrap_or_default(),
        }
    }
}

impl From<&StoredMessage> for Message {
    fn from(stored: &StoredMessage) -> Self {
        let role = stored.role.parse().unwrap_or(Role::User);
        let message = Message::new(role, stored.content.clone()).at(stored.timestamp);

        if stored.metadata.is_empty() {
            message
        } else {
            message.with_metadata(stored.metadata.clone())
        }
    }
}

/// Retention limits shared by all backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Inactivity period after which data reads as absent
    pub session_ttl: Duration,
    /// Maximum stored messages per session; 0 disables the cap
    pub max_history_length: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            max_history_length: DEFAULT_MAX_HISTORY_LENGTH,
        }
    }
}

impl RetentionPolicy {
    /// Drop the oldest messages beyond the cap
    pub(crate) fn trim(&self, history: &mut Vec<StoredMessage>) {
        if self.max_history_length > 0 && history.len() > self.max_history_length {
            let excess = history.len() - self.max_history_length;
            history.drain(..excess);
        }
    }
}

/// Value stamped with its last write time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Expiring<T> {
    pub written_at: DateTime<Utc>,
    pub value: T,
}

impl<T> Expiring<T> {
    pub fn now(value: T) -> Self {
        Self {
            written_at: Utc::now(),
            value,
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => Utc::now() - self.written_at > ttl,
            // Out-of-range TTL never expires
            Err(_) => false,
        }
    }
}

/// Keep the newest `limit` messages; `None` or `Some(0)` keeps everything
pub(crate) fn apply_limit(mut history: Vec<StoredMessage>, limit: Option<usize>) -> Vec<StoredMessage> {
    if let Some(limit) = limit.filter(|l| *l > 0) {
        let start = history.len().saturating_sub(limit);
        history.drain(..start);
    }
    history
}

/// Reject ids that could escape a key namespace or directory
pub(crate) fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(AgentError::StoreError(format!("invalid session id: {:?}", session_id)))
    }
}

/// Key-value backend for sessions and their histories.
///
/// Unknown ids are not errors: reads return `None` or an empty history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Insert or replace a session record, refreshing its TTL
    async fn save_session(&self, record: &SessionRecord) -> Result<()>;

    /// Fetch a session record
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Remove a session record and its history; `true` if anything existed
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    /// All live session records
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>>;

    /// History oldest-first, optionally only the newest `limit` messages
    async fn get_history(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<StoredMessage>>;

    /// Append one message, refreshing the history TTL
    async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<()>;

    /// Drop a session's history, keeping its record
    async fn clear_history(&self, session_id: &str) -> Result<()>;
}
