//! File-backed session store
//!
//! Layout inside the storage directory:
//!
//! ```text
//! session_<id>.json   session record
//! history_<id>.json   message history, oldest first
//! ```

use crate::errors::Result;
use crate::session::store::{
    apply_limit, validate_session_id, Expiring, RetentionPolicy, SessionRecord, SessionStore,
    StoredMessage,
};
use crate::types::Metadata;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Session store persisting JSON files to disk
pub struct FileSessionStore {
    storage_dir: PathBuf,
    policy: RetentionPolicy,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    /// Create store, creating the storage directory if it doesn't exist
    pub async fn new(storage_dir: impl Into<PathBuf>, policy: RetentionPolicy) -> Result<Self> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir).await?;

        tracing::debug!(dir = %storage_dir.display(), "file session store ready");

        Ok(Self {
            storage_dir,
            policy,
            write_lock: Mutex::new(()),
        })
    }

    /// Get storage directory
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.storage_dir.join(format!("session_{}.json", session_id))
    }

    fn history_path(&self, session_id: &str) -> PathBuf {
        self.storage_dir.join(format!("history_{}.json", session_id))
    }

    /// Read a stamped value; missing or expired files read as `None`
    async fn read_live<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        let json = match fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stamped: Expiring<T> = serde_json::from_str(&json)?;
        if stamped.is_expired(self.policy.session_ttl) {
            return Ok(None);
        }
        Ok(Some(stamped.value))
    }

    /// Write through a sibling temp file so readers never see a partial file
    async fn write_stamped<T: Serialize>(&self, path: &Path, value: T) -> Result<()> {
        let json = serde_json::to_string_pretty(&Expiring::now(value))?;

        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, json).await?;
        if let Err(e) = fs::rename(&staging, path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete a file, reporting whether it existed
    async fn remove_if_exists(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every session or history file in the directory
    async fn stored_ids(&self, prefix: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.storage_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(filename) = entry.file_name().to_str() {
                if let Some(id) = filename
                    .strip_prefix(prefix)
                    .and_then(|rest| rest.strip_suffix(".json"))
                {
                    ids.push(id.to_string());
                }
            }
        }

        Ok(ids)
    }

    /// Delete files whose TTL has passed; returns how many were removed
    pub async fn purge_expired(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut removed = 0;

        for id in self.stored_ids("session_").await? {
            let path = self.session_path(&id);
            let state = self.read_live::<SessionRecord>(&path).await.map(|r| r.is_some());
            removed += self.purge_if_expired(&path, state).await? as usize;
        }
        for id in self.stored_ids("history_").await? {
            let path = self.history_path(&id);
            let state = self.read_live::<Vec<StoredMessage>>(&path).await.map(|h| h.is_some());
            removed += self.purge_if_expired(&path, state).await? as usize;
        }

        tracing::debug!(removed, "purged expired session files");
        Ok(removed)
    }

    /// Remove `path` only when it read as expired; unreadable files are kept
    async fn purge_if_expired(&self, path: &Path, live: Result<bool>) -> Result<bool> {
        match live {
            Ok(true) => Ok(false),
            Ok(false) => Self::remove_if_exists(path).await,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable session file, not purging");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        validate_session_id(&record.session_id)?;
        let _guard = self.write_lock.lock().await;
        self.write_stamped(&self.session_path(&record.session_id), record).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        validate_session_id(session_id)?;
        self.read_live(&self.session_path(session_id)).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let _guard = self.write_lock.lock().await;

        let had_session = Self::remove_if_exists(&self.session_path(session_id)).await?;
        let had_history = Self::remove_if_exists(&self.history_path(session_id)).await?;
        Ok(had_session || had_history)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let mut sessions = Vec::new();

        for id in self.stored_ids("session_").await? {
            match self.read_live::<SessionRecord>(&self.session_path(&id)).await {
                Ok(Some(record)) => sessions.push(record),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "failed to load session");
                }
            }
        }

        // Sort by creation time
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn get_history(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<StoredMessage>> {
        validate_session_id(session_id)?;
        let history = self
            .read_live::<Vec<StoredMessage>>(&self.history_path(session_id))
            .await?
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
        validate_session_id(session_id)?;
        let _guard = self.write_lock.lock().await;

        let path = self.history_path(session_id);
        let mut history: Vec<StoredMessage> = self.read_live(&path).await?.unwrap_or_default();
        history.push(StoredMessage::new(role, content, metadata));
        self.policy.trim(&mut history);

        self.write_stamped(&path, history).await
    }

    async fn clear_history(&self, session_id: &str) -> Result<()> {
        validate_session_id(session_id)?;
        let _guard = self.write_lock.lock().await;
        Self::remove_if_exists(&self.history_path(session_id)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for FileSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSessionStore")
            .field("storage_dir", &self.storage_dir)
            .field("policy", &self.policy)
            .finish()
    }
}
