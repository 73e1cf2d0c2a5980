//! Session persistence
//!
//! Components:
//! - Store contract: records + append-only histories behind `SessionStore`
//! - In-memory backend: process-local, for tests and single-node use
//! - File backend: JSON files in a storage directory
//! - Manager: session lifecycle and the turn-level read/append contract

pub mod store;
pub mod in_memory;
pub mod persistence;
pub mod manager;

// Re-export key types
pub use store::{RetentionPolicy, SessionRecord, SessionStore, StoredMessage};
pub use in_memory::InMemorySessionStore;
pub use persistence::FileSessionStore;
pub use manager::SessionManager;
