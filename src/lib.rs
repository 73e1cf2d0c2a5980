//! OnboardBuddy - Conversation memory for an onboarding chat assistant
//!
//! Keeps multi-turn chat history per session and decides, each turn, which
//! messages fit the model's token budget.
//!
//! # Architecture
//!
//! - **context**: token accounting and budget-driven compression (pure)
//! - **session**: session records and histories behind a pluggable store
//! - **agent**: the per-turn load → compress → append flow
//! - **config** / **cli**: TOML configuration and the command-line front end

pub mod errors;
pub mod types;
pub mod context;
pub mod session;
pub mod agent;
pub mod config;
pub mod cli;

// Re-export commonly used types
pub use errors::{AgentError, Result};
pub use types::{Message, Role};
pub use context::{ContextCompressor, TokenAccountant};
pub use agent::ConversationMemory;
