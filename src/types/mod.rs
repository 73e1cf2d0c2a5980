//! Type definitions module
//!
//! Core message types for conversation memory.

pub mod messages;

// Re-export commonly used types
pub use messages::{to_chat_messages, ChatMessage, Message, Metadata, Role};
