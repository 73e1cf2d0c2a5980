//! Agent-side conversation handling
//!
//! Wires session storage and context compression into the per-turn flow.

pub mod memory;

pub use memory::ConversationMemory;
