//! Context management module
//!
//! Handles tokenization, token accounting and budget-driven compression.

pub mod tokenizer;
pub mod counter;
pub mod compressor;

// Re-export commonly used types
pub use tokenizer::{HeuristicEncoder, HfEncoder, TokenEncoder};
pub use counter::{effective_budget, TokenAccountant};
pub use counter::{DEFAULT_MAX_CONTEXT_TOKENS, PER_MESSAGE_OVERHEAD, REPLY_OVERHEAD};
pub use compressor::{CompressionStats, ContextCompressor, ContextStats};
pub use compressor::{DEFAULT_COMPRESSION_THRESHOLD, LAST_RESORT_MESSAGES, SUMMARY_RECENT_MESSAGES};
