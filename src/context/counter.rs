//! Token accounting for conversation histories
//!
//! Counts tokens for text and for ordered message sequences the way
//! chat-completion APIs bill them, and answers budget queries.
//!
//! # Algorithm
//!
//! ```text
//! tokens(messages) = Σ (per_message + count(role) + count(content) + count(metadata))
//!                    + reply
//!
//! Defaults: per_message = 4, reply = 3
//! Complexity: O(n) where n = total text length
//! ```

use crate::context::tokenizer::{HeuristicEncoder, TokenEncoder};
use crate::types::Message;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Framing cost charged for every message
pub const PER_MESSAGE_OVERHEAD: usize = 4;

/// Reply preamble cost charged once per sequence
pub const REPLY_OVERHEAD: usize = 3;

/// Budget used when neither the caller nor the configuration supplies one
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 4_000;

/// Clamp a configured (possibly non-positive) budget to a usable one.
///
/// Non-positive budgets mean "keep as little as possible", never an error.
pub fn effective_budget(raw: i64) -> usize {
    if raw <= 0 {
        0
    } else {
        usize::try_from(raw).unwrap_or(usize::MAX)
    }
}

/// Token accountant over a pluggable encoder
#[derive(Debug, Clone)]
pub struct TokenAccountant {
    encoder: Arc<dyn TokenEncoder>,
    per_message_overhead: usize,
    reply_overhead: usize,
    default_budget: usize,
}

impl TokenAccountant {
    /// Create accountant with the heuristic encoder and default overheads
    pub fn new() -> Self {
        Self::with_encoder(Arc::new(HeuristicEncoder::new()))
    }

    /// Create accountant over a specific encoder
    pub fn with_encoder(encoder: Arc<dyn TokenEncoder>) -> Self {
        Self {
            encoder,
            per_message_overhead: PER_MESSAGE_OVERHEAD,
            reply_overhead: REPLY_OVERHEAD,
            default_budget: DEFAULT_MAX_CONTEXT_TOKENS,
        }
    }

    /// Override the per-message and reply overheads
    pub fn with_overheads(mut self, per_message: usize, reply: usize) -> Self {
        self.per_message_overhead = per_message;
        self.reply_overhead = reply;
        self
    }

    /// Override the budget used when callers pass `None`
    pub fn with_default_budget(mut self, budget: usize) -> Self {
        self.default_budget = budget;
        self
    }

    pub fn per_message_overhead(&self) -> usize {
        self.per_message_overhead
    }

    pub fn reply_overhead(&self) -> usize {
        self.reply_overhead
    }

    pub fn default_budget(&self) -> usize {
        self.default_budget
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    /// Resolve an optional per-call budget against the default
    pub fn resolve_budget(&self, budget: Option<usize>) -> usize {
        budget.unwrap_or(self.default_budget)
    }

    /// Count tokens in `text`.
    ///
    /// Never fails: if the encoder errors or panics, the character count
    /// is used as a worst-case estimate.
    pub fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.encoder.count(text))) {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                tracing::warn!(encoder = self.encoder.name(), error = %e, "tokenizer failed, using character count");
                text.chars().count()
            }
            Err(_) => {
                tracing::warn!(encoder = self.encoder.name(), "tokenizer panicked, using character count");
                text.chars().count()
            }
        }
    }

    /// Tokens one message contributes to a sequence, overhead included
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        let mut total = self.per_message_overhead;
        total += self.count_tokens(message.role().as_str());
        total += self.count_tokens(message.content());

        if let Some(metadata) = message.metadata().filter(|m| !m.is_empty()) {
            // BTreeMap keys serialize in order; this cannot fail for JSON values
            let rendered = serde_json::to_string(metadata).unwrap_or_default();
            total += self.count_tokens(&rendered);
        }

        total
    }

    /// Total tokens for an ordered sequence, reply overhead included
    pub fn count_message_sequence_tokens(&self, messages: &[Message]) -> usize {
        let body: usize = messages.iter().map(|m| self.count_message_tokens(m)).sum();
        body + self.reply_overhead
    }

    /// Whether `messages` exceeds `budget` (or the default), plus the count
    pub fn is_over_budget(&self, messages: &[Message], budget: Option<usize>) -> (bool, usize) {
        let budget = self.resolve_budget(budget);
        let current = self.count_message_sequence_tokens(messages);
        (current > budget, current)
    }
}

impl Default for TokenAccountant {
    fn default() -> Self {
        Self::new()
    }
}
