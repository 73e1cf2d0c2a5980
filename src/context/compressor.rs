//! Context compression under a token budget
//!
//! Produces a read-time view of a conversation history that fits the
//! budget, preferring the most recent messages:
//!
//! ```text
//! 1. Budget check:  tokens(M) ≤ B  ⇒  return M unchanged
//! 2. Recency window: longest suffix S of M with tokens(S) ≤ B
//! 3. Fallback (S empty or still over B):
//!      P = system(M') ∪ last 10 non-system(M')     (M' = S, or M if S empty)
//!      tokens(P) > B  ⇒  P = last 5 of P
//! ```
//!
//! The output is always a subsequence of the input in the original order.
//! Stage 3 bounds the message count, not the token count: five oversized
//! messages are returned as-is.
//!
//! Complexity: O(n) tokenizations for n input messages.

use crate::context::counter::TokenAccountant;
use crate::types::{Message, Role};
use serde::Serialize;
use std::collections::BTreeMap;

/// Most recent non-system messages kept by the fallback stage
pub const SUMMARY_RECENT_MESSAGES: usize = 10;

/// Hard cap applied when the fallback selection is still over budget
pub const LAST_RESORT_MESSAGES: usize = 5;

/// Budget ratio at which a history is reported as near its limit
pub const DEFAULT_COMPRESSION_THRESHOLD: f64 = 0.8;

/// Context compressor over a token accountant
#[derive(Debug, Clone)]
pub struct ContextCompressor {
    accountant: TokenAccountant,
    threshold: f64,
}

impl ContextCompressor {
    /// Create new context compressor
    pub fn new(accountant: TokenAccountant) -> Self {
        Self {
            accountant,
            threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }

    /// Override the near-limit threshold reported by [`Self::context_stats`]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn accountant(&self) -> &TokenAccountant {
        &self.accountant
    }

    /// Check if compression is needed
    pub fn needs_compression(&self, messages: &[Message], budget: Option<usize>) -> bool {
        self.accountant.is_over_budget(messages, budget).0
    }

    /// Reduce `messages` to fit `budget` (or the accountant's default).
    ///
    /// Never fails and never mutates the input; identity on compliant input.
    pub fn compress(&self, messages: &[Message], budget: Option<usize>) -> Vec<Message> {
        let budget = self.accountant.resolve_budget(budget);
        let (over_budget, current_tokens) = self.accountant.is_over_budget(messages, Some(budget));

        if !over_budget {
            return messages.to_vec();
        }

        tracing::info!(current_tokens, budget, messages = messages.len(), "context over budget, compressing");

        let recent = self.keep_recent(messages, budget);
        tracing::debug!(kept = recent.len(), "recency window applied");

        let compressed = if recent.is_empty() || self.accountant.is_over_budget(&recent, Some(budget)).0 {
            let source = if recent.is_empty() { messages } else { &recent[..] };
            let pinned = self.pin_system_and_recent(source, budget);
            tracing::debug!(kept = pinned.len(), "fallback selection applied");
            pinned
        } else {
            recent
        };

        let final_tokens = self.accountant.count_message_sequence_tokens(&compressed);
        tracing::info!(
            before = current_tokens,
            after = final_tokens,
            messages = compressed.len(),
            "context compression complete"
        );

        compressed
    }

    /// Compress and report what changed
    pub fn compress_with_stats(&self, messages: &[Message], budget: Option<usize>) -> (Vec<Message>, CompressionStats) {
        let compressed = self.compress(messages, budget);
        let stats = self.compression_stats(messages, &compressed);
        (compressed, stats)
    }

    /// Longest suffix whose sequence count stays within `budget`.
    ///
    /// Sequence counts are additive, so a running total replaces
    /// re-counting the candidate after every prepend.
    fn keep_recent(&self, messages: &[Message], budget: usize) -> Vec<Message> {
        let mut running = self.accountant.reply_overhead();
        let mut start = messages.len();

        for (index, message) in messages.iter().enumerate().rev() {
            let cost = self.accountant.count_message_tokens(message);
            if running + cost > budget {
                break;
            }
            running += cost;
            start = index;
        }

        messages[start..].to_vec()
    }

    /// System messages plus the most recent non-system ones, in source
    /// order; cut to the last few if that still exceeds `budget`
    fn pin_system_and_recent(&self, source: &[Message], budget: usize) -> Vec<Message> {
        let mut remaining = SUMMARY_RECENT_MESSAGES;
        let mut pinned: Vec<Message> = Vec::new();

        for message in source.iter().rev() {
            if message.is_system() {
                pinned.push(message.clone());
            } else if remaining > 0 {
                remaining -= 1;
                pinned.push(message.clone());
            }
        }
        pinned.reverse();

        if self.accountant.is_over_budget(&pinned, Some(budget)).0 {
            let start = pinned.len().saturating_sub(LAST_RESORT_MESSAGES);
            pinned.drain(..start);
        }

        pinned
    }

    /// Get compression statistics
    pub fn compression_stats(&self, before: &[Message], after: &[Message]) -> CompressionStats {
        let tokens_before = self.accountant.count_message_sequence_tokens(before);
        let tokens_after = self.accountant.count_message_sequence_tokens(after);
        let entries_before = before.len();
        let entries_after = after.len();

        let token_reduction = tokens_before.saturating_sub(tokens_after);
        let entry_reduction = entries_before.saturating_sub(entries_after);

        let token_reduction_percent = if tokens_before > 0 {
            (token_reduction as f64 / tokens_before as f64) * 100.0
        } else {
            0.0
        };

        CompressionStats {
            tokens_before,
            tokens_after,
            token_reduction,
            token_reduction_percent,
            entries_before,
            entries_after,
            entry_reduction,
        }
    }

    /// Summarize a history against `budget` (or the default)
    pub fn context_stats(&self, messages: &[Message], budget: Option<usize>) -> ContextStats {
        let budget = self.accountant.resolve_budget(budget);
        let total_tokens = self.accountant.count_message_sequence_tokens(messages);

        let mut role_counts = BTreeMap::new();
        for message in messages {
            *role_counts.entry(message.role()).or_insert(0) += 1;
        }

        let budget_ratio = total_tokens as f64 / budget.max(1) as f64;

        ContextStats {
            total_tokens,
            message_count: messages.len(),
            role_counts,
            budget,
            is_over_budget: total_tokens > budget,
            budget_ratio,
            near_limit: budget_ratio >= self.threshold,
        }
    }
}

impl Default for ContextCompressor {
    fn default() -> Self {
        Self::new(TokenAccountant::new())
    }
}

/// Compression statistics
#[derive(Debug, Clone, Serialize)]
pub struct CompressionStats {
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub token_reduction: usize,
    pub token_reduction_percent: f64,
    pub entries_before: usize,
    pub entries_after: usize,
    pub entry_reduction: usize,
}

/// Budget usage snapshot of a history
#[derive(Debug, Clone, Serialize)]
pub struct ContextStats {
    pub total_tokens: usize,
    pub message_count: usize,
    pub role_counts: BTreeMap<Role, usize>,
    pub budget: usize,
    pub is_over_budget: bool,
    pub budget_ratio: f64,
    /// Ratio at or above the compression threshold
    pub near_limit: bool,
}
