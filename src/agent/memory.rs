//! Multi-turn conversation memory
//!
//! Per user turn:
//! 1. `prepare_context`: load the session history and compress it to the
//!    budget. Read-only; the stored history is never replaced by the
//!    compressed view.
//! 2. Caller invokes the model with that context.
//! 3. `record_turn`: append the user message, then the assistant reply.
//!
//! Callers serialize turns per session; nothing here locks a session.

use crate::context::{CompressionStats, ContextCompressor, ContextStats};
use crate::session::SessionManager;
use crate::types::{to_chat_messages, ChatMessage, Message, Metadata, Role};

/// Conversation memory over a session manager and a compressor
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    sessions: SessionManager,
    compressor: ContextCompressor,
}

impl ConversationMemory {
    pub fn new(sessions: SessionManager, compressor: ContextCompressor) -> Self {
        Self { sessions, compressor }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn compressor(&self) -> &ContextCompressor {
        &self.compressor
    }

    /// Full stored history as typed messages
    pub async fn load_history(&self, session_id: &str, limit: Option<usize>) -> Vec<Message> {
        self.sessions
            .get_conversation_history(session_id, limit)
            .await
            .iter()
            .map(Message::from)
            .collect()
    }

    /// Budget-compliant context for the next model call
    pub async fn prepare_context(&self, session_id: &str, budget: Option<usize>) -> Vec<Message> {
        let (context, _) = self.prepare_context_with_stats(session_id, budget).await;
        context
    }

    /// Like [`Self::prepare_context`], also reporting what was dropped
    pub async fn prepare_context_with_stats(
        &self,
        session_id: &str,
        budget: Option<usize>,
    ) -> (Vec<Message>, CompressionStats) {
        let history = self.load_history(session_id, None).await;
        let (context, stats) = self.compressor.compress_with_stats(&history, budget);

        if stats.entry_reduction > 0 {
            tracing::debug!(
                session_id,
                dropped = stats.entry_reduction,
                tokens = stats.tokens_after,
                "older context left out of this turn"
            );
        }

        (context, stats)
    }

    /// Compressed context, prefixed with a system prompt, ready to send
    pub async fn prepare_chat_messages(
        &self,
        session_id: &str,
        system_prompt: Option<&str>,
        budget: Option<usize>,
    ) -> Vec<ChatMessage> {
        let mut chat = Vec::new();
        if let Some(prompt) = system_prompt {
            chat.push(ChatMessage {
                role: Role::System,
                content: prompt.to_string(),
            });
        }
        chat.extend(to_chat_messages(&self.prepare_context(session_id, budget).await));
        chat
    }

    /// Persist one completed turn: user message, then assistant reply.
    ///
    /// The reply is only stored if the user message was.
    pub async fn record_turn(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
        metadata: Option<Metadata>,
    ) -> bool {
        if !self.sessions.add_message(session_id, Role::User, user_message, None).await {
            return false;
        }
        self.sessions
            .add_message(session_id, Role::Assistant, assistant_message, metadata)
            .await
    }

    /// Budget usage of the stored history
    pub async fn context_stats(&self, session_id: &str, budget: Option<usize>) -> ContextStats {
        let history = self.load_history(session_id, None).await;
        self.compressor.context_stats(&history, budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TokenAccountant;
    use crate::session::InMemorySessionStore;
    use std::sync::Arc;

    fn memory(default_budget: usize) -> ConversationMemory {
        let sessions = SessionManager::new(Arc::new(InMemorySessionStore::new()));
        let compressor = ContextCompressor::new(TokenAccountant::new().with_default_budget(default_budget));
        ConversationMemory::new(sessions, compressor)
    }

    #[tokio::test]
    async fn test_record_and_prepare() {
        let memory = memory(4000);
        let id = memory.sessions().create_session(Some("carol"), None).await.unwrap();

        assert!(memory.record_turn(&id, "What's the wifi password?", "Ask IT for a guest token.", None).await);

        let context = memory.prepare_context(&id, None).await;
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role(), Role::User);
        assert_eq!(context[1].role(), Role::Assistant);
        assert_eq!(memory.sessions().get_session(&id).await.unwrap().unwrap().message_count, 2);
    }

    #[tokio::test]
    async fn test_compression_does_not_touch_storage() {
        let memory = memory(40);
        let id = memory.sessions().create_session(None, None).await.unwrap();
        for i in 0..10 {
            memory
                .record_turn(&id, &format!("question {}", i), &format!("answer {}", i), None)
                .await;
        }

        let (context, stats) = memory.prepare_context_with_stats(&id, None).await;
        assert!(context.len() < 20);
        assert!(stats.entry_reduction > 0);
        assert_eq!(context.last().unwrap().content(), "answer 9");

        // Stored history is untouched
        assert_eq!(memory.load_history(&id, None).await.len(), 20);
    }

    #[tokio::test]
    async fn test_prepare_chat_messages_with_prompt() {
        let memory = memory(4000);
        let id = memory.sessions().create_session(None, None).await.unwrap();
        memory.record_turn(&id, "hi", "hello", None).await;

        let chat = memory.prepare_chat_messages(&id, Some("You are the onboarding assistant."), None).await;
        assert_eq!(chat.len(), 3);
        assert_eq!(chat[0].role, Role::System);
        assert_eq!(chat[2].content, "hello");
    }

    #[tokio::test]
    async fn test_unknown_session_gives_empty_context() {
        let memory = memory(4000);
        assert!(memory.prepare_context("ghost", Some(100)).await.is_empty());

        let stats = memory.context_stats("ghost", Some(100)).await;
        assert_eq!(stats.message_count, 0);
        assert_eq!(stats.total_tokens, 3);
    }
}
