//! Conversation message types
//!
//! Defines the typed message that flows through token accounting and
//! compression, plus the coercion applied where untyped JSON enters.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Structured per-message metadata.
///
/// Ordered so that stringifying it for token accounting is deterministic.
pub type Metadata = BTreeMap<String, Value>;

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Wire name of the role as chat-completion APIs expect it
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A single conversation message. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Replace the timestamp (used when rehydrating stored history)
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Coerce an untyped JSON message into a typed one.
    ///
    /// Never fails:
    /// - unknown or missing `role` becomes `user`
    /// - non-string `content` is stringified, missing content is empty
    /// - `timestamp` accepts RFC 3339, naive ISO 8601 (read as UTC) or unix
    ///   seconds; anything else is the unix epoch
    /// - non-object `metadata` is wrapped under a `"value"` key
    pub fn from_value(value: &Value) -> Self {
        let role = value
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok())
            .unwrap_or(Role::User);

        let content = value.get("content").map(stringify).unwrap_or_default();

        let timestamp = value
            .get("timestamp")
            .and_then(parse_timestamp)
            .unwrap_or_default();

        let metadata = match value.get("metadata") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            Some(other) => {
                let mut map = Metadata::new();
                map.insert("value".to_string(), other.clone());
                Some(map)
            }
        };

        Self {
            role,
            content,
            timestamp,
            metadata,
        }
    }

    /// Strip everything but role and content for a model call
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Role/content pair as sent to a chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Format a history for the downstream model call
pub fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(Message::to_chat_message).collect()
}

/// Render any JSON value as text: strings verbatim, null as empty
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("narrator".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::assistant("Welcome aboard!");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "Welcome aboard!");
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_from_value_well_formed() {
        let value = json!({
            "role": "system",
            "content": "You help new hires.",
            "timestamp": "2024-03-01T09:30:00Z",
            "metadata": {"source": "prompt"}
        });

        let msg = Message::from_value(&value);
        assert_eq!(msg.role(), Role::System);
        assert_eq!(msg.content(), "You help new hires.");
        assert_eq!(msg.timestamp().to_rfc3339(), "2024-03-01T09:30:00+00:00");
        assert_eq!(msg.metadata().unwrap()["source"], "prompt");
    }

    #[test]
    fn test_from_value_coerces_malformed_fields() {
        let value = json!({
            "role": 42,
            "content": {"text": "hi"},
            "timestamp": "yesterday",
            "metadata": [1, 2]
        });

        let msg = Message::from_value(&value);
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), r#"{"text":"hi"}"#);
        assert_eq!(msg.timestamp(), DateTime::<Utc>::default());
        assert_eq!(msg.metadata().unwrap()["value"], json!([1, 2]));
    }

    #[test]
    fn test_from_value_missing_fields() {
        let msg = Message::from_value(&json!({}));
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), "");
        assert!(msg.metadata().is_none());
    }

    #[test]
    fn test_from_value_naive_iso_timestamp() {
        let msg = Message::from_value(&json!({
            "role": "user",
            "content": "hello",
            "timestamp": "2024-03-01T09:30:00.123456"
        }));
        assert_eq!(msg.timestamp().timestamp(), 1_709_285_400);
    }

    #[test]
    fn test_chat_messages_strip_metadata() {
        let mut meta = Metadata::new();
        meta.insert("tool".to_string(), json!("leave_balance"));
        let history = vec![
            Message::user("How many leave days do I have?"),
            Message::assistant("You have 12 days left.").with_metadata(meta),
        ];

        let chat = to_chat_messages(&history);
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[1], ChatMessage {
            role: Role::Assistant,
            content: "You have 12 days left.".to_string(),
        });
    }
}
