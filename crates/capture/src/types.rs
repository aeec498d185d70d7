//! Chat message types shared by the schema variants, the engine and sinks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier used to suppress duplicate emission of the same chat message.
///
/// Keys built from a UI-supplied message id and keys derived from message
/// content live in separate namespaces, so a content key can never collide
/// with a stable one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    /// Key from a stable per-message identifier rendered by the interface.
    pub fn stable(id: impl AsRef<str>) -> Self {
        Self(format!("id:{}", id.as_ref()))
    }

    /// Key derived from sender and text.
    ///
    /// Two distinct messages with identical sender and text produce the same
    /// key and are emitted once.
    pub fn content(sender: &str, text: &str) -> Self {
        Self(format!("content:{sender}\u{1f}{text}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DedupKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message extracted from one DOM node, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageCandidate {
    pub sender_name: String,
    pub sender_id: Option<String>,
    pub text: String,
    pub dedup_key: DedupKey,
}

impl ChatMessageCandidate {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            sender_name: self.sender_name,
            sender_id: self.sender_id,
            text: self.text,
        }
    }
}

/// A chat message forwarded to the event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub text: String,
}

/// Renders the line protocol: `UserID <id>: <text>` when the interface
/// exposed a sender id, `<sender>: <text>` otherwise.
impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sender_id {
            Some(ref id) => write!(f, "UserID {id}: {}", self.text),
            None => write!(f, "{}: {}", self.sender_name, self.text),
        }
    }
}
