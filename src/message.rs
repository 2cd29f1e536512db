//! Conversation messages.
//!
//! A [`Message`] is one turn of a session's conversation: who said it, what
//! was said, and when. Messages are append-only within a session (deleting a
//! session is the only way to drop them) and are the unit the summarizer
//! compresses over.
//!
//! # Examples
//!
//! ```rust
//! use askgraph::message::{Message, Role};
//!
//! let q = Message::user("What is the capital of France?");
//! let a = Message::assistant("Paris.");
//! assert_eq!(q.role, Role::User);
//! assert!(a.is_assistant());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One turn of conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Renders `role: content` for prompt assembly.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role_and_content() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.content, "hello");
        assert!(!m.is_assistant());
    }

    #[test]
    fn serde_round_trip_keeps_role_lowercase() {
        let m = Message::assistant("hi");
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn render_matches_prompt_shape() {
        assert_eq!(Message::user("x").render(), "user: x");
    }
}
