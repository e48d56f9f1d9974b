//! Append-only conversation log.
//!
//! The log owns the message-ordering invariant: the first element is the
//! fixed system prompt, and everything after it strictly alternates
//! user, assistant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Rejected append that would break the ordering invariant
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppendError {
    #[error("expected a {expected} message next, got {got}")]
    OutOfOrder { expected: Role, got: Role },
    #[error("the system prompt is fixed at initialization")]
    DuplicateSystem,
}

/// Ordered, append-only sequence of messages.
///
/// Created with exactly one system message; grows monotonically for the
/// life of the process. `append` is the only public mutator.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Role the invariant admits next
    pub fn expected_role(&self) -> Role {
        match self.messages.last().map(|m| m.role) {
            Some(Role::User) => Role::Assistant,
            // After the system prompt or a completed turn
            _ => Role::User,
        }
    }

    pub fn append(&mut self, message: Message) -> Result<(), AppendError> {
        if message.role == Role::System {
            return Err(AppendError::DuplicateSystem);
        }
        let expected = self.expected_role();
        if message.role != expected {
            return Err(AppendError::OutOfOrder {
                expected,
                got: message.role,
            });
        }
        self.messages.push(message);
        Ok(())
    }

    /// Full ordered sequence, for submission to the generation adapter.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[allow(dead_code)] // Paired with len()
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of completed user/assistant turns
    #[allow(dead_code)] // Log inspection, used in tests
    pub fn turn_count(&self) -> usize {
        (self.messages.len() - 1) / 2
    }

    /// Rollback hook for `Session::abort_turn`. Not part of the public
    /// surface: the log stays append-only from the outside.
    pub(crate) fn truncate(&mut self, len: usize) {
        debug_assert!(len >= 1, "the system message is never removed");
        self.messages.truncate(len.max(1));
    }
}
