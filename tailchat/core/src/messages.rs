//! Conversation Messages
//!
//! The data model shared by the store, the engine and every rendering surface:
//! message identity, roles, the message record itself, and the updates the
//! engine publishes to surfaces as a turn progresses.
//!
//! # Design Philosophy
//!
//! Surfaces are pure renderers. They read messages from the engine and react to
//! [`ChatUpdate`]s; they never mutate the conversation themselves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::status::SessionStatus;

/// Prefix of the addressable anchor of a rendered message
pub const ANCHOR_PREFIX: &str = "msg-";

/// Message identifier
///
/// Opaque and stable for the lifetime of the message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// ID of the assistant reply elicited by this (user) message
    pub fn reply_id(&self) -> Self {
        Self(format!("{}_assistant", self.0))
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Addressable anchor of a rendered message (`"msg-" + id`)
///
/// The scroll controller and external callers locate rendered messages by
/// this name.
pub fn anchor_for(id: &MessageId) -> String {
    format!("{ANCHOR_PREFIX}{}", id.0)
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Streamed server reply
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    #[serde(default)]
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    #[serde(default)]
    pub content: String,
}

impl Message {
    /// Create a message with a fresh ID
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
        }
    }

    /// Create a message with a caller-chosen ID
    pub fn with_id(id: impl Into<MessageId>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Anchor of this message when rendered
    pub fn anchor(&self) -> String {
        anchor_for(&self.id)
    }
}

/// One prior message as sent to the server (no identity)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who sent it
    pub role: MessageRole,
    /// What was said
    pub content: String,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Updates published by the engine to rendering surfaces
#[derive(Clone, Debug, PartialEq)]
pub enum ChatUpdate {
    // ============================================
    // Turn Lifecycle
    // ============================================
    /// A user message and its empty reply placeholder were appended
    TurnStarted {
        /// The new user message
        user_id: MessageId,
        /// The placeholder that will receive deltas
        reply_id: MessageId,
    },

    /// Session status changed
    Status {
        /// The new status
        status: SessionStatus,
    },

    /// A delta was merged into the open reply
    Delta {
        /// Reply that grew
        message_id: MessageId,
        /// The merged text
        text: String,
    },

    /// The reply ended normally (sentinel, server close, or stop)
    ReplyFinished {
        /// Reply that ended
        message_id: MessageId,
    },

    /// The reply ended with a fatal error; partial content is kept
    ReplyFailed {
        /// Reply that failed
        message_id: MessageId,
        /// What went wrong
        error: ChatError,
    },

    // ============================================
    // Conversation
    // ============================================
    /// Caller-supplied history was loaded into an empty conversation
    HistoryLoaded {
        /// Number of messages loaded
        count: usize,
    },
}

impl ChatUpdate {
    /// Whether this update made the conversation tail taller
    pub fn grows_tail(&self) -> bool {
        matches!(self, Self::Delta { .. } | Self::TurnStarted { .. })
    }
}
