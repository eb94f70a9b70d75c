//! Message Store
//!
//! The ordered conversation for one widget instance. Messages are appended,
//! never removed; only the open assistant reply grows, and only while it is
//! the last message.

use std::collections::HashSet;

use crate::messages::{HistoryEntry, Message, MessageId, MessageRole};

/// Ordered conversation with at most one open reply
#[derive(Clone, Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// Reply currently receiving deltas (if any)
    open_reply: Option<MessageId>,
    /// Bumped on every mutation
    revision: u64,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the conversation
    ///
    /// Returns `false` (and changes nothing) if a message with the same ID
    /// already exists.
    pub fn append(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            tracing::warn!(id = %message.id, "Rejected duplicate message id");
            return false;
        }
        self.messages.push(message);
        self.revision += 1;
        true
    }

    /// Append an assistant placeholder and mark it as the open reply
    pub fn open_reply(&mut self, message: Message) -> bool {
        debug_assert_eq!(message.role, MessageRole::Assistant);
        let id = message.id.clone();
        if !self.append(message) {
            return false;
        }
        self.open_reply = Some(id);
        true
    }

    /// Merge a delta into the open reply
    ///
    /// Only applies when the last message is the open assistant reply and the
    /// text is non-empty; anything else is a silent no-op. Returns whether the
    /// content changed.
    pub fn merge_delta(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let Some(open) = self.open_reply.as_ref() else {
            return false;
        };
        match self.messages.last_mut() {
            Some(last) if last.role == MessageRole::Assistant && &last.id == open => {
                last.content.push_str(text);
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    /// Close the open reply; later deltas are ignored
    pub fn close_reply(&mut self) -> Option<MessageId> {
        self.open_reply.take()
    }

    /// Replace the conversation with caller-supplied history
    ///
    /// Only permitted while the store is empty. Later duplicates of an ID are
    /// dropped. Returns whether the history was loaded.
    pub fn replace_all(&mut self, history: Vec<Message>) -> bool {
        if !self.messages.is_empty() {
            tracing::debug!(
                existing = self.messages.len(),
                "Ignoring history for non-empty conversation"
            );
            return false;
        }
        let mut seen = HashSet::with_capacity(history.len());
        self.messages = history
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        self.open_reply = None;
        self.revision += 1;
        true
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by ID
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Whether a message with this ID exists
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// The last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// ID of the open reply
    pub fn open_reply_id(&self) -> Option<&MessageId> {
        self.open_reply.as_ref()
    }

    /// Whether `id` is the open reply
    pub fn is_open(&self, id: &MessageId) -> bool {
        self.open_reply.as_ref() == Some(id)
    }

    /// Role/content snapshot of the conversation, as sent to the server
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(HistoryEntry::from).collect()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Monotonic mutation counter
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
