//! Initial history
//!
//! Loads a conversation to mount at startup from a JSON array of
//! `{ "id"?, "role", "content" }` objects. Messages without an id get a
//! fresh one.

use std::path::Path;

use anyhow::Context;
use tailchat_core::Message;

/// Read a history file
pub fn load_history(path: &Path) -> anyhow::Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    let messages: Vec<Message> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid history file {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        count = messages.len(),
        "Loaded initial history"
    );
    Ok(messages)
}
