//! Request Body Construction
//!
//! Every turn is described by a [`TurnPayload`]: the text just submitted and
//! the conversation before it. Servers that expect a different shape plug in
//! a [`BodyBuilder`]; without one the payload is sent as-is.

use serde::{Deserialize, Serialize};

use crate::messages::HistoryEntry;

/// What the server is told about a turn
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnPayload {
    /// The text the user just submitted
    pub current_message: String,
    /// The conversation before this turn
    pub history: Vec<HistoryEntry>,
}

/// Maps a turn to the JSON body the server expects
pub trait BodyBuilder: Send + Sync {
    /// Build the request body for a turn
    fn build(&self, payload: &TurnPayload) -> serde_json::Value;
}

impl<F> BodyBuilder for F
where
    F: Fn(&TurnPayload) -> serde_json::Value + Send + Sync,
{
    fn build(&self, payload: &TurnPayload) -> serde_json::Value {
        self(payload)
    }
}

/// Sends the payload verbatim: `{"currentMessage": .., "history": [..]}`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultBody;

impl BodyBuilder for DefaultBody {
    fn build(&self, payload: &TurnPayload) -> serde_json::Value {
        serde_json::to_value(payload).unwrap_or_default()
    }
}
