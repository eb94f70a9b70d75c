//! Session Status
//!
//! The four-state machine derived from engine activity. Only the engine moves
//! between states; surfaces read the status to gate input.
//!
//! ```text
//!            send()                handshake ok
//!   Idle ─────────────▶ Sending ─────────────────▶ Streaming
//!    ▲  ▲                  │ fatal                   │   │
//!    │  │ stop()/sentinel  ▼                         │   │ fatal
//!    │  └─────────────── Error ◀─────────────────────┼───┘
//!    └───────────────────────────────────────────────┘ sentinel / stop()
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of the chat session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No connection; input enabled
    #[default]
    Idle,
    /// Connection requested, awaiting a successful handshake
    Sending,
    /// Handshake confirmed; deltas are merging
    Streaming,
    /// The last exchange ended abnormally; input re-enabled
    Error,
}

impl SessionStatus {
    /// Whether a new message may be submitted
    pub fn accepts_input(self) -> bool {
        !self.is_busy()
    }

    /// Whether an exchange is in flight
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    /// Whether the stop control is meaningful
    pub fn can_stop(self) -> bool {
        self.is_busy()
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enabled state of the input controls for the current status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    /// Text entry and the send action
    pub send_enabled: bool,
    /// The stop action
    pub stop_enabled: bool,
}

impl From<SessionStatus> for Controls {
    fn from(status: SessionStatus) -> Self {
        Self {
            send_enabled: status.accepts_input(),
            stop_enabled: status.can_stop(),
        }
    }
}
