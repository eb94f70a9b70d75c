//! Error types for chat exchanges
//!
//! Every failure of an exchange is a [`ChatError`]; its [`ErrorClass`] decides
//! what happens next. Retriable errors are handled inside the transport and
//! only reach the engine wrapped in [`ChatError::RetriesExhausted`].

use thiserror::Error;

/// How an error affects the session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Ends the turn in the `Error` status; partial content is kept
    Fatal,
    /// Transient; the transport may try again
    Retriable,
    /// Caller-initiated abort; a clean return to `Idle`
    Cancelled,
}

/// Errors that can end (or delay) a chat exchange
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    /// The server answered the handshake with a non-success status
    #[error("server rejected the request with HTTP {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },

    /// The server answered with success but not with an event stream
    #[error("expected text/event-stream, got {}", found.as_deref().unwrap_or("no content type"))]
    ContentType {
        /// The declared content type, if any
        found: Option<String>,
    },

    /// The connection could not be established (before any response headers)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection broke after the stream started
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// Retriable failures persisted past the retry budget
    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// The last retriable error seen
        last: Box<ChatError>,
    },

    /// The request could not be built (endpoint, method or headers)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP client could not be constructed
    #[error("http client error: {0}")]
    Client(String),

    /// The exchange was aborted by the caller
    #[error("exchange cancelled")]
    Cancelled,
}

impl ChatError {
    /// Classify a non-success handshake status
    ///
    /// 4xx other than 429 is the caller's fault and will not change on retry.
    pub fn status_class(status: u16) -> ErrorClass {
        if (400..500).contains(&status) && status != 429 {
            ErrorClass::Fatal
        } else {
            ErrorClass::Retriable
        }
    }

    /// How this error affects the session
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Rejected { status } => Self::status_class(*status),
            Self::Connect(_) => ErrorClass::Retriable,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::ContentType { .. }
            | Self::Stream(_)
            | Self::RetriesExhausted { .. }
            | Self::InvalidRequest(_)
            | Self::Client(_) => ErrorClass::Fatal,
        }
    }

    /// Whether the transport may retry after this error
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::Retriable
    }

    /// Whether this error is a caller-initiated abort
    pub fn is_cancelled(&self) -> bool {
        self.class() == ErrorClass::Cancelled
    }
}

/// Result type for chat exchanges
pub type Result<T> = std::result::Result<T, ChatError>;
