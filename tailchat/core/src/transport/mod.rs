//! Transport Layer
//!
//! The contract between the engine and whatever carries the event stream.
//!
//! # Design Philosophy
//!
//! The engine decides *what* a handshake means (see [`classify_handshake`]);
//! the transport decides *how* to connect, and owns retry policy for transient
//! failures. Once the handshake is accepted, the transport hands back a stream
//! of event payloads and never retries again: a break mid-stream is final.
//!
//! # Implementations
//!
//! - [`HttpTransport`]: reqwest-based Server-Sent Events client
//!
//! Tests drive the engine with scripted transports implementing [`Transport`].

pub mod http;
pub mod retry;
pub mod sse;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

pub use http::{HttpTransport, DEFAULT_CONNECT_TIMEOUT};
pub use retry::RetryConfig;
pub use sse::{SseDecoder, SseEvent};

/// Content type a successful handshake must declare
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// HTTP method used to open the stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// No body; the server derives the turn from the URL or headers
    Get,
    /// Turn payload sent as a JSON body
    #[default]
    Post,
}

impl HttpMethod {
    /// Whether requests with this method carry a body
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post)
    }

    /// Uppercase method name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// Everything needed to open one event stream
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    /// Absolute URL of the streaming endpoint
    pub endpoint: String,
    /// Request method
    pub method: HttpMethod,
    /// Request headers, in order
    pub headers: Vec<(String, String)>,
    /// JSON body (`None` for methods without a body)
    pub body: Option<serde_json::Value>,
}

impl StreamRequest {
    /// Create a request with no headers or body
    pub fn new(endpoint: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Set a header, replacing any existing value (case-insensitive name)
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The parts of a handshake response the engine cares about
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// HTTP status code
    pub status: u16,
    /// Declared content type, if any
    pub content_type: Option<String>,
}

impl HandshakeResponse {
    /// Whether the declared content type is an event stream
    pub fn is_event_stream(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            ct.split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(EVENT_STREAM_CONTENT_TYPE))
        })
    }
}

/// Decides whether a handshake response opens the stream
pub type HandshakeClassifier = fn(&HandshakeResponse) -> Result<()>;

/// The engine's handshake rules
///
/// - 2xx with `text/event-stream` opens the stream
/// - 2xx with any other content type is fatal
/// - 4xx other than 429 is fatal; 429, 5xx and the rest are retriable
pub fn classify_handshake(response: &HandshakeResponse) -> Result<()> {
    if !(200..300).contains(&response.status) {
        return Err(ChatError::Rejected {
            status: response.status,
        });
    }
    if !response.is_event_stream() {
        return Err(ChatError::ContentType {
            found: response.content_type.clone(),
        });
    }
    Ok(())
}

/// Event payloads of an accepted stream, in arrival order
///
/// Ends when the server closes the connection; an `Err` item means the
/// connection broke and nothing more will arrive.
pub type EventStream = BoxStream<'static, Result<String>>;

/// Opens event streams
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Get the transport name (for logging)
    fn name(&self) -> &'static str;

    /// Connect, retrying transient failures, and return the accepted stream
    ///
    /// `classify` is applied to every handshake response; retriable errors
    /// may be retried, and exhausting retries yields
    /// [`ChatError::RetriesExhausted`].
    async fn open(&self, request: StreamRequest, classify: HandshakeClassifier)
        -> Result<EventStream>;
}
