//! Server-Sent Events decoding
//!
//! Incremental decoder for the `text/event-stream` wire format. Bytes arrive
//! in arbitrary chunks; lines are split on raw bytes (so a multi-byte
//! character split across chunks is reassembled) and only complete lines
//! are decoded as UTF-8.
//!
//! ```text
//! : comment                 ignored
//! event: delta              event type
//! id: 17                    last event id
//! retry: 3000               reconnection hint (ms)
//! data: first line          data lines joined with '\n'
//! data: second line
//!                           blank line dispatches the event
//! ```

/// A decoded event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type (`None` means the default `message` type)
    pub event: Option<String>,
    /// Payload (data lines joined with `\n`)
    pub data: String,
    /// Last event ID, if the server set one
    pub id: Option<String>,
    /// Reconnection time hint in milliseconds
    pub retry: Option<u64>,
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes not yet terminated by a line ending
    buffer: Vec<u8>,
    /// Event being assembled
    pending: SseEvent,
    /// Whether any `data` field was seen for the pending event
    has_data: bool,
    /// Last ID seen (persists across events)
    last_id: Option<String>,
}

impl SseDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            // A trailing CR may be the first half of CRLF
            let skip = if self.buffer[pos] == b'\r' {
                match self.buffer.get(pos + 1) {
                    Some(b'\n') => 2,
                    Some(_) => 1,
                    None => break,
                }
            } else {
                1
            };
            let line: Vec<u8> = self.buffer.drain(..pos + skip).take(pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Signal end of input
    ///
    /// An event not terminated by a blank line is discarded. Returns any event
    /// completed by a final bare CR.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.buffer.last() == Some(&b'\r') {
            self.buffer.pop();
            let line: Vec<u8> = std::mem::take(&mut self.buffer);
            if let Some(event) = self.process_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        if self.has_data || !self.buffer.is_empty() {
            tracing::debug!(
                partial_bytes = self.buffer.len(),
                "Discarding unterminated event at end of stream"
            );
        }
        self.buffer.clear();
        self.reset_pending();
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.pending.data.push('\n');
                }
                self.pending.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.pending.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.pending.retry = Some(ms);
                }
            }
            other => tracing::trace!(field = other, "Ignoring unknown SSE field"),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.reset_pending();
            return None;
        }
        let mut event = std::mem::take(&mut self.pending);
        event.id.clone_from(&self.last_id);
        self.has_data = false;
        Some(event)
    }

    fn reset_pending(&mut self) {
        self.pending = SseEvent::default();
        self.has_data = false;
    }
}
