//! Stream Ingestion Engine
//!
//! Owns the conversation and the single active exchange. `send` appends the
//! user message and an empty reply placeholder, then spawns the network
//! exchange; `poll` applies whatever the exchange reported since the last
//! call.
//!
//! # Concurrency
//!
//! The engine is driven from one task (the surface's event loop). Exchanges
//! run as spawned tasks that never touch engine state: they only send
//! [`ExchangeEvent`]s over a channel. Every event carries the generation of
//! the exchange that produced it, and `poll` drops events whose generation
//! is not the active one. An exchange that was stopped or superseded can
//! therefore never write into a later turn, however late its events arrive.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::body::{BodyBuilder, DefaultBody, TurnPayload};
use crate::config::RequestConfig;
use crate::error::{ChatError, ErrorClass};
use crate::messages::{ChatUpdate, Message, MessageId, MessageRole};
use crate::status::{Controls, SessionStatus};
use crate::store::MessageStore;
use crate::transport::{classify_handshake, StreamRequest, Transport};

/// What an exchange reports back
#[derive(Debug)]
pub enum ExchangeEventKind {
    /// The handshake was accepted
    Opened,
    /// A non-empty payload arrived
    Delta(String),
    /// The sentinel arrived or the server closed the stream
    Finished,
    /// The exchange failed
    Failed(ChatError),
}

/// An exchange report tagged with its generation
#[derive(Debug)]
pub struct ExchangeEvent {
    /// Generation of the exchange that sent it
    pub generation: u64,
    /// What happened
    pub kind: ExchangeEventKind,
}

/// How a payload is treated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    /// End of stream
    Sentinel,
    /// Nothing to merge
    Empty,
    /// Content to merge
    Delta,
}

/// Classify one event payload
///
/// A payload exactly equal to the sentinel always ends the stream, even if
/// the server meant it as content.
pub fn classify_payload(payload: &str, sentinel: &str) -> PayloadKind {
    if payload == sentinel {
        PayloadKind::Sentinel
    } else if payload.is_empty() {
        PayloadKind::Empty
    } else {
        PayloadKind::Delta
    }
}

/// The connection handle
#[derive(Debug)]
struct ActiveExchange {
    generation: u64,
    reply_id: MessageId,
    task: JoinHandle<()>,
}

/// Conversation owner and exchange driver
pub struct ChatEngine<T: Transport> {
    transport: Arc<T>,
    request: RequestConfig,
    body_builder: Box<dyn BodyBuilder>,
    store: MessageStore,
    status: SessionStatus,
    /// Generation of the most recent exchange
    generation: u64,
    active: Option<ActiveExchange>,
    events_tx: mpsc::UnboundedSender<ExchangeEvent>,
    events_rx: mpsc::UnboundedReceiver<ExchangeEvent>,
    /// Updates not yet handed to the surface
    pending: Vec<ChatUpdate>,
    last_error: Option<ChatError>,
}

impl<T: Transport> ChatEngine<T> {
    /// Create an engine sending turns as described by `request`
    pub fn new(transport: T, request: RequestConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(transport),
            request,
            body_builder: Box::new(DefaultBody),
            store: MessageStore::new(),
            status: SessionStatus::Idle,
            generation: 0,
            active: None,
            events_tx,
            events_rx,
            pending: Vec::new(),
            last_error: None,
        }
    }

    /// Use a custom request body shape
    #[must_use]
    pub fn with_body_builder(mut self, builder: impl BodyBuilder + 'static) -> Self {
        self.body_builder = Box::new(builder);
        self
    }

    // ============================================
    // Operations
    // ============================================

    /// Start a turn
    ///
    /// Returns the new user message's ID, or `None` (and changes nothing) if
    /// the text is blank or an exchange is already in flight.
    pub fn send(&mut self, text: &str) -> Option<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.status.is_busy() {
            tracing::debug!(status = %self.status, "Rejected send while busy");
            return None;
        }
        self.cancel_active();

        let history = self.store.history();
        let user = Message::user(text);
        let user_id = user.id.clone();
        let reply_id = user_id.reply_id();

        if !self.store.append(user) {
            return None;
        }
        self.store
            .open_reply(Message::with_id(reply_id.clone(), MessageRole::Assistant, ""));
        self.last_error = None;
        self.pending.push(ChatUpdate::TurnStarted {
            user_id: user_id.clone(),
            reply_id: reply_id.clone(),
        });
        self.set_status(SessionStatus::Sending);

        let request = self.build_request(TurnPayload {
            current_message: text.to_string(),
            history,
        });

        self.generation += 1;
        let generation = self.generation;
        tracing::debug!(
            generation,
            user_id = %user_id,
            endpoint = %request.endpoint,
            method = %request.method,
            "Starting exchange"
        );

        let task = tokio::spawn(run_exchange(
            Arc::clone(&self.transport),
            request,
            self.request.sentinel.clone(),
            generation,
            self.events_tx.clone(),
        ));
        self.active = Some(ActiveExchange {
            generation,
            reply_id,
            task,
        });

        Some(user_id)
    }

    /// Abort the active exchange, keeping any partial reply
    ///
    /// Returns whether there was anything to stop.
    pub fn stop(&mut self) -> bool {
        let Some(reply_id) = self.cancel_active() else {
            return false;
        };
        self.store.close_reply();
        self.pending.push(ChatUpdate::ReplyFinished {
            message_id: reply_id,
        });
        self.set_status(SessionStatus::Idle);
        true
    }

    /// Load caller-supplied history into an empty conversation
    pub fn replace_all(&mut self, history: Vec<Message>) -> bool {
        if !self.store.replace_all(history) {
            return false;
        }
        let count = self.store.len();
        tracing::debug!(count, "Loaded history");
        self.pending.push(ChatUpdate::HistoryLoaded { count });
        true
    }

    /// Apply everything the exchange reported and drain pending updates
    ///
    /// Non-blocking; call once per frame.
    pub fn poll(&mut self) -> Vec<ChatUpdate> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
        std::mem::take(&mut self.pending)
    }

    /// Wait for the next event from the active exchange, then [`poll`](Self::poll)
    ///
    /// Returns immediately when no exchange is active.
    pub async fn wait(&mut self) -> Vec<ChatUpdate> {
        if self.active.is_some() {
            if let Some(event) = self.events_rx.recv().await {
                self.apply(event);
            }
        }
        self.poll()
    }

    // ============================================
    // Accessors
    // ============================================

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// The message store
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Current session status
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Enabled state of the input controls
    pub fn controls(&self) -> Controls {
        Controls::from(self.status)
    }

    /// Error that ended the last exchange, if it failed
    pub fn last_error(&self) -> Option<&ChatError> {
        self.last_error.as_ref()
    }

    /// Whether an exchange is in flight
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    // ============================================
    // Internals
    // ============================================

    fn build_request(&self, payload: TurnPayload) -> StreamRequest {
        let mut request = StreamRequest::new(self.request.endpoint.clone(), self.request.method)
            .with_header("Content-Type", "application/json");
        for (name, value) in &self.request.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        if self.request.method.has_body() {
            request = request.with_body(self.body_builder.build(&payload));
        }
        request
    }

    /// Abort the active exchange task; returns its reply ID
    fn cancel_active(&mut self) -> Option<MessageId> {
        let active = self.active.take()?;
        active.task.abort();
        tracing::debug!(generation = active.generation, "Exchange cancelled");
        Some(active.reply_id)
    }

    fn apply(&mut self, event: ExchangeEvent) {
        let Some(active) = self
            .active
            .as_ref()
            .filter(|a| a.generation == event.generation)
        else {
            tracing::debug!(
                generation = event.generation,
                current = self.generation,
                "Discarding stale exchange event"
            );
            return;
        };
        let reply_id = active.reply_id.clone();

        match event.kind {
            ExchangeEventKind::Opened => {
                if self.status == SessionStatus::Sending {
                    self.set_status(SessionStatus::Streaming);
                }
            }
            ExchangeEventKind::Delta(text) => {
                if self.store.merge_delta(&text) {
                    self.pending.push(ChatUpdate::Delta {
                        message_id: reply_id,
                        text,
                    });
                }
            }
            ExchangeEventKind::Finished => {
                self.active = None;
                self.store.close_reply();
                self.pending.push(ChatUpdate::ReplyFinished {
                    message_id: reply_id,
                });
                self.set_status(SessionStatus::Idle);
            }
            ExchangeEventKind::Failed(error) => {
                self.active = None;
                self.store.close_reply();
                if error.class() == ErrorClass::Cancelled {
                    tracing::debug!("Exchange ended by cancellation");
                    self.pending.push(ChatUpdate::ReplyFinished {
                        message_id: reply_id,
                    });
                    self.set_status(SessionStatus::Idle);
                    return;
                }
                tracing::warn!(
                    generation = event.generation,
                    reply_id = %reply_id,
                    error = %error,
                    "Exchange failed"
                );
                self.last_error = Some(error.clone());
                self.pending.push(ChatUpdate::ReplyFailed {
                    message_id: reply_id,
                    error,
                });
                self.set_status(SessionStatus::Error);
            }
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status == status {
            return;
        }
        tracing::debug!(from = %self.status, to = %status, "Session status changed");
        self.status = status;
        self.pending.push(ChatUpdate::Status { status });
    }
}

impl<T: Transport> Drop for ChatEngine<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

impl<T: Transport> std::fmt::Debug for ChatEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("transport", &self.transport.name())
            .field("status", &self.status)
            .field("generation", &self.generation)
            .field("messages", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// One network exchange, run as its own task
async fn run_exchange<T: Transport>(
    transport: Arc<T>,
    request: StreamRequest,
    sentinel: String,
    generation: u64,
    tx: mpsc::UnboundedSender<ExchangeEvent>,
) {
    let emit = |kind| tx.send(ExchangeEvent { generation, kind }).is_ok();

    let mut events = match transport.open(request, classify_handshake).await {
        Ok(events) => events,
        Err(error) => {
            emit(ExchangeEventKind::Failed(error));
            return;
        }
    };
    if !emit(ExchangeEventKind::Opened) {
        return;
    }

    while let Some(item) = events.next().await {
        match item {
            Ok(payload) => match classify_payload(&payload, &sentinel) {
                PayloadKind::Sentinel => {
                    emit(ExchangeEventKind::Finished);
                    return;
                }
                PayloadKind::Empty => {}
                PayloadKind::Delta => {
                    if !emit(ExchangeEventKind::Delta(payload)) {
                        // Engine dropped
                        return;
                    }
                }
            },
            Err(error) => {
                emit(ExchangeEventKind::Failed(error));
                return;
            }
        }
    }

    tracing::debug!(generation, "Stream closed without sentinel");
    emit(ExchangeEventKind::Finished);
}
