//! Shared test fixtures: a hand-driven transport, a fake viewport, and a
//! minimal HTTP server for exercising the reqwest transport.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tailchat_core::transport::{EventStream, HandshakeClassifier, HandshakeResponse};
use tailchat_core::{anchor_for, ChatError, ChatWidget, StreamRequest, Transport, Viewport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

// ============================================================================
// Manual Transport
// ============================================================================

enum Handshake {
    Respond(HandshakeResponse),
    Fail(ChatError),
}

type Script = (
    oneshot::Receiver<Handshake>,
    mpsc::UnboundedReceiver<Result<String, ChatError>>,
);

#[derive(Default)]
struct ManualState {
    requests: Vec<StreamRequest>,
    scripts: VecDeque<Script>,
}

/// Transport whose exchanges are driven step by step from the test
#[derive(Clone, Default)]
pub struct ManualTransport {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next exchange and get the handle driving it
    pub fn expect_exchange(&self) -> ExchangeHandle {
        let (handshake_tx, handshake_rx) = oneshot::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .unwrap()
            .scripts
            .push_back((handshake_rx, events_rx));
        ExchangeHandle {
            handshake: Some(handshake_tx),
            events: events_tx,
        }
    }

    /// Requests opened so far
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl Transport for ManualTransport {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn open(
        &self,
        request: StreamRequest,
        classify: HandshakeClassifier,
    ) -> Result<EventStream, ChatError> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request);
            state.scripts.pop_front()
        };
        let Some((handshake, events)) = script else {
            return Err(ChatError::Stream("no exchange scripted".into()));
        };
        match handshake.await {
            Ok(Handshake::Respond(response)) => classify(&response)?,
            Ok(Handshake::Fail(error)) => return Err(error),
            Err(_) => return Err(ChatError::Cancelled),
        }
        Ok(UnboundedReceiverStream::new(events).boxed())
    }
}

/// Drives one scripted exchange
pub struct ExchangeHandle {
    handshake: Option<oneshot::Sender<Handshake>>,
    events: mpsc::UnboundedSender<Result<String, ChatError>>,
}

impl ExchangeHandle {
    /// Answer the handshake
    pub fn respond(&mut self, status: u16, content_type: Option<&str>) {
        if let Some(tx) = self.handshake.take() {
            let _ = tx.send(Handshake::Respond(HandshakeResponse {
                status,
                content_type: content_type.map(String::from),
            }));
        }
    }

    /// Accept with an event stream
    pub fn accept(&mut self) {
        self.respond(200, Some("text/event-stream"));
    }

    /// Fail before any response (retries already exhausted by the transport)
    pub fn fail(&mut self, error: ChatError) {
        if let Some(tx) = self.handshake.take() {
            let _ = tx.send(Handshake::Fail(error));
        }
    }

    /// Push one event payload
    pub fn event(&self, payload: &str) {
        let _ = self.events.send(Ok(payload.to_string()));
    }

    /// Push the end-of-stream sentinel
    pub fn done(&self) {
        self.event("[DONE]");
    }

    /// Break the connection mid-stream
    pub fn break_stream(&self, reason: &str) {
        let _ = self.events.send(Err(ChatError::Stream(reason.to_string())));
    }

    /// Close the stream without a sentinel
    pub fn close(self) {
        drop(self);
    }
}

/// Let spawned exchange tasks run
pub async fn let_tasks_run() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Fake Viewport
// ============================================================================

/// Viewport over a simple vertical layout
#[derive(Debug)]
pub struct FakeViewport {
    pub top: f64,
    pub content: f64,
    pub client: f64,
    /// anchor -> (offset, outer height)
    pub anchors: HashMap<String, (f64, f64)>,
}

impl FakeViewport {
    pub fn new(client: f64) -> Self {
        Self {
            top: 0.0,
            content: 0.0,
            client,
            anchors: HashMap::new(),
        }
    }

    /// A user gesture moving the viewport
    pub fn user_scroll_to(&mut self, top: f64) {
        self.set_scroll_top(top);
    }
}

impl Viewport for FakeViewport {
    fn scroll_top(&self) -> f64 {
        self.top
    }
    fn scroll_height(&self) -> f64 {
        self.content
    }
    fn client_height(&self) -> f64 {
        self.client
    }
    fn set_scroll_top(&mut self, top: f64) {
        self.top = top.clamp(0.0, self.max_scroll_top());
    }
    fn anchor_offset(&self, anchor: &str) -> Option<f64> {
        self.anchors.get(anchor).map(|(offset, _)| *offset)
    }
    fn outer_height(&self, anchor: &str) -> Option<f64> {
        self.anchors.get(anchor).map(|(_, height)| *height)
    }
}

/// Base height of a rendered message
pub const MESSAGE_BASE: f64 = 40.0;

/// Lay the widget out into the viewport: each message is `MESSAGE_BASE`
/// plus one unit per visible character; the tail honors its reservation.
pub fn layout<T: Transport>(widget: &mut ChatWidget<T>, viewport: &mut FakeViewport) {
    let heights: Vec<(String, f64)> = widget
        .messages()
        .iter()
        .map(|m| {
            let visible = widget.visible_content(&m.id).unwrap_or_default();
            #[allow(clippy::cast_precision_loss)]
            let height = MESSAGE_BASE + visible.chars().count() as f64;
            (anchor_for(&m.id), height)
        })
        .collect();

    let place = |viewport: &mut FakeViewport, heights: &[(String, f64)]| {
        viewport.anchors.clear();
        let mut y = 0.0;
        for (anchor, height) in heights {
            viewport.anchors.insert(anchor.clone(), (y, *height));
            y += height;
        }
        viewport.content = y;
    };

    place(viewport, &heights);
    let mut heights = heights;
    if let Some((id, min_height)) = widget.reserved_min_height(viewport) {
        let anchor = anchor_for(&id);
        if let Some(entry) = heights.iter_mut().find(|(a, _)| *a == anchor) {
            entry.1 = entry.1.max(min_height);
        }
        place(viewport, &heights);
    }
    let max = viewport.max_scroll_top();
    viewport.top = viewport.top.min(max);
}

// ============================================================================
// Minimal HTTP server
// ============================================================================

/// A canned HTTP response
pub fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n{body}"
    )
}

/// An event-stream response carrying the given raw SSE body
pub fn sse_response(body: &str) -> String {
    http_response("200 OK", "text/event-stream", body)
}

/// Serve one canned response per connection, recording raw requests
pub async fn spawn_server(responses: Vec<String>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    tokio::spawn(async move {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let request = read_request(&mut socket).await;
            recorded.lock().unwrap().push(request);
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}/chat"), requests)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            break;
        };
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buffer).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buffer).to_string()
}

/// Body of a recorded raw request
pub fn request_body(raw: &str) -> &str {
    raw.split_once("\r\n\r\n").map_or("", |(_, body)| body)
}
