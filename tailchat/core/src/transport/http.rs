//! HTTP event-stream transport
//!
//! Opens Server-Sent Events streams with reqwest. Handshake failures the
//! classifier marks retriable are retried with exponential backoff; once a
//! stream is accepted, bytes are decoded by [`SseDecoder`] and each event's
//! data is yielded as one payload.
//!
//! The client sets a connect timeout and TCP keepalive but no overall
//! request timeout: a reply may legitimately stream for minutes, and a
//! backgrounded surface must not lose its connection.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};

use super::{
    EventStream, HandshakeClassifier, HandshakeResponse, HttpMethod, RetryConfig, SseDecoder,
    StreamRequest, Transport, EVENT_STREAM_CONTENT_TYPE,
};
use crate::error::{ChatError, Result};

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Keepalive interval for idle streams
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// reqwest-based SSE transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Create a transport with the given retry policy and connect timeout
    pub fn new(retry: RetryConfig, connect_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_keepalive(TCP_KEEPALIVE)
            .build()
            .map_err(|e| ChatError::Client(e.to_string()))?;
        Ok(Self { http_client, retry })
    }

    /// One connection attempt: send, classify, and wrap the body
    async fn attempt(
        &self,
        request: &StreamRequest,
        headers: &HeaderMap,
        classify: HandshakeClassifier,
    ) -> Result<EventStream> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .http_client
            .request(method, &request.endpoint)
            .headers(headers.clone());

        if request.method.has_body() {
            if let Some(body) = &request.body {
                let bytes = serde_json::to_vec(body)
                    .map_err(|e| ChatError::InvalidRequest(e.to_string()))?;
                builder = builder.body(bytes);
            }
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_builder() {
                ChatError::InvalidRequest(e.to_string())
            } else {
                ChatError::Connect(e.to_string())
            }
        })?;

        let handshake = HandshakeResponse {
            status: response.status().as_u16(),
            content_type: response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        };
        classify(&handshake)?;

        tracing::debug!(status = handshake.status, "Event stream opened");
        Ok(decode_events(response))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http-sse"
    }

    async fn open(&self, request: StreamRequest, classify: HandshakeClassifier) -> Result<EventStream> {
        let headers = build_headers(&request)?;
        let mut retries = 0;

        loop {
            match self.attempt(&request, &headers, classify).await {
                Ok(events) => return Ok(events),
                Err(err) if err.is_retriable() => {
                    if !self.retry.allows_retry(retries) {
                        tracing::warn!(
                            endpoint = %request.endpoint,
                            attempts = retries + 1,
                            error = %err,
                            "Retries exhausted"
                        );
                        return Err(ChatError::RetriesExhausted {
                            attempts: retries + 1,
                            last: Box::new(err),
                        });
                    }
                    let backoff = self.retry.backoff_for_attempt(retries);
                    tracing::debug!(
                        attempt = retries + 1,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retriable handshake failure, backing off"
                    );
                    // Exponential backoff between attempts
                    tokio::time::sleep(backoff).await;
                    retries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Convert request headers, adding `Accept: text/event-stream` unless set
fn build_headers(request: &StreamRequest) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE));
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ChatError::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ChatError::InvalidRequest(format!("header value for {name}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Turn a response body into a stream of event payloads
fn decode_events(response: reqwest::Response) -> EventStream {
    struct State<S> {
        bytes: S,
        decoder: SseDecoder,
        ready: VecDeque<String>,
        done: bool,
    }

    let state = State {
        bytes: response.bytes_stream().boxed(),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.ready.pop_front() {
                return Some((Ok(data), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.feed(&chunk) {
                        if let Some(kind) = &event.event {
                            tracing::trace!(event = %kind, "SSE event");
                        }
                        state.ready.push_back(event.data);
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(ChatError::Stream(e.to_string())), state));
                }
                None => {
                    state.done = true;
                    state
                        .ready
                        .extend(state.decoder.finish().into_iter().map(|event| event.data));
                }
            }
        }
    })
    .boxed()
}
