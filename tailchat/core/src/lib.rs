//! Tailchat Core - Headless Streaming Chat for tailchat
//!
//! This crate provides the core of an embeddable chat widget that renders an
//! append-only conversation against a server streaming its replies as
//! Server-Sent Events. It is completely independent of any UI framework: a
//! terminal surface, a web front end or a test harness drive it the same way.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surfaces                             │
//! │   ┌─────────┐   ┌──────────────┐   ┌──────────────────────────┐  │
//! │   │   TUI   │   │  Web / DOM   │   │     Headless / Tests     │  │
//! │   │(ratatui)│   │              │   │                          │  │
//! │   └────┬────┘   └──────┬───────┘   └────────────┬─────────────┘  │
//! │        └───────────────┼────────────────────────┘                │
//! │              input, frames, Viewport   ▲ ChatUpdate              │
//! └────────────────────────┼───────────────┼─────────────────────────┘
//!                          ▼               │
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         TAILCHAT CORE                            │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                        ChatWidget                          │  │
//! │  │  ┌────────────┐  ┌──────────────┐  ┌────────────────────┐  │  │
//! │  │  │ ChatEngine │  │    Scroll    │  │ Reservation/Reveal │  │  │
//! │  │  │  + Store   │  │  Controller  │  │                    │  │  │
//! │  │  └─────┬──────┘  └──────────────┘  └────────────────────┘  │  │
//! │  └────────┼───────────────────────────────────────────────────┘  │
//! │           │ Transport (HttpTransport: reqwest + SSE)             │
//! └───────────┼──────────────────────────────────────────────────────┘
//!             ▼
//!       streaming server
//! ```
//!
//! # Key Types
//!
//! - [`ChatWidget`]: Surface-facing facade
//! - [`ChatEngine`]: Conversation owner and exchange driver
//! - [`MessageStore`]: Ordered conversation with at most one open reply
//! - [`SessionStatus`]: `idle`, `sending`, `streaming`, `error`
//! - [`ScrollController`]: Auto-follow, eased scrolls and feedback suppression
//! - [`Transport`]: How event streams are opened ([`HttpTransport`])
//!
//! # Quick Start
//!
//! ```ignore
//! use std::time::Instant;
//! use tailchat_core::{load_config, ChatWidget, HttpTransport, ScrollConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let transport = HttpTransport::new(config.retry.clone(), config.connect_timeout)?;
//!     let mut widget = ChatWidget::new(transport, &config, ScrollConfig::default());
//!
//!     widget.submit("hello", Instant::now());
//!     loop {
//!         for update in widget.poll(Instant::now()) {
//!             // Re-render
//!         }
//!         // Lay out, then: widget.sync_scroll(&mut viewport, Instant::now());
//!     }
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`messages`]: Message model, IDs, anchors and updates
//! - [`store`]: The message store
//! - [`status`]: Session status machine and control gating
//! - [`engine`]: Stream ingestion engine
//! - [`transport`]: Transport contract, HTTP/SSE client, retry policy
//! - [`body`]: Request body construction
//! - [`scroll`]: Scroll synchronization, animations, layout reservation
//! - [`reveal`]: Typewriter reveal of the streaming reply
//! - [`widget`]: The facade tying it all together
//! - [`config`]: TOML and environment configuration
//! - [`error`]: Error taxonomy
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod body;
pub mod config;
pub mod engine;
pub mod error;
pub mod messages;
pub mod reveal;
pub mod scroll;
pub mod status;
pub mod store;
pub mod transport;
pub mod widget;

// Re-exports for convenience
pub use body::{BodyBuilder, DefaultBody, TurnPayload};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigSource,
    RequestConfig, WidgetConfig,
};
pub use engine::ChatEngine;
pub use error::{ChatError, ErrorClass};
pub use messages::{anchor_for, ChatUpdate, HistoryEntry, Message, MessageId, MessageRole};
pub use reveal::TypewriterReveal;
pub use scroll::{ScrollConfig, ScrollController, Viewport};
pub use status::{Controls, SessionStatus};
pub use store::MessageStore;
pub use transport::{HttpMethod, HttpTransport, RetryConfig, StreamRequest, Transport};
pub use widget::ChatWidget;
