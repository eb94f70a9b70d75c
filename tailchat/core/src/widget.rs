//! Chat Widget
//!
//! The surface-facing facade. Wires the engine, the scroll controller, the
//! layout reservation and the typewriter reveal together so a surface only
//! has to forward input, lay out what it is given, and call
//! [`ChatWidget::sync_scroll`] after each layout.
//!
//! # Frame Loop
//!
//! ```text
//! input ──▶ submit / stop / on_user_scroll / jump_to_bottom
//! frame ──▶ poll(now)            apply exchange events, advance reveal
//!       ──▶ (surface lays out, using visible_content + reserved_min_height)
//!       ──▶ sync_scroll(vp, now) follow growth, run animations
//! ```

use std::time::Instant;

use crate::body::BodyBuilder;
use crate::config::{RequestConfig, WidgetConfig};
use crate::engine::ChatEngine;
use crate::messages::{anchor_for, ChatUpdate, Message, MessageId, MessageRole};
use crate::reveal::TypewriterReveal;
use crate::scroll::{ReservationTracker, ScrollConfig, ScrollController, Viewport};
use crate::status::{Controls, SessionStatus};
use crate::transport::Transport;

/// An embeddable streaming chat
#[derive(Debug)]
pub struct ChatWidget<T: Transport> {
    engine: ChatEngine<T>,
    scroll: ScrollController,
    reservation: ReservationTracker,
    reveal: TypewriterReveal,
    /// The tail changed height since the last scroll sync
    tail_dirty: bool,
    title: Option<String>,
    empty_state_message: String,
}

impl<T: Transport> ChatWidget<T> {
    /// Create a widget from loaded configuration
    ///
    /// `base_scroll` carries the surface's unit-appropriate defaults; the
    /// configuration's scroll overrides are applied on top.
    pub fn new(transport: T, config: &WidgetConfig, base_scroll: ScrollConfig) -> Self {
        Self {
            engine: ChatEngine::new(transport, config.request.clone()),
            scroll: ScrollController::new(config.scroll_config(base_scroll)),
            reservation: ReservationTracker::new(),
            reveal: TypewriterReveal::new(config.reveal_interval),
            tail_dirty: false,
            title: config.title.clone(),
            empty_state_message: config.empty_state_message.clone(),
        }
    }

    /// Create a widget with default presentation for `request`
    pub fn with_request(transport: T, request: RequestConfig) -> Self {
        let config = WidgetConfig {
            request,
            ..WidgetConfig::default()
        };
        Self::new(transport, &config, ScrollConfig::default())
    }

    /// Use a custom request body shape
    #[must_use]
    pub fn with_body_builder(mut self, builder: impl BodyBuilder + 'static) -> Self {
        self.engine = self.engine.with_body_builder(builder);
        self
    }

    // ============================================
    // Input
    // ============================================

    /// Load initial history (only into an empty conversation)
    pub fn mount(&mut self, history: Vec<Message>) -> bool {
        let loaded = self.engine.replace_all(history);
        if loaded {
            self.tail_dirty = true;
        }
        loaded
    }

    /// Send a message; `None` if blank or a reply is still in flight
    pub fn submit(&mut self, text: &str, now: Instant) -> Option<MessageId> {
        let id = self.engine.send(text)?;
        self.scroll.on_turn_started(anchor_for(&id), now);
        self.tail_dirty = true;
        Some(id)
    }

    /// Stop the reply in flight
    pub fn stop(&mut self) -> bool {
        let stopped = self.engine.stop();
        if stopped {
            // Whatever arrived is shown in full
            self.tail_dirty = true;
        }
        stopped
    }

    /// The user scrolled the viewport
    pub fn on_user_scroll(&mut self, viewport: &impl Viewport, now: Instant) {
        self.scroll.on_scroll(viewport, now);
    }

    /// The viewport changed size
    pub fn on_resize(&mut self, viewport: &impl Viewport, now: Instant) {
        self.scroll.on_resize(viewport, now);
    }

    /// The user asked to jump to the bottom
    pub fn jump_to_bottom(&mut self, viewport: &impl Viewport, now: Instant) {
        self.scroll.jump_to_bottom(viewport, now);
    }

    /// The surface stopped being visible: show pending characters at once
    pub fn on_hidden(&mut self, now: Instant) {
        if let Some(tail) = self.engine.store().last() {
            if self.reveal.snap(&tail.id, &tail.content, now) {
                self.tail_dirty = true;
            }
        }
    }

    // ============================================
    // Frame
    // ============================================

    /// Apply exchange events and advance the reveal
    pub fn poll(&mut self, now: Instant) -> Vec<ChatUpdate> {
        let updates = self.engine.poll();
        if updates.iter().any(ChatUpdate::grows_tail) {
            self.tail_dirty = true;
        }
        let store = self.engine.store();
        if let Some(tail) = store.last().filter(|m| m.role == MessageRole::Assistant) {
            let loading = self.engine.status().is_busy() && store.is_open(&tail.id);
            if self.reveal.advance(&tail.id, &tail.content, loading, now) {
                self.tail_dirty = true;
            }
        }
        updates
    }

    /// Keep the viewport in sync after the surface laid out
    ///
    /// Returns whether another frame is needed soon.
    pub fn sync_scroll(&mut self, viewport: &mut impl Viewport, now: Instant) -> bool {
        if std::mem::take(&mut self.tail_dirty) {
            self.scroll.on_content_grew(viewport, now);
        }
        let animating = self.scroll.tick(viewport, now);
        animating || self.is_revealing()
    }

    // ============================================
    // Rendering
    // ============================================

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        self.engine.messages()
    }

    /// Current session status
    pub fn status(&self) -> SessionStatus {
        self.engine.status()
    }

    /// Enabled state of the input controls
    pub fn controls(&self) -> Controls {
        self.engine.controls()
    }

    /// The underlying engine
    pub fn engine(&self) -> &ChatEngine<T> {
        &self.engine
    }

    /// The scroll controller
    pub fn scroll(&self) -> &ScrollController {
        &self.scroll
    }

    /// Title shown above the conversation
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Greeting to show while the conversation is empty
    pub fn empty_state(&self) -> Option<&str> {
        self.engine
            .store()
            .is_empty()
            .then_some(self.empty_state_message.as_str())
    }

    /// Whether the jump-to-bottom affordance is shown
    pub fn shows_jump_affordance(&self) -> bool {
        self.scroll.shows_jump_affordance(self.engine.store().len())
    }

    /// Whether `id` is the reply still receiving deltas
    pub fn is_loading(&self, id: &MessageId) -> bool {
        self.engine.status().is_busy() && self.engine.store().is_open(id)
    }

    /// Text to render for a message (the reveal may lag behind the content)
    pub fn visible_content(&self, id: &MessageId) -> Option<&str> {
        let message = self.engine.store().get(id)?;
        Some(self.reveal.visible(id, &message.content))
    }

    /// Minimum height of the tail reply for this layout
    ///
    /// Reads the viewport height and the preceding element's outer height
    /// from `viewport`. Returns the reply and its minimum height when a
    /// reservation is held.
    pub fn reserved_min_height(&mut self, viewport: &impl Viewport) -> Option<(MessageId, f64)> {
        let messages = self.engine.store().messages();
        let tail = messages
            .last()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.id.clone());
        let preceding = messages
            .len()
            .checked_sub(2)
            .and_then(|i| messages.get(i))
            .and_then(|m| viewport.outer_height(&anchor_for(&m.id)))
            .unwrap_or(0.0);
        let loading = tail.as_ref().is_some_and(|id| self.is_loading(id));

        let height = self.reservation.update(
            tail.as_ref(),
            loading,
            viewport.client_height(),
            preceding,
            self.scroll.config().reservation_metrics(),
        );
        let holder = self.reservation.holder()?.clone();
        Some((holder, height))
    }

    fn is_revealing(&self) -> bool {
        self.engine
            .store()
            .last()
            .is_some_and(|tail| self.reveal.is_behind(&tail.id, &tail.content))
    }
}
