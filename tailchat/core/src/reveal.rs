//! Typewriter Reveal
//!
//! Paces the display of a streaming reply one character at a time so bursty
//! deltas read as steady typing. Only the reply that is still loading is
//! paced; everything else is shown in full.

use std::time::{Duration, Instant};

use crate::messages::MessageId;

/// Per-character reveal of the streaming reply
#[derive(Clone, Debug)]
pub struct TypewriterReveal {
    interval: Duration,
    message: Option<MessageId>,
    /// Characters currently shown
    shown: usize,
    /// When the last character was revealed
    last_step: Option<Instant>,
}

impl TypewriterReveal {
    /// Create a reveal pacing one character per `interval` (zero disables pacing)
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            message: None,
            shown: 0,
            last_step: None,
        }
    }

    /// Whether pacing is active at all
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Advance the reveal of `id` towards `content`
    ///
    /// Returns whether more of the message became visible.
    pub fn advance(&mut self, id: &MessageId, content: &str, loading: bool, now: Instant) -> bool {
        if self.message.as_ref() != Some(id) {
            self.message = Some(id.clone());
            self.shown = 0;
            self.last_step = Some(now);
        }

        let total = content.chars().count();
        if total < self.shown {
            // Content was replaced with something shorter
            self.shown = total;
            self.last_step = Some(now);
            return false;
        }
        if !self.is_enabled() || !loading {
            return self.reveal_all(total, now);
        }

        let last = self.last_step.unwrap_or(now);
        let elapsed = now.saturating_duration_since(last);
        let steps = usize::try_from(elapsed.as_nanos() / self.interval.as_nanos()).unwrap_or(usize::MAX);
        if steps == 0 || self.shown == total {
            if self.shown == total {
                self.last_step = Some(now);
            }
            return false;
        }
        let next = self.shown.saturating_add(steps).min(total);
        let advanced = next - self.shown;
        self.shown = next;
        let advanced_by = self.interval * u32::try_from(advanced).unwrap_or(u32::MAX);
        self.last_step = Some(if next == total { now } else { last + advanced_by });
        true
    }

    /// Show the whole message immediately (e.g. the surface was hidden)
    pub fn snap(&mut self, id: &MessageId, content: &str, now: Instant) -> bool {
        self.message = Some(id.clone());
        self.reveal_all(content.chars().count(), now)
    }

    /// Visible part of `content` for message `id`
    pub fn visible<'a>(&self, id: &MessageId, content: &'a str) -> &'a str {
        if self.message.as_ref() != Some(id) {
            return content;
        }
        match content.char_indices().nth(self.shown) {
            Some((byte, _)) => &content[..byte],
            None => content,
        }
    }

    /// Whether message `id` has characters not yet shown
    pub fn is_behind(&self, id: &MessageId, content: &str) -> bool {
        self.message.as_ref() == Some(id) && self.shown < content.chars().count()
    }

    fn reveal_all(&mut self, total: usize, now: Instant) -> bool {
        let grew = self.shown < total;
        self.shown = total;
        self.last_step = Some(now);
        grew
    }
}

impl Default for TypewriterReveal {
    fn default() -> Self {
        Self::new(Duration::from_millis(5))
    }
}
