//! Layout Reservation
//!
//! While a reply streams in as the last element, it reserves enough height
//! that the question above it can sit at the top of the viewport with the
//! reply filling the rest. Without this the reply bubble would grow from
//! nothing and drag the viewport with it.
//!
//! ```text
//! ┌──────────────────────────┐ ─┬─
//! │      top padding         │  │
//! │ ┌──────────────────────┐ │  │
//! │ │ preceding (question) │ │  │ viewport height
//! │ └──────────────────────┘ │  │
//! │ ┌──────────────────────┐ │  │
//! │ │ reply: min height    │ │  │
//! │ └──────────────────────┘ │  │
//! │      bottom margin       │  │
//! └──────────────────────────┘ ─┴─
//! ```

use crate::messages::MessageId;

/// Fixed spacing around the conversation, in viewport units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReservationMetrics {
    /// Space above the preceding element
    pub top_padding: f64,
    /// Space below the reply
    pub bottom_margin: f64,
}

impl Default for ReservationMetrics {
    fn default() -> Self {
        Self {
            top_padding: 24.0,
            bottom_margin: 24.0,
        }
    }
}

/// Minimum height reserved for the streaming tail
///
/// `max(0, viewport − top_padding − preceding_outer − bottom_margin)`
pub fn reserved_height(
    viewport_height: f64,
    preceding_outer_height: f64,
    metrics: ReservationMetrics,
) -> f64 {
    if viewport_height <= 0.0 {
        return 0.0;
    }
    (viewport_height - metrics.top_padding - preceding_outer_height - metrics.bottom_margin).max(0.0)
}

/// Tracks which element holds the reservation
///
/// The reservation is taken once the tail reply starts loading and is kept
/// (even after loading ends) for as long as that reply stays the tail.
#[derive(Clone, Debug, Default)]
pub struct ReservationTracker {
    tail: Option<MessageId>,
    held: bool,
}

impl ReservationTracker {
    /// Create a tracker holding nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute for the current layout
    ///
    /// `tail` is the last element if it is an assistant reply, otherwise
    /// `None`. Returns the minimum height for that element.
    pub fn update(
        &mut self,
        tail: Option<&MessageId>,
        loading: bool,
        viewport_height: f64,
        preceding_outer_height: f64,
        metrics: ReservationMetrics,
    ) -> f64 {
        if self.tail.as_ref() != tail {
            if self.held {
                tracing::trace!(released = ?self.tail, "Released tail reservation");
            }
            self.tail = tail.cloned();
            self.held = false;
        }
        if self.tail.is_none() {
            return 0.0;
        }
        if loading {
            self.held = true;
        }
        if self.held {
            reserved_height(viewport_height, preceding_outer_height, metrics)
        } else {
            0.0
        }
    }

    /// Element currently holding a reservation
    pub fn holder(&self) -> Option<&MessageId> {
        self.tail.as_ref().filter(|_| self.held)
    }
}
