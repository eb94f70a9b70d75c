//! Scroll Animations
//!
//! Time-based eased scrolls. Positions are computed from elapsed wall time,
//! not frame count, so an animation lands on time at any frame rate.
//!
//! The target is re-resolved every frame: a scroll to the bottom keeps
//! chasing the bottom while content grows underneath it.

use std::time::{Duration, Instant};

/// Easing functions for smooth animation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EasingFunction {
    /// Quadratic ease out, for short follows
    EaseOutQuad,

    /// Cubic ease out: `1 - (1 - p)^3`
    EaseOutCubic,
}

impl EasingFunction {
    /// Apply the easing function to a progress value (0.0 to 1.0)
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
        }
    }
}

/// Where an animation is headed
#[derive(Clone, Debug, PartialEq)]
pub enum ScrollTarget {
    /// The live bottom of the content
    Bottom,
    /// Put the top of an anchored element `offset` units below the viewport top
    Anchor {
        /// Anchor name (`"msg-" + id`)
        anchor: String,
        /// Gap left above the element
        offset: f64,
    },
}

/// Why an animation was started
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationKind {
    /// Short follow of tail growth
    Follow,
    /// Bringing a freshly sent message to the top
    TurnStart,
    /// Explicit jump-to-bottom
    Jump,
}

/// An in-flight eased scroll
#[derive(Clone, Debug)]
pub struct ScrollAnimation {
    /// Why it runs
    pub kind: AnimationKind,
    /// Destination
    pub target: ScrollTarget,
    from: f64,
    started: Instant,
    duration: Duration,
    easing: EasingFunction,
}

impl ScrollAnimation {
    /// Start an animation at `from`
    pub fn new(
        kind: AnimationKind,
        target: ScrollTarget,
        from: f64,
        started: Instant,
        duration: Duration,
        easing: EasingFunction,
    ) -> Self {
        Self {
            kind,
            target,
            from,
            started,
            duration,
            easing,
        }
    }

    /// Linear progress in `[0, 1]`
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Position at `now`, heading for `destination`
    pub fn position(&self, destination: f64, now: Instant) -> f64 {
        let eased = self.easing.apply(self.progress(now));
        self.from + (destination - self.from) * eased
    }

    /// Whether the animation has reached its end
    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }
}
