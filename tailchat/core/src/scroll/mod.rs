//! Scroll Synchronization
//!
//! Keeps a growing conversation pinned where the user wants it: following
//! new content while they are at the bottom, leaving them alone once they
//! scroll away, and never mistaking its own scroll writes for theirs.
//!
//! # Design Philosophy
//!
//! The controller is headless. Surfaces implement [`Viewport`] over whatever
//! they render into (a DOM scroll container, a terminal pane) and drive the
//! controller with three kinds of input:
//!
//! - scroll events ([`ScrollController::on_scroll`])
//! - content changes ([`ScrollController::on_content_grew`],
//!   [`ScrollController::on_turn_started`])
//! - frames ([`ScrollController::tick`]), which advance animations
//!
//! Time is always passed in, so behavior is deterministic under test.
//!
//! # Feedback Suppression
//!
//! A programmatic scroll produces scroll events just like a user's. Two
//! mechanisms keep those from flipping `auto_follow` off:
//!
//! - **Lock**: jump-to-bottom sets a lock that ignores every scroll event
//!   until it expires, safely after the animation ends.
//! - **Echo tag**: the controller remembers the position it last wrote; a
//!   scroll event reporting that position is its own echo.

pub mod animation;
pub mod reservation;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use animation::{AnimationKind, EasingFunction, ScrollAnimation, ScrollTarget};
pub use reservation::{reserved_height, ReservationMetrics, ReservationTracker};

/// Positions closer than this are the same position
const POSITION_EPSILON: f64 = 0.5;

/// A scrollable surface the controller can read and drive
///
/// All lengths share one unit (pixels for a browser, rows for a terminal).
pub trait Viewport {
    /// Current scroll offset from the content top
    fn scroll_top(&self) -> f64;

    /// Total content height
    fn scroll_height(&self) -> f64;

    /// Visible height
    fn client_height(&self) -> f64;

    /// Scroll to `top`; implementations clamp to the valid range
    fn set_scroll_top(&mut self, top: f64);

    /// Offset of the anchored element's top from the content top, if rendered
    fn anchor_offset(&self, anchor: &str) -> Option<f64>;

    /// Height of the anchored element including its margins, if rendered
    fn outer_height(&self, anchor: &str) -> Option<f64>;

    /// Largest valid scroll offset
    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height() - self.client_height()).max(0.0)
    }

    /// Distance between the viewport bottom and the content bottom
    fn distance_from_bottom(&self) -> f64 {
        self.scroll_height() - self.scroll_top() - self.client_height()
    }
}

/// Tuning for the scroll controller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// Within this distance of the bottom counts as "at the bottom"
    pub near_bottom_threshold: f64,
    /// Duration of the follow-on-growth scroll
    pub follow_duration_ms: u64,
    /// Duration of the turn-start scroll
    pub turn_scroll_duration_ms: u64,
    /// Gap left above the sent message after the turn-start scroll
    pub turn_scroll_offset: f64,
    /// Delay between sending and starting the turn-start scroll, letting layout settle
    pub turn_settle_delay_ms: u64,
    /// Duration of the jump-to-bottom scroll
    pub jump_duration_ms: u64,
    /// How long scroll events are ignored after a jump-to-bottom
    pub jump_lock_ms: u64,
    /// Space above the element preceding the streaming reply
    pub top_padding: f64,
    /// Space below the streaming reply
    pub bottom_margin: f64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            near_bottom_threshold: 40.0,
            follow_duration_ms: 150,
            turn_scroll_duration_ms: 800,
            turn_scroll_offset: 20.0,
            turn_settle_delay_ms: 50,
            jump_duration_ms: 500,
            jump_lock_ms: 1000,
            top_padding: 24.0,
            bottom_margin: 24.0,
        }
    }
}

impl ScrollConfig {
    /// Defaults for surfaces measured in text rows
    pub fn terminal() -> Self {
        Self {
            near_bottom_threshold: 2.0,
            turn_scroll_offset: 1.0,
            top_padding: 1.0,
            bottom_margin: 1.0,
            ..Self::default()
        }
    }

    /// Spacing used for layout reservation
    pub fn reservation_metrics(&self) -> ReservationMetrics {
        ReservationMetrics {
            top_padding: self.top_padding,
            bottom_margin: self.bottom_margin,
        }
    }
}

/// Turn-start scroll waiting for layout
#[derive(Clone, Debug)]
struct PendingTurn {
    anchor: String,
    not_before: Instant,
}

/// Decides when and where the viewport scrolls
#[derive(Debug)]
pub struct ScrollController {
    config: ScrollConfig,
    auto_follow: bool,
    lock_until: Option<Instant>,
    animation: Option<ScrollAnimation>,
    pending_turn: Option<PendingTurn>,
    /// Position of the controller's last write
    last_written: Option<f64>,
}

impl Default for ScrollController {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}

impl ScrollController {
    /// Create a controller following from the start
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            auto_follow: true,
            lock_until: None,
            animation: None,
            pending_turn: None,
            last_written: None,
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    /// Whether new content is followed
    pub fn auto_follow(&self) -> bool {
        self.auto_follow
    }

    /// Whether scroll events are currently ignored
    pub fn is_locked(&self, now: Instant) -> bool {
        self.lock_until.is_some_and(|until| now < until)
    }

    /// Kind of the running animation, if any
    pub fn animation(&self) -> Option<AnimationKind> {
        self.animation.as_ref().map(|a| a.kind)
    }

    /// Whether more frames are needed (animation running or pending)
    pub fn is_animating(&self) -> bool {
        self.animation.is_some() || self.pending_turn.is_some()
    }

    /// Whether the jump-to-bottom affordance is shown
    pub fn shows_jump_affordance(&self, message_count: usize) -> bool {
        !self.auto_follow && message_count > 0
    }

    /// A scroll event: the viewport now reports a new position
    pub fn on_scroll(&mut self, viewport: &impl Viewport, now: Instant) {
        if self.is_locked(now) {
            return;
        }

        let top = viewport.scroll_top();
        if self
            .last_written
            .is_some_and(|written| (written - top).abs() < POSITION_EPSILON)
        {
            return;
        }

        // The user moved the viewport; any animation loses
        if let Some(animation) = self.animation.take() {
            tracing::debug!(kind = ?animation.kind, "User scroll cancelled animation");
        }
        self.pending_turn = None;
        self.last_written = None;

        let near_bottom = viewport.distance_from_bottom() < self.config.near_bottom_threshold;
        self.set_auto_follow(near_bottom, "user scroll");
    }

    /// The content got taller at the tail (delta merged, reveal advanced)
    pub fn on_content_grew(&mut self, viewport: &impl Viewport, now: Instant) {
        if !self.auto_follow || self.pending_turn.is_some() || self.animation.is_some() {
            return;
        }
        if viewport.distance_from_bottom() <= POSITION_EPSILON {
            return;
        }
        self.animation = Some(ScrollAnimation::new(
            AnimationKind::Follow,
            ScrollTarget::Bottom,
            viewport.scroll_top(),
            now,
            Duration::from_millis(self.config.follow_duration_ms),
            EasingFunction::EaseOutQuad,
        ));
    }

    /// The viewport changed size
    pub fn on_resize(&mut self, viewport: &impl Viewport, now: Instant) {
        self.on_content_grew(viewport, now);
    }

    /// A message was just sent; bring it to the top once it is rendered
    pub fn on_turn_started(&mut self, anchor: impl Into<String>, now: Instant) {
        self.set_auto_follow(true, "turn started");
        self.animation = None;
        self.pending_turn = Some(PendingTurn {
            anchor: anchor.into(),
            not_before: now + Duration::from_millis(self.config.turn_settle_delay_ms),
        });
    }

    /// Explicit jump-to-bottom
    pub fn jump_to_bottom(&mut self, viewport: &impl Viewport, now: Instant) {
        self.lock_until = Some(now + Duration::from_millis(self.config.jump_lock_ms));
        self.set_auto_follow(true, "jump to bottom");
        self.pending_turn = None;
        self.animation = Some(ScrollAnimation::new(
            AnimationKind::Jump,
            ScrollTarget::Bottom,
            viewport.scroll_top(),
            now,
            Duration::from_millis(self.config.jump_duration_ms),
            EasingFunction::EaseOutCubic,
        ));
    }

    /// Advance one frame
    ///
    /// Releases an expired lock, starts a pending turn-start scroll once its
    /// anchor exists, and moves the viewport along the running animation.
    /// Returns whether more frames are needed.
    pub fn tick(&mut self, viewport: &mut impl Viewport, now: Instant) -> bool {
        if self.lock_until.is_some_and(|until| now >= until) {
            self.lock_until = None;
            tracing::trace!("Scroll lock released");
        }

        self.start_pending_turn(viewport, now);

        let Some(animation) = self.animation.as_ref() else {
            return self.is_animating();
        };

        let destination = match &animation.target {
            ScrollTarget::Bottom => Some(viewport.max_scroll_top()),
            ScrollTarget::Anchor { anchor, offset } => viewport
                .anchor_offset(anchor)
                .map(|top| (top - offset).clamp(0.0, viewport.max_scroll_top())),
        };

        let Some(destination) = destination else {
            tracing::debug!(kind = ?animation.kind, "Animation target vanished");
            self.animation = None;
            return self.is_animating();
        };

        let position = animation.position(destination, now);
        let finished = animation.is_finished(now);
        viewport.set_scroll_top(position);
        self.last_written = Some(viewport.scroll_top());

        if finished {
            self.animation = None;
        }
        self.is_animating()
    }

    fn start_pending_turn(&mut self, viewport: &impl Viewport, now: Instant) {
        let Some(pending) = self.pending_turn.as_ref() else {
            return;
        };
        if now < pending.not_before || viewport.anchor_offset(&pending.anchor).is_none() {
            return;
        }
        let Some(pending) = self.pending_turn.take() else {
            return;
        };
        tracing::trace!(anchor = %pending.anchor, "Starting turn scroll");
        self.animation = Some(ScrollAnimation::new(
            AnimationKind::TurnStart,
            ScrollTarget::Anchor {
                anchor: pending.anchor,
                offset: self.config.turn_scroll_offset,
            },
            viewport.scroll_top(),
            now,
            Duration::from_millis(self.config.turn_scroll_duration_ms),
            EasingFunction::EaseOutCubic,
        ));
    }

    fn set_auto_follow(&mut self, value: bool, reason: &str) {
        if self.auto_follow != value {
            tracing::debug!(auto_follow = value, reason, "Auto-follow changed");
            self.auto_follow = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Viewport over a fixed list of element heights
    struct FakeViewport {
        top: f64,
        content: f64,
        client: f64,
        anchors: HashMap<String, (f64, f64)>,
    }

    impl FakeViewport {
        fn new(content: f64, client: f64) -> Self {
            Self {
                top: 0.0,
                content,
                client,
                anchors: HashMap::new(),
            }
        }

        fn at_bottom(mut self) -> Self {
            self.top = self.max_scroll_top();
            self
        }

        fn user_scroll_to(&mut self, top: f64) {
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
            self.anchors.get(anchor).map(|(top, _)| *top)
        }
        fn outer_height(&self, anchor: &str) -> Option<f64> {
            self.anchors.get(anchor).map(|(_, h)| *h)
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn run_until(controller: &mut ScrollController, vp: &mut FakeViewport, start: Instant, until_ms: u64) {
        let mut t = 0;
        while t <= until_ms {
            controller.tick(vp, start + ms(t));
            controller.on_scroll(vp, start + ms(t));
            t += 16;
        }
        controller.tick(vp, start + ms(until_ms));
    }

    #[test]
    fn test_scroll_away_disables_follow() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0).at_bottom();
        let now = Instant::now();

        vp.user_scroll_to(1000.0);
        controller.on_scroll(&vp, now);
        assert!(!controller.auto_follow());
        assert!(controller.shows_jump_affordance(3));
        assert!(!controller.shows_jump_affordance(0));
    }

    #[test]
    fn test_near_bottom_threshold() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0);
        let now = Instant::now();

        vp.user_scroll_to(1461.0); // 39 from bottom
        controller.on_scroll(&vp, now);
        assert!(controller.auto_follow());

        vp.user_scroll_to(1460.0); // exactly 40
        controller.on_scroll(&vp, now);
        assert!(!controller.auto_follow());
    }

    #[test]
    fn test_growth_while_scrolled_away_does_not_move() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0);
        let now = Instant::now();
        vp.user_scroll_to(300.0);
        controller.on_scroll(&vp, now);

        vp.content = 2100.0;
        controller.on_content_grew(&vp, now);
        controller.tick(&mut vp, now + ms(200));
        assert!((vp.top - 300.0).abs() < f64::EPSILON);
        assert!(controller.shows_jump_affordance(2));
    }

    #[test]
    fn test_growth_is_followed_when_at_bottom() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0).at_bottom();
        let start = Instant::now();

        vp.content = 2100.0;
        controller.on_content_grew(&vp, start);
        assert_eq!(controller.animation(), Some(AnimationKind::Follow));
        run_until(&mut controller, &mut vp, start, 200);
        assert!((vp.top - 1600.0).abs() < 1e-9);
        assert!(controller.auto_follow());
        assert!(!controller.is_animating());
    }

    #[test]
    fn test_jump_to_bottom_ignores_its_own_scroll_events() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(3000.0, 500.0);
        let start = Instant::now();
        vp.user_scroll_to(100.0);
        controller.on_scroll(&vp, start);
        assert!(!controller.auto_follow());

        controller.jump_to_bottom(&vp, start);
        assert!(controller.auto_follow());
        assert!(!controller.shows_jump_affordance(4));

        // Mid-animation scroll events far from the bottom are ignored
        controller.tick(&mut vp, start + ms(50));
        assert!(vp.top < 2000.0);
        controller.on_scroll(&vp, start + ms(50));
        assert!(controller.auto_follow());

        run_until(&mut controller, &mut vp, start, 600);
        assert!((vp.top - 2500.0).abs() < 1e-9);
        assert!(controller.is_locked(start + ms(999)));
        assert!(!controller.is_locked(start + ms(1000)));
        assert!(controller.auto_follow());
    }

    #[test]
    fn test_own_writes_are_not_user_intent() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0).at_bottom();
        let start = Instant::now();

        vp.content = 3000.0;
        controller.on_content_grew(&vp, start);
        controller.tick(&mut vp, start + ms(16));
        // Echo of the controller's write: far from bottom but not the user
        assert!(vp.distance_from_bottom() > 40.0);
        controller.on_scroll(&vp, start + ms(16));
        assert!(controller.auto_follow());
        assert_eq!(controller.animation(), Some(AnimationKind::Follow));
    }

    #[test]
    fn test_user_scroll_cancels_animation() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0).at_bottom();
        let start = Instant::now();

        vp.content = 3000.0;
        controller.on_content_grew(&vp, start);
        controller.tick(&mut vp, start + ms(16));
        vp.user_scroll_to(200.0);
        controller.on_scroll(&vp, start + ms(20));
        assert!(!controller.auto_follow());
        assert_eq!(controller.animation(), None);
    }

    #[test]
    fn test_turn_start_scrolls_anchor_to_top() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(1000.0, 500.0);
        let start = Instant::now();
        vp.user_scroll_to(0.0);
        controller.on_scroll(&vp, start);

        controller.on_turn_started("msg-u1", start);
        assert!(controller.auto_follow());

        // Not rendered yet: waits
        controller.tick(&mut vp, start + ms(60));
        assert_eq!(controller.animation(), None);
        assert!(controller.is_animating());

        vp.content = 2000.0;
        vp.anchors.insert("msg-u1".into(), (1000.0, 60.0));
        let begin = start + ms(70);
        controller.tick(&mut vp, begin);
        assert_eq!(controller.animation(), Some(AnimationKind::TurnStart));

        // Halfway through the cubic ease-out: 87.5% of the distance
        controller.tick(&mut vp, begin + ms(400));
        assert!((vp.top - 980.0 * 0.875).abs() < 1e-6);

        controller.tick(&mut vp, begin + ms(800));
        assert!((vp.top - 980.0).abs() < 1e-9);
        assert!(!controller.is_animating());
    }

    #[test]
    fn test_turn_start_waits_for_settle_delay() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0);
        vp.anchors.insert("msg-u1".into(), (1000.0, 60.0));
        let start = Instant::now();

        controller.on_turn_started("msg-u1", start);
        controller.tick(&mut vp, start + ms(10));
        assert_eq!(controller.animation(), None);
        controller.tick(&mut vp, start + ms(50));
        assert_eq!(controller.animation(), Some(AnimationKind::TurnStart));
    }

    #[test]
    fn test_growth_does_not_interrupt_turn_scroll() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(2000.0, 500.0);
        vp.anchors.insert("msg-u1".into(), (1000.0, 60.0));
        let start = Instant::now();

        controller.on_turn_started("msg-u1", start);
        controller.on_content_grew(&vp, start + ms(20));
        assert_eq!(controller.animation(), None);
        controller.tick(&mut vp, start + ms(60));
        controller.on_content_grew(&vp, start + ms(70));
        assert_eq!(controller.animation(), Some(AnimationKind::TurnStart));
    }

    #[test]
    fn test_turn_target_clamped_to_max_scroll() {
        let mut controller = ScrollController::default();
        let mut vp = FakeViewport::new(1200.0, 500.0);
        vp.anchors.insert("msg-u1".into(), (1100.0, 60.0));
        let start = Instant::now();

        controller.on_turn_started("msg-u1", start);
        controller.tick(&mut vp, start + ms(50));
        controller.tick(&mut vp, start + ms(900));
        assert!((vp.top - 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_config() {
        let config = ScrollConfig::terminal();
        assert!((config.near_bottom_threshold - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.turn_scroll_duration_ms, 800);
        assert!((config.reservation_metrics().top_padding - 1.0).abs() < f64::EPSILON);
    }
}
