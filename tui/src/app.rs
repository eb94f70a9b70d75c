//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin surface over the chat
//! widget:
//! - Event loop (keyboard, mouse, resize)
//! - ChatWidget for the conversation, exchanges, and scroll decisions
//! - ConversationView for layout and rendering
//!
//! # Frame
//!
//! Every frame polls the widget, lays the conversation out, then lets the
//! widget sync the scroll position before drawing. Terminal input has no
//! scroll events of its own, so key and wheel scrolling report to the widget
//! directly.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, EventStream, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::Terminal;
use tokio::time::MissedTickBehavior;

use tailchat_core::{ChatWidget, MessageRole, SessionStatus, Transport, Viewport};

use crate::display::{
    render_empty_state, render_jump_indicator, ConversationView, ASSISTANT_COLOR,
};

/// Input box height (lines) including its separator
const INPUT_HEIGHT: u16 = 4;

/// Rows moved per mouse wheel notch
const WHEEL_ROWS: f64 = 3.0;

/// Frame interval (~60 FPS while animating)
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Main application state
pub struct App<T: Transport> {
    /// Is the app still running?
    running: bool,
    /// The chat core
    widget: ChatWidget<T>,
    /// Laid-out conversation
    view: ConversationView,
    /// User input buffer
    input_buffer: String,
    /// Terminal size
    size: (u16, u16),
}

impl<T: Transport> App<T> {
    /// Create an app for a terminal of `size`
    pub fn new(widget: ChatWidget<T>, size: (u16, u16)) -> Self {
        let mut app = Self {
            running: true,
            widget,
            view: ConversationView::default(),
            input_buffer: String::new(),
            size,
        };
        let area = app.conversation_area();
        app.view.resize(area.width, area.height);
        app
    }

    /// Main event loop
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();
        let mut frames = tokio::time::interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Render initial frame immediately so the user sees the UI
        self.tick(Instant::now());
        self.render(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Terminal events first
                maybe_event = event_stream.next() => match maybe_event {
                    Some(Ok(event)) => self.handle_event(event, Instant::now()),
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                    None => self.running = false,
                },

                _ = frames.tick() => {}
            }

            self.tick(Instant::now());
            self.render(terminal)?;
        }

        Ok(())
    }

    /// Advance one frame: apply exchange events, lay out, sync scroll
    pub fn tick(&mut self, now: Instant) {
        self.widget.poll(now);
        self.view.layout(&mut self.widget);
        self.widget.sync_scroll(&mut self.view, now);
    }

    /// Handle one terminal event
    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            // Only handle Press events (not Release or Repeat)
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key, now),
            Event::Mouse(mouse) => self.handle_mouse(mouse, now),
            Event::Resize(w, h) => self.handle_resize(w, h, now),
            _ => {}
        }
    }

    /// Handle keyboard input
    fn handle_key(&mut self, key: event::KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            // Quit
            KeyCode::Char('c') if ctrl => {
                self.widget.stop();
                self.running = false;
            }

            // Expand/collapse the last question
            KeyCode::Char('o') if ctrl => self.toggle_last_question(),

            // Line break inside the message
            KeyCode::Enter if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) => {
                self.input_buffer.push('\n');
            }

            // Submit message (kept in the box while a reply is in flight)
            KeyCode::Enter => {
                if self.widget.submit(&self.input_buffer, now).is_some() {
                    self.input_buffer.clear();
                }
            }

            // Stop the reply
            KeyCode::Esc => {
                self.widget.stop();
            }

            // Typing
            KeyCode::Char(c) => self.input_buffer.push(c),
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }

            // Conversation scrolling
            KeyCode::PageUp => self.user_scroll(-self.page_rows(), now),
            KeyCode::PageDown => self.user_scroll(self.page_rows(), now),
            KeyCode::End => self.widget.jump_to_bottom(&self.view, now),

            _ => {}
        }
    }

    /// Handle mouse input
    fn handle_mouse(&mut self, mouse: event::MouseEvent, now: Instant) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.user_scroll(-WHEEL_ROWS, now),
            MouseEventKind::ScrollDown => self.user_scroll(WHEEL_ROWS, now),
            _ => {}
        }
    }

    /// Handle terminal resize
    fn handle_resize(&mut self, width: u16, height: u16, now: Instant) {
        self.size = (width, height);
        let area = self.conversation_area();
        self.view.resize(area.width, area.height);
        self.view.layout(&mut self.widget);
        self.widget.on_resize(&self.view, now);
    }

    fn user_scroll(&mut self, rows: f64, now: Instant) {
        let before = self.view.scroll_top();
        self.view.scroll_by(rows);
        if (self.view.scroll_top() - before).abs() > f64::EPSILON {
            self.widget.on_user_scroll(&self.view, now);
        }
    }

    fn page_rows(&self) -> f64 {
        f64::from((self.view.height() / 2).max(1))
    }

    fn toggle_last_question(&mut self) {
        let last_question = self
            .widget
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.id.clone());
        if let Some(id) = last_question {
            let expanded = self.view.toggle_expanded(&id);
            tracing::debug!(message_id = %id, expanded, "Toggled question");
        }
    }

    /// Is the app still running?
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current input text
    pub fn input(&self) -> &str {
        &self.input_buffer
    }

    /// The chat widget
    pub fn widget(&self) -> &ChatWidget<T> {
        &self.widget
    }

    /// The conversation view
    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    // ============================================
    // Rendering
    // ============================================

    fn title_height(&self) -> u16 {
        u16::from(self.widget.title().is_some())
    }

    fn conversation_area(&self) -> Rect {
        let (width, height) = self.size;
        let top = self.title_height();
        Rect::new(
            0,
            top,
            width,
            height.saturating_sub(top + INPUT_HEIGHT + 1),
        )
    }

    /// Render the UI
    fn render(
        &self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        terminal.draw(|frame| {
            let area = frame.area();
            self.render_into(frame.buffer_mut(), area);
        })?;
        Ok(())
    }

    /// Draw the whole screen into `buf`
    pub fn render_into(&self, buf: &mut Buffer, area: Rect) {
        let conversation = self.conversation_area().intersection(area);

        if let Some(title) = self.widget.title() {
            buf.set_stringn(
                area.x,
                area.y,
                format!(" {title}"),
                usize::from(area.width),
                Style::default()
                    .fg(ASSISTANT_COLOR)
                    .add_modifier(Modifier::BOLD),
            );
        }

        match self.widget.empty_state() {
            Some(greeting) => render_empty_state(buf, conversation, greeting),
            None => self.view.render(buf, conversation),
        }

        if self.widget.shows_jump_affordance() {
            render_jump_indicator(buf, conversation);
        }

        self.render_input(buf, area);
        self.render_status(buf, area);
    }

    fn render_input(&self, buf: &mut Buffer, area: Rect) {
        let y = area.bottom().saturating_sub(INPUT_HEIGHT + 1);
        let separator = "-".repeat(usize::from(area.width));
        buf.set_string(area.x, y, &separator, Style::default().fg(Color::DarkGray));

        let text_height = usize::from(INPUT_HEIGHT - 1);
        let text_width = usize::from(area.width.saturating_sub(1));
        if text_width < 5 {
            return;
        }

        let style = if self.widget.controls().send_enabled {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let full_input = format!("You: {}_", self.input_buffer);
        let wrapped = textwrap::wrap(&full_input, text_width);
        let skip = wrapped.len().saturating_sub(text_height);
        for (i, line) in wrapped.iter().skip(skip).enumerate() {
            buf.set_string(area.x, y + 1 + i as u16, line, style);
        }
    }

    fn render_status(&self, buf: &mut Buffer, area: Rect) {
        let status = self.widget.status();
        let (text, style) = match (status, self.widget.engine().last_error()) {
            (SessionStatus::Error, Some(error)) => (
                format!(" error: {error} | Enter send | Ctrl+C quit"),
                Style::default().fg(Color::Red),
            ),
            _ => {
                let hint = if self.widget.controls().stop_enabled {
                    "Esc stop"
                } else {
                    "Enter send"
                };
                (
                    format!(" {status} | {hint} | PgUp/PgDn scroll | End latest | Ctrl+C quit"),
                    Style::default().fg(Color::DarkGray),
                )
            }
        };
        buf.set_stringn(
            area.x,
            area.bottom().saturating_sub(1),
            text,
            usize::from(area.width),
            style,
        );
    }
}
