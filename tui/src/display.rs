//! Conversation View
//!
//! Lays the widget's messages out as wrapped terminal rows and exposes the
//! result to the scroll controller as a [`Viewport`] measured in rows.
//!
//! # Layout
//!
//! Each message becomes a block: the role prefix and visible text wrapped to
//! the view width, followed by one blank spacer row. A block's outer height
//! counts the spacer, so the reservation for a streaming reply leaves exactly
//! enough room for the question above it.
//!
//! - Long user messages collapse to [`COLLAPSED_ROWS`] until expanded
//! - The tail reply is padded with blank rows up to its reserved height
//! - The reply still loading ends with a block cursor

use std::collections::{HashMap, HashSet};

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use tailchat_core::{anchor_for, ChatWidget, Message, MessageId, MessageRole, Transport, Viewport};
use unicode_width::UnicodeWidthStr;

/// User messages taller than this many rows are collapsed until expanded
pub const COLLAPSED_ROWS: usize = 12;

/// Accent color for assistant text
pub const ASSISTANT_COLOR: Color = Color::Rgb(120, 170, 255);

const USER_PREFIX: &str = "You: ";
const ASSISTANT_PREFIX: &str = "Assistant: ";
const CURSOR: char = '▌';
const JUMP_INDICATOR: &str = " ↓ End: jump to latest ";

/// What a row shows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Text of a user message
    User,
    /// Text of an assistant reply
    Assistant,
    /// Collapse hint
    Hint,
    /// Spacer or reservation padding
    Blank,
}

impl LineKind {
    fn style(self) -> Style {
        match self {
            LineKind::User => Style::default().fg(Color::Green),
            LineKind::Assistant => Style::default().fg(ASSISTANT_COLOR),
            LineKind::Hint => Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            LineKind::Blank => Style::default(),
        }
    }
}

/// One laid-out row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// Row text
    pub text: String,
    /// What the row shows
    pub kind: LineKind,
}

impl Line {
    fn new(text: impl Into<String>, kind: LineKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    fn blank() -> Self {
        Self::new(String::new(), LineKind::Blank)
    }
}

/// Rows of one message
struct Block {
    anchor: String,
    lines: Vec<Line>,
}

/// The conversation pane, as rows
#[derive(Debug, Default)]
pub struct ConversationView {
    width: u16,
    height: u16,
    lines: Vec<Line>,
    /// anchor -> (first row, rows including spacer)
    anchors: HashMap<String, (usize, usize)>,
    scroll_top: f64,
    expanded: HashSet<MessageId>,
}

impl ConversationView {
    /// Create an empty view of the given size
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// The pane changed size
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
    }

    /// Width in columns
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in rows
    pub fn height(&self) -> u16 {
        self.height
    }

    /// All laid-out rows
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// First row and height of a rendered message
    pub fn block_rows(&self, id: &MessageId) -> Option<(usize, usize)> {
        self.anchors.get(&anchor_for(id)).copied()
    }

    /// Whether a long user message is shown in full
    pub fn is_expanded(&self, id: &MessageId) -> bool {
        self.expanded.contains(id)
    }

    /// Flip a message between collapsed and expanded; returns the new state
    pub fn toggle_expanded(&mut self, id: &MessageId) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.clone());
            true
        }
    }

    /// Move the viewport by `rows` (negative is up)
    pub fn scroll_by(&mut self, rows: f64) {
        self.set_scroll_top(self.scroll_top + rows);
    }

    /// Topmost visible row
    pub fn first_visible_row(&self) -> usize {
        self.scroll_top.round().max(0.0) as usize
    }

    /// Lay the conversation out for the current frame
    pub fn layout<T: Transport>(&mut self, widget: &mut ChatWidget<T>) {
        let width = usize::from(self.width.max(1));
        let mut blocks: Vec<Block> = widget
            .messages()
            .iter()
            .map(|message| self.block_for(widget, message, width))
            .collect();
        self.place(&blocks);

        if let Some((id, min_height)) = widget.reserved_min_height(self) {
            let anchor = anchor_for(&id);
            if let Some(block) = blocks.iter_mut().find(|b| b.anchor == anchor) {
                let rows = min_height.ceil() as usize;
                block.lines.resize_with(block.lines.len().max(rows), Line::blank);
            }
            self.place(&blocks);
        }

        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
    }

    fn block_for<T: Transport>(
        &self,
        widget: &ChatWidget<T>,
        message: &Message,
        width: usize,
    ) -> Block {
        let (prefix, kind) = match message.role {
            MessageRole::User => (USER_PREFIX, LineKind::User),
            MessageRole::Assistant => (ASSISTANT_PREFIX, LineKind::Assistant),
        };
        let visible = widget.visible_content(&message.id).unwrap_or_default();
        let mut text = format!("{prefix}{visible}");
        if widget.is_loading(&message.id) {
            text.push(CURSOR);
        }

        let mut lines: Vec<Line> = textwrap::wrap(&text, width)
            .into_iter()
            .map(|row| Line::new(row, kind))
            .collect();

        if message.role == MessageRole::User
            && lines.len() > COLLAPSED_ROWS
            && !self.expanded.contains(&message.id)
        {
            let hidden = lines.len() - (COLLAPSED_ROWS - 1);
            lines.truncate(COLLAPSED_ROWS - 1);
            lines.push(Line::new(
                format!("… {hidden} more lines (Ctrl+O to expand)"),
                LineKind::Hint,
            ));
        }

        lines.push(Line::blank());
        Block {
            anchor: anchor_for(&message.id),
            lines,
        }
    }

    fn place(&mut self, blocks: &[Block]) {
        self.lines.clear();
        self.anchors.clear();
        for block in blocks {
            self.anchors
                .insert(block.anchor.clone(), (self.lines.len(), block.lines.len()));
            self.lines.extend(block.lines.iter().cloned());
        }
    }

    /// Draw the visible rows into `area`
    pub fn render(&self, buf: &mut Buffer, area: Rect) {
        let first = self.first_visible_row();
        for (row, line) in self
            .lines
            .iter()
            .skip(first)
            .take(usize::from(area.height))
            .enumerate()
        {
            let y = area.y + row as u16;
            buf.set_stringn(area.x, y, &line.text, usize::from(area.width), line.kind.style());
        }
    }
}

impl Viewport for ConversationView {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_height(&self) -> f64 {
        self.lines.len() as f64
    }

    fn client_height(&self) -> f64 {
        f64::from(self.height)
    }

    fn set_scroll_top(&mut self, top: f64) {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
    }

    fn anchor_offset(&self, anchor: &str) -> Option<f64> {
        self.anchors.get(anchor).map(|(first, _)| *first as f64)
    }

    fn outer_height(&self, anchor: &str) -> Option<f64> {
        self.anchors.get(anchor).map(|(_, rows)| *rows as f64)
    }
}

/// Draw the greeting centered in an empty conversation
pub fn render_empty_state(buf: &mut Buffer, area: Rect, message: &str) {
    if area.height == 0 {
        return;
    }
    let width = usize::from(area.width.saturating_sub(4)).max(1);
    let rows = textwrap::wrap(message, width);
    let top = area.y + area.height.saturating_sub(rows.len() as u16) / 2;
    for (i, row) in rows.iter().enumerate() {
        let y = top + i as u16;
        if y >= area.bottom() {
            break;
        }
        let x = area.x + area.width.saturating_sub(row.width() as u16) / 2;
        buf.set_stringn(
            x,
            y,
            row,
            usize::from(area.width),
            Style::default().fg(Color::DarkGray),
        );
    }
}

/// Draw the jump-to-bottom affordance on the last row of `area`
pub fn render_jump_indicator(buf: &mut Buffer, area: Rect) {
    if area.height == 0 {
        return;
    }
    let width = JUMP_INDICATOR.width() as u16;
    let x = area.x + area.width.saturating_sub(width + 1);
    buf.set_stringn(
        x,
        area.bottom() - 1,
        JUMP_INDICATOR,
        usize::from(area.width),
        Style::default().fg(Color::Black).bg(Color::Yellow),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::time::Instant;
    use tailchat_core::transport::{EventStream, HandshakeClassifier};
    use tailchat_core::{ChatError, RequestConfig, ScrollConfig, StreamRequest, WidgetConfig};

    /// Accepts every request and never sends anything
    struct SilentTransport;

    #[async_trait]
    impl Transport for SilentTransport {
        fn name(&self) -> &'static str {
            "silent"
        }

        async fn open(
            &self,
            _request: StreamRequest,
            _classify: HandshakeClassifier,
        ) -> Result<EventStream, ChatError> {
            Ok(futures::stream::pending().boxed())
        }
    }

    fn widget() -> ChatWidget<SilentTransport> {
        let config = WidgetConfig {
            request: RequestConfig::new("http://test/chat"),
            ..WidgetConfig::default()
        };
        ChatWidget::new(SilentTransport, &config, ScrollConfig::terminal())
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn test_messages_wrap_into_blocks() {
        let mut widget = widget();
        widget.mount(vec![
            Message::with_id("1", MessageRole::User, "hello there friend"),
            Message::with_id("2", MessageRole::Assistant, "hi"),
        ]);
        let mut view = ConversationView::new(12, 20);
        view.layout(&mut widget);

        let texts: Vec<&str> = view.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["You: hello", "there friend", "", "Assistant:", "hi", ""]
        );
        assert_eq!(view.anchor_offset("msg-1"), Some(0.0));
        assert_eq!(view.outer_height("msg-1"), Some(3.0));
        assert_eq!(view.anchor_offset("msg-2"), Some(3.0));
        assert_eq!(view.scroll_height(), 6.0);
    }

    #[test]
    fn test_long_user_message_collapses() {
        let mut widget = widget();
        let long = (0..30).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        widget.mount(vec![Message::with_id("u", MessageRole::User, long)]);
        let id = MessageId::from("u");
        let mut view = ConversationView::new(40, 20);

        view.layout(&mut widget);
        assert_eq!(view.block_rows(&id), Some((0, COLLAPSED_ROWS + 1)));
        assert_eq!(view.lines()[COLLAPSED_ROWS - 1].kind, LineKind::Hint);
        assert_eq!(
            view.lines()[COLLAPSED_ROWS - 1].text,
            "… 19 more lines (Ctrl+O to expand)"
        );

        assert!(view.toggle_expanded(&id));
        view.layout(&mut widget);
        assert_eq!(view.block_rows(&id), Some((0, 31)));

        assert!(!view.toggle_expanded(&id));
        view.layout(&mut widget);
        assert_eq!(view.block_rows(&id), Some((0, COLLAPSED_ROWS + 1)));
    }

    #[tokio::test]
    async fn test_streaming_reply_reserves_rest_of_view() {
        let mut widget = widget();
        let id = widget.submit("hi", Instant::now()).unwrap();
        let mut view = ConversationView::new(40, 20);
        view.layout(&mut widget);

        // 20 rows - 1 top - 2 (question + spacer) - 1 bottom
        assert_eq!(view.block_rows(&id), Some((0, 2)));
        assert_eq!(view.block_rows(&id.reply_id()), Some((2, 16)));
        assert_eq!(view.lines()[2].text, format!("{ASSISTANT_PREFIX}{CURSOR}"));
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut widget = widget();
        widget.mount(
            (0..10)
                .map(|i| Message::with_id(format!("{i}"), MessageRole::Assistant, "x"))
                .collect(),
        );
        let mut view = ConversationView::new(40, 5);
        view.layout(&mut widget);
        assert_eq!(view.scroll_height(), 20.0);

        view.scroll_by(100.0);
        assert_eq!(view.scroll_top(), 15.0);
        view.scroll_by(-3.4);
        assert_eq!(view.first_visible_row(), 12);
        view.scroll_by(-100.0);
        assert_eq!(view.scroll_top(), 0.0);

        view.scroll_by(100.0);
        view.resize(40, 10);
        assert_eq!(view.scroll_top(), 10.0);
    }

    #[test]
    fn test_render_draws_visible_rows() {
        let mut widget = widget();
        widget.mount(vec![
            Message::with_id("1", MessageRole::User, "one"),
            Message::with_id("2", MessageRole::Assistant, "two"),
        ]);
        let mut view = ConversationView::new(20, 2);
        view.layout(&mut widget);
        view.set_scroll_top(2.0);

        let area = Rect::new(0, 0, 20, 2);
        let mut buf = Buffer::empty(area);
        view.render(&mut buf, area);
        assert_eq!(row_text(&buf, 0), "Assistant: two");
        assert_eq!(row_text(&buf, 1), "");
    }

    #[test]
    fn test_empty_state_is_centered() {
        let area = Rect::new(0, 0, 20, 5);
        let mut buf = Buffer::empty(area);
        render_empty_state(&mut buf, area, "Hello");
        assert_eq!(row_text(&buf, 2), "       Hello");
    }

    #[test]
    fn test_jump_indicator_on_last_row() {
        let area = Rect::new(0, 0, 40, 4);
        let mut buf = Buffer::empty(area);
        render_jump_indicator(&mut buf, area);
        assert!(row_text(&buf, 3).contains("End: jump to latest"));
        assert_eq!(row_text(&buf, 0), "");
    }
}
