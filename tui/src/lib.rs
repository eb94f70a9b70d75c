//! Tailchat TUI - Terminal surface for tailchat
//!
//! This crate embeds the headless chat core in a full-screen terminal UI.
//! Rows are the length unit handed to the scroll controller.
//!
//! # Architecture
//!
//! - **App**: Event loop, key bindings, and screen layout
//! - **Display**: Conversation layout as a row-based viewport
//! - **History**: Initial conversation loaded from a JSON file

pub mod app;
pub mod display;
pub mod history;

pub use app::App;
pub use display::ConversationView;
pub use history::load_history;
