//! Tailchat TUI Entry Point
//!
//! Launches a streaming chat in the terminal.
//!
//! Configuration comes from `$XDG_CONFIG_HOME/tailchat/tailchat.toml` and
//! `TAILCHAT_*` environment variables. Logs go to the file named by
//! `TAILCHAT_LOG` (filtered with `RUST_LOG`), since stdout is the UI.

use std::io;
use std::panic;
use std::sync::Mutex;

use anyhow::Context;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tailchat_core::{load_config, ChatWidget, HttpTransport, ScrollConfig};
use tailchat_tui::{load_history, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    // Check if we have a TTY before attempting initialization
    use std::io::IsTerminal;

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: tailchat requires a terminal (TTY)");
        eprintln!();
        eprintln!("This usually means:");
        eprintln!("  • Running in a non-interactive environment (CI, container)");
        eprintln!("  • SSH without -t flag");
        eprintln!("  • Piped stdin/stdout");
        std::process::exit(1);
    }

    let config = load_config().context("Failed to load configuration")?;
    tracing::info!(
        endpoint = %config.request.endpoint,
        method = %config.request.method,
        source = %config.source,
        "Starting tailchat"
    );

    let transport = HttpTransport::new(config.retry.clone(), config.connect_timeout)
        .context("Failed to create HTTP client")?;
    let mut widget = ChatWidget::new(transport, &config, ScrollConfig::terminal());
    if let Some(path) = &config.history_path {
        widget.mount(load_history(path)?);
    }

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal before printing panic
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Run the app
    let size = crossterm::terminal::size()?;
    let mut app = App::new(widget, size);
    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    // Propagate any errors
    result
}

/// Log to the file named by `TAILCHAT_LOG`; without it, logging is off
fn init_logging() -> anyhow::Result<()> {
    let Some(path) = std::env::var_os("TAILCHAT_LOG") else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.to_string_lossy()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(EnvFilter::from_default_env())
        .init();
    Ok(())
}
