//! TOML Configuration File Support
//!
//! Configuration loading for the chat widget, supporting a TOML file at
//! `~/.config/tailchat/tailchat.toml`.
//!
//! # Configuration Priority
//!
//! Values are loaded with the following priority (highest first):
//! 1. Environment variables (`TAILCHAT_*`)
//! 2. TOML configuration file
//! 3. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [request]
//! endpoint = "https://chat.example.com/api/stream"
//! method = "POST"
//! sentinel = "[DONE]"
//! connect_timeout_ms = 10000
//!
//! [request.headers]
//! Authorization = "Bearer token"
//!
//! [retry]
//! max_retries = 3
//! initial_backoff_ms = 100
//!
//! [scroll]
//! near_bottom_threshold = 2
//!
//! [reveal]
//! interval_ms = 5
//!
//! [ui]
//! title = "Support"
//! empty_state_message = "Ask me anything"
//! history_path = "~/chat-history.json"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scroll::ScrollConfig;
use crate::transport::{HttpMethod, RetryConfig, DEFAULT_CONNECT_TIMEOUT};

/// Default end-of-stream marker
pub const DEFAULT_SENTINEL: &str = "[DONE]";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Request section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestToml {
    /// Streaming endpoint URL
    pub endpoint: Option<String>,
    /// `GET` or `POST`
    pub method: Option<HttpMethod>,
    /// Extra request headers
    pub headers: Option<BTreeMap<String, String>>,
    /// End-of-stream marker
    pub sentinel: Option<String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Retry section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryToml {
    /// Maximum retries after the first attempt
    pub max_retries: Option<u32>,
    /// Initial backoff in milliseconds
    pub initial_backoff_ms: Option<u64>,
    /// Backoff cap in milliseconds
    pub max_backoff_ms: Option<u64>,
    /// Backoff multiplier
    pub backoff_multiplier: Option<f32>,
    /// Whether to add jitter
    pub use_jitter: Option<bool>,
}

/// Scroll section of the TOML configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollToml {
    /// Near-bottom threshold
    pub near_bottom_threshold: Option<f64>,
    /// Follow-on-growth duration in milliseconds
    pub follow_duration_ms: Option<u64>,
    /// Turn-start scroll duration in milliseconds
    pub turn_scroll_duration_ms: Option<u64>,
    /// Gap above the sent message after the turn-start scroll
    pub turn_scroll_offset: Option<f64>,
    /// Jump-to-bottom duration in milliseconds
    pub jump_duration_ms: Option<u64>,
    /// Scroll lock after jump-to-bottom in milliseconds
    pub jump_lock_ms: Option<u64>,
    /// Reservation top padding
    pub top_padding: Option<f64>,
    /// Reservation bottom margin
    pub bottom_margin: Option<f64>,
}

/// Reveal section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealToml {
    /// Milliseconds per revealed character (0 disables)
    pub interval_ms: Option<u64>,
}

/// UI section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiToml {
    /// Title shown above the conversation
    pub title: Option<String>,
    /// Greeting shown while the conversation is empty
    pub empty_state_message: Option<String>,
    /// JSON file with initial history
    pub history_path: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TailchatToml {
    /// Request section
    pub request: RequestToml,
    /// Retry section
    pub retry: RetryToml,
    /// Scroll section
    pub scroll: ScrollToml,
    /// Reveal section
    pub reveal: RevealToml,
    /// UI section
    pub ui: UiToml,
}

// =============================================================================
// Main Configuration Structs
// =============================================================================

/// Where and how each turn is sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestConfig {
    /// Streaming endpoint URL
    pub endpoint: String,
    /// Request method
    pub method: HttpMethod,
    /// Extra request headers (override the defaults)
    pub headers: BTreeMap<String, String>,
    /// End-of-stream marker
    pub sentinel: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/chat".to_string(),
            method: HttpMethod::Post,
            headers: BTreeMap::new(),
            sentinel: DEFAULT_SENTINEL.to_string(),
        }
    }
}

impl RequestConfig {
    /// Create a request config for an endpoint with default settings
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set the method
    #[must_use]
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the end-of-stream marker
    #[must_use]
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }
}

/// Centralized configuration for the chat widget
#[derive(Clone, Debug)]
pub struct WidgetConfig {
    /// Request settings
    pub request: RequestConfig,
    /// Handshake retry policy
    pub retry: RetryConfig,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Scroll overrides, applied on top of a surface's base [`ScrollConfig`]
    pub scroll: ScrollToml,
    /// Time per revealed character (zero disables pacing)
    pub reveal_interval: Duration,
    /// Title shown above the conversation
    pub title: Option<String>,
    /// Greeting shown while the conversation is empty
    pub empty_state_message: String,
    /// JSON file with initial history
    pub history_path: Option<PathBuf>,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    /// Source of configuration values
    pub source: ConfigSource,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            request: RequestConfig::default(),
            retry: RetryConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            scroll: ScrollToml::default(),
            reveal_interval: Duration::from_millis(5),
            title: None,
            empty_state_message: "Hi, I'm your AI assistant. How can I help?".to_string(),
            history_path: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl WidgetConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the scroll overrides to a surface's base configuration
    #[must_use]
    pub fn scroll_config(&self, base: ScrollConfig) -> ScrollConfig {
        let o = &self.scroll;
        ScrollConfig {
            near_bottom_threshold: o.near_bottom_threshold.unwrap_or(base.near_bottom_threshold),
            follow_duration_ms: o.follow_duration_ms.unwrap_or(base.follow_duration_ms),
            turn_scroll_duration_ms: o
                .turn_scroll_duration_ms
                .unwrap_or(base.turn_scroll_duration_ms),
            turn_scroll_offset: o.turn_scroll_offset.unwrap_or(base.turn_scroll_offset),
            turn_settle_delay_ms: base.turn_settle_delay_ms,
            jump_duration_ms: o.jump_duration_ms.unwrap_or(base.jump_duration_ms),
            jump_lock_ms: o.jump_lock_ms.unwrap_or(base.jump_lock_ms),
            top_padding: o.top_padding.unwrap_or(base.top_padding),
            bottom_margin: o.bottom_margin.unwrap_or(base.bottom_margin),
        }
    }

    /// Check values that would make the widget misbehave
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.request.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint must be an http(s) URL, got {endpoint:?}"
            )));
        }
        if self.request.sentinel.is_empty() {
            return Err(ConfigError::ValidationError(
                "sentinel must not be empty".to_string(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.scroll.jump_duration_ms.is_some() || self.scroll.jump_lock_ms.is_some() {
            let effective = self.scroll_config(ScrollConfig::default());
            let (lock, ms) = (effective.jump_lock_ms, effective.jump_duration_ms);
            if lock <= ms {
                return Err(ConfigError::ValidationError(format!(
                    "jump_lock_ms ({lock}) must exceed jump_duration_ms ({ms})"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/tailchat/tailchat.toml` or
/// `~/.config/tailchat/tailchat.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tailchat").join("tailchat.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// merged configuration is invalid. A missing config file is not an error.
pub fn load_config() -> Result<WidgetConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<WidgetConfig, ConfigError> {
    load_config_with_env(path.as_deref(), |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<WidgetConfig, ConfigError> {
    // Start with defaults
    let mut config = WidgetConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: TailchatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Environment overrides file values
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut WidgetConfig, toml: TailchatToml) {
    // Request settings
    if let Some(endpoint) = toml.request.endpoint {
        config.request.endpoint = endpoint;
    }
    if let Some(method) = toml.request.method {
        config.request.method = method;
    }
    if let Some(headers) = toml.request.headers {
        config.request.headers.extend(headers);
    }
    if let Some(sentinel) = toml.request.sentinel {
        config.request.sentinel = sentinel;
    }
    if let Some(ms) = toml.request.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }

    // Retry settings
    if let Some(n) = toml.retry.max_retries {
        config.retry.max_retries = n;
    }
    if let Some(ms) = toml.retry.initial_backoff_ms {
        config.retry.initial_backoff_ms = ms;
    }
    if let Some(ms) = toml.retry.max_backoff_ms {
        config.retry.max_backoff_ms = ms;
    }
    if let Some(m) = toml.retry.backoff_multiplier {
        config.retry.backoff_multiplier = m;
    }
    if let Some(jitter) = toml.retry.use_jitter {
        config.retry.use_jitter = jitter;
    }

    config.scroll = toml.scroll;

    if let Some(ms) = toml.reveal.interval_ms {
        config.reveal_interval = Duration::from_millis(ms);
    }

    // UI settings
    if toml.ui.title.is_some() {
        config.title = toml.ui.title;
    }
    if let Some(message) = toml.ui.empty_state_message {
        config.empty_state_message = message;
    }
    if toml.ui.history_path.is_some() {
        config.history_path = toml.ui.history_path;
    }
}

/// Apply `TAILCHAT_*` environment variables
fn apply_env_config(config: &mut WidgetConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(endpoint) = env("TAILCHAT_ENDPOINT") {
        config.request.endpoint = endpoint;
        config.source = ConfigSource::Env;
    }
    if let Some(method) = env("TAILCHAT_METHOD") {
        match method.parse::<HttpMethod>() {
            Ok(m) => {
                config.request.method = m;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring TAILCHAT_METHOD"),
        }
    }
    if let Some(headers) = env("TAILCHAT_HEADERS") {
        config.request.headers.extend(parse_header_list(&headers));
        config.source = ConfigSource::Env;
    }
    if let Some(sentinel) = env("TAILCHAT_SENTINEL") {
        config.request.sentinel = sentinel;
        config.source = ConfigSource::Env;
    }
    if let Some(retries) = env("TAILCHAT_MAX_RETRIES") {
        if let Ok(n) = retries.parse::<u32>() {
            config.retry.max_retries = n;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(interval) = env("TAILCHAT_REVEAL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.reveal_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(path) = env("TAILCHAT_HISTORY") {
        config.history_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
}

/// Parse `Name: value; Other: value` into header pairs
fn parse_header_list(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}
