//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub bot: BotConfig,

    /// Where updates come from.
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Rotation policy of the log file.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module level overrides, e.g. `herald_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            filters: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

// =============================================================================
// Bot
// =============================================================================

/// Upstream Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot token issued by the platform.
    #[serde(default)]
    pub token: String,

    /// Base URL of the Bot API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bot username used to filter `/command@name`. Looked up with `getMe`
    /// when unset.
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            name: None,
        }
    }
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

// =============================================================================
// Update Source
// =============================================================================

/// Update source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Pull updates with `getUpdates`.
    Poller(PollerConfig),

    /// Receive updates pushed over HTTP.
    Webhook(WebhookConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Poller(PollerConfig::default())
    }
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Poller(_) => "poller",
            Self::Webhook(_) => "webhook",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay between poll cycles in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Capacity of the update stream.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Maximum batch size per `getUpdates` call.
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Upstream long-poll timeout in seconds. `0` means short polling.
    #[serde(default)]
    pub long_poll_secs: u64,

    /// Persist the cursor in this file instead of memory.
    #[serde(default)]
    pub cursor_file: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            buffer_size: default_buffer_size(),
            limit: default_limit(),
            long_poll_secs: 0,
            cursor_file: None,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_buffer_size() -> usize {
    100
}

fn default_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Route the webhook is served at.
    #[serde(default = "default_path")]
    pub path: String,

    /// Shared secret expected in the secret-token header.
    #[serde(default)]
    pub secret_token: Option<String>,

    /// Public HTTPS URL registered upstream on start.
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// How long a request may wait for room in the stream, in milliseconds.
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            path: default_path(),
            secret_token: None,
            public_url: None,
            buffer_size: default_buffer_size(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
        }
    }
}

impl WebhookConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_path() -> String {
    "/".to_string()
}

fn default_enqueue_timeout_ms() -> u64 {
    10_000
}

// =============================================================================
// Bus and Shutdown
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Stop an emission at the first failing listener.
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            stop_on_error: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Bounds for the update source lifecycle calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    #[serde(default = "default_lifecycle_timeout_ms")]
    pub start_timeout_ms: u64,

    #[serde(default = "default_lifecycle_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: default_lifecycle_timeout_ms(),
            stop_timeout_ms: default_lifecycle_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn default_lifecycle_timeout_ms() -> u64 {
    10_000
}
