//! Herald Runtime - Orchestration layer for the Herald bot runtime.
//!
//! This crate provides:
//! - The bot and its dispatch loop (`Bot`, `BotBuilder`, `BotHandle`)
//! - Update-source lifecycle (`run_source`)
//! - Process orchestration with signal handling (`HeraldRuntime`)
//! - Layered configuration (`config`)
//! - Logging configuration (`logging`)
//!
//! # From Configuration
//!
//! With the default `http-client` feature the runtime builds the upstream
//! client and the configured update source itself:
//!
//! ```ignore
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().profile("production").build().await?;
//!
//!     runtime.handlers().on_command_named("start", |_ctx, cmd| async move {
//!         tracing::info!(chat = cmd.message.chat.id, "start");
//!         Ok(())
//!     });
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Manual Wiring
//!
//! ```ignore
//! use herald_runtime::{Bot, HeraldRuntime};
//!
//! let bot = Bot::builder().name("my_bot").build();
//! let runtime = HeraldRuntime::new(bot, Arc::new(my_source));
//! runtime.run_until(shutdown_signal).await?;
//! ```
//!
//! # Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `http-client` (default): the `HttpBotApi` client and the poller source
//! - `http-server`: the webhook source

pub mod bot;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod runtime;

// Re-exports
pub use bot::{Bot, BotBuilder, BotHandle};
pub use config::{ConfigError, ConfigLoader, ConfigResult, HeraldConfig, load_config};
pub use error::{BotError, BotResult, RuntimeError, RuntimeResult};
pub use lifecycle::{LifecycleTimeouts, run_source};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::HeraldRuntime;
#[cfg(feature = "http-client")]
pub use runtime::RuntimeBuilder;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros and `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
