//! # Herald
//!
//! An event-driven runtime for chat bots. Updates arrive from a long-polling
//! loop or a webhook, flow through a named-event bus with middleware, and
//! reach typed handlers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────┐     ┌────────────┐     ┌───────────┐     ┌──────────────────┐
//! │ Poller / Webhook │────▶│ Bot │────▶│  onUpdate  │────▶│ onMessage │────▶│    onCommand     │
//! │  (UpdateSource)  │     │     │     │ (EventBus) │     │           │     │ (handlers: /ping)│
//! └──────────────────┘     └─────┘     └────────────┘     └───────────┘     └──────────────────┘
//! ```
//!
//! - **Sources**: produce updates on a bounded stream (`herald-transport`)
//! - **Event bus**: glob-scoped middleware, ordered listeners, `Break`
//!   short-circuit (`herald-core`)
//! - **Listeners**: classifier and command parser (`herald-framework`)
//! - **Runtime**: configuration, logging, lifecycle, signals (`herald-runtime`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::builder().build().await?;
//!
//!     runtime.handlers().on_command_named("ping", |ctx, cmd| async move {
//!         if let Some(api) = BotHandle::from_context(&ctx).and_then(|h| h.api().cloned()) {
//!             api.send_message(&ctx, cmd.message.chat.id, "pong").await?;
//!         }
//!         Ok(())
//!     });
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default), `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `http-client` (default): Bot API client and the poller source
//! - `http-server`: webhook source

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;
pub use herald_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{Bot, BotHandle, HeraldRuntime};

    #[cfg(feature = "http-client")]
    pub use herald_transport::HttpBotApi;

    // Event system
    pub use herald_core::{
        BoxError, Break, Context, EventBus, Listener, Middleware, Payload, Subscription,
        listener_fn, middleware_fn,
    };
    pub use herald_framework::{
        CommandEvent, HandlerRegistry, MessageEvent, MessageKind, ON_COMMAND, ON_MESSAGE,
        ON_UPDATE, UpdateEvent,
    };

    // Update model
    pub use herald_core::{Chat, Message, Update, User};

    // Sources
    pub use herald_core::UpdateSource;
}
