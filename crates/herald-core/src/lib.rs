//! # Herald Core
//!
//! The event-dispatch engine of the Herald bot runtime.
//!
//! This crate holds everything that does not touch the network:
//!
//! - **Context**: cancellation, deadlines and request-scoped values ([`Context`])
//! - **Event Bus**: glob-routed publish/subscribe with middleware and
//!   break/stop-on-error semantics ([`EventBus`])
//! - **Update Model**: the inbound payloads ([`Update`], [`Message`])
//! - **Capabilities**: the seams the transport layer implements
//!   ([`UpdateSource`], [`UpdateFetcher`], [`WebhookRegistrar`], [`CursorStore`])
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐  bounded   ┌───────────────┐      ┌──────────┐
//! │ UpdateSource │──channel──▶│ Dispatch Loop │─emit▶│ EventBus │──▶ listeners
//! │ (poll / hook)│            │   (runtime)   │      │          │
//! └──────────────┘            └───────────────┘      └──────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use herald_core::{Context, EventBus, listener_fn};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//! let sub = bus.add_listener("user.*", listener_fn(|_ctx, payload| async move {
//!     if let Some(name) = payload.downcast_ref::<String>() {
//!         println!("hello {name}");
//!     }
//!     Ok(())
//! }));
//!
//! bus.emit(&Context::background(), "user.joined", Arc::new("ann".to_string())).await;
//! sub.unsubscribe();
//! ```

pub mod bus;
pub mod context;
pub mod cursor;
pub mod error;
pub mod source;
pub mod update;

pub use bus::{
    Break, ErrorHandler, EventBus, EventBusOptions, EventPattern, Listener, ListenerPanicked,
    ListenerResult, Middleware, Payload, Subscription, WeakEventBus, listener_fn, matches,
    middleware_fn, typed_listener,
};
pub use context::Context;
pub use cursor::{CursorStore, InMemoryCursorStore};
pub use error::{
    ApiError, ApiResult, ContextError, CursorError, CursorResult, SourceError, SourceResult,
};
pub use source::{UpdateFetcher, UpdateReceiver, UpdateSource, WebhookRegistrar};
pub use update::{Chat, Message, MessageEntity, Update, User};

/// Re-exported so listener signatures can name the error type without
/// depending on tower directly.
pub use tower::BoxError;

/// Prelude for common imports.
pub mod prelude {
    pub use super::bus::{Break, EventBus, Listener, Middleware, Payload, Subscription};
    pub use super::bus::{listener_fn, middleware_fn};
    pub use super::context::Context;
    pub use super::update::{Message, Update};
    pub use tower::BoxError;
}
