//! In-process publish/subscribe bus.
//!
//! Listeners subscribe to glob patterns over event names. Middleware wraps
//! every listener invoked for a matching event name. See [`EventBus`] for the
//! emission rules.

mod emitter;
mod listener;
mod pattern;

pub use emitter::{EventBus, EventBusOptions, Subscription, WeakEventBus};
pub use listener::{
    Break, ErrorHandler, Listener, ListenerPanicked, ListenerResult, Middleware, Payload,
    listener_fn, middleware_fn, typed_listener,
};
pub use pattern::{EventPattern, matches};
