//! Listener and middleware building blocks.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;
use tower::BoxError;

use crate::context::Context;

/// Type-erased event payload.
///
/// Emitters wrap their payload in an `Arc` once; every matched listener gets a
/// cheap clone.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// The result every listener produces.
pub type ListenerResult = Result<(), BoxError>;

/// A registered callback.
///
/// Listeners are plain reference-counted closures so that middleware can wrap
/// them without knowing their concrete type.
pub type Listener = Arc<dyn Fn(Context, Payload) -> BoxFuture<'static, ListenerResult> + Send + Sync>;

/// A listener decorator: receives the next listener and returns a wrapped one.
pub type Middleware = Arc<dyn Fn(Listener) -> Listener + Send + Sync>;

/// Called with `(event_name, error)` whenever a listener fails.
pub type ErrorHandler = Arc<dyn Fn(&str, &BoxError) + Send + Sync>;

/// Returned by a listener to stop propagation for the current emission.
///
/// The bus recognises this error and halts iteration without reporting
/// anything to the error handler. All other errors are genuine failures.
///
/// ```rust,ignore
/// bus.add_listener("onMessage", listener_fn(|_ctx, _payload| async {
///     Err(Break.into())
/// }));
/// ```
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("break")]
pub struct Break;

impl Break {
    /// Returns `true` if `err` is the break sentinel.
    pub fn is(err: &BoxError) -> bool {
        err.is::<Break>()
    }
}

/// Reported when a listener panics instead of returning.
#[derive(Debug, Clone, Error)]
#[error("listener panicked: {message}")]
pub struct ListenerPanicked {
    /// The panic message, when it was a string.
    pub message: String,
}

impl ListenerPanicked {
    /// Builds the error from a payload caught by `catch_unwind`.
    pub fn from_panic(panic: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = panic.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Builds a [`Listener`] from an async closure.
pub fn listener_fn<F, Fut>(f: F) -> Listener
where
    F: Fn(Context, Payload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    Arc::new(move |ctx, payload| f(ctx, payload).boxed())
}

/// Builds a [`Middleware`] from a closure over the next listener.
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(Listener) -> Listener + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps a typed handler so it only runs for payloads of type `T`.
///
/// Payloads of any other type are ignored and count as success.
pub fn typed_listener<T, F, Fut>(handler: F) -> Listener
where
    T: Send + Sync + 'static,
    F: Fn(Context, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |ctx, payload: Payload| match payload.downcast::<T>() {
        Ok(typed) => handler(ctx, typed).boxed(),
        Err(_) => futures::future::ready(Ok(())).boxed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let literal = ListenerPanicked::from_panic(Box::new("boom"));
        assert_eq!(literal.message, "boom");

        let formatted = ListenerPanicked::from_panic(Box::new(format!("code {}", 7)));
        assert_eq!(formatted.message, "code 7");

        let other = ListenerPanicked::from_panic(Box::new(42u8));
        assert_eq!(other.message, "non-string panic payload");
    }
}
