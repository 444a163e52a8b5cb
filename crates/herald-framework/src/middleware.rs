//! Stock middleware.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error};

use herald_core::{Break, Listener, ListenerPanicked, Middleware, listener_fn, middleware_fn};

/// Logs every listener invocation at debug level and failures at error level.
///
/// The break sentinel is passed through without being logged as a failure.
pub fn logger() -> Middleware {
    middleware_fn(|next: Listener| {
        listener_fn(move |ctx, payload| {
            let next = Arc::clone(&next);
            async move {
                debug!("Handling event");
                let result = next(ctx, payload).await;
                if let Err(e) = &result
                    && !Break::is(e)
                {
                    error!(error = %e, "Error handling event");
                }
                result
            }
        })
    })
}

/// Turns a panic inside the wrapped listener into a logged success.
///
/// The bus already contains panics; with this middleware they are reported
/// as log lines and do not count against `stop_on_error`.
pub fn recoverer() -> Middleware {
    middleware_fn(|next: Listener| {
        listener_fn(move |ctx, payload| {
            let next = Arc::clone(&next);
            async move {
                match AssertUnwindSafe(async move { next(ctx, payload).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let panicked = ListenerPanicked::from_panic(panic);
                        error!(panic = %panicked.message, "Panic recovered");
                        Ok(())
                    }
                }
            }
        })
    })
}

/// Attaches `value` to the context of every wrapped listener.
///
/// Listeners read it back with `ctx.value::<T>()`.
pub fn context_injector<T>(value: T) -> Middleware
where
    T: Clone + Send + Sync + 'static,
{
    middleware_fn(move |next: Listener| {
        let value = value.clone();
        listener_fn(move |ctx, payload| next(ctx.with_value(value.clone()), payload))
    })
}
