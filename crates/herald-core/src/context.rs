//! Cancellation and request-scoped values.
//!
//! A [`Context`] travels with every operation that may block: the poll loop,
//! webhook hand-offs, source start/stop and every listener invocation. It
//! combines three things:
//!
//! - a [`CancellationToken`] that can be fired explicitly,
//! - an optional deadline after which the context counts as done,
//! - an immutable map of typed values (copy-on-write on [`Context::with_value`]).
//!
//! Blocking operations race their work against [`Context::done`]:
//!
//! ```rust,ignore
//! tokio::select! {
//!     res = tx.send(update) => { /* delivered */ }
//!     err = ctx.done() => return Err(err.into()),
//! }
//! ```
//!
//! Derived contexts never cancel their parent: [`Context::with_cancel`] hands
//! out a child token, and deadlines only ever get tighter.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ContextError;

type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Cancellation, deadline and typed values for one unit of work.
#[derive(Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    values: Arc<ValueMap>,
}

impl Context {
    /// Returns an empty context that is never done on its own.
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context with its own cancellation token.
    ///
    /// Cancelling the returned token cancels the derived context (and anything
    /// derived from it) but leaves `self` untouched. Cancelling `self` still
    /// propagates down to the child.
    pub fn with_cancel(&self) -> (Self, CancellationToken) {
        let token = self.token.child_token();
        let ctx = Self {
            token: token.clone(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        };
        (ctx, token)
    }

    /// Derives a context that is done once `timeout` has elapsed.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context that is done at `deadline`.
    ///
    /// If `self` already has an earlier deadline, that one is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
            values: Arc::clone(&self.values),
        }
    }

    /// Derives a context carrying `value`, replacing any previous value of type `T`.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut values = ValueMap::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            values: Arc::new(values),
        }
    }

    /// Looks up the value of type `T`, if one was attached.
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token backing this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns `true` once the context is canceled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is done, yielding the reason.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => ContextError::Canceled,
                    () = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("canceled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .field("values", &self.values.len())
            .finish()
    }
}
