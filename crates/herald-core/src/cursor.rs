//! Cursor persistence for the poller.
//!
//! The cursor is the smallest update id not yet acknowledged as delivered.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::context::Context;
use crate::error::CursorResult;

/// Durable storage for the poll cursor.
///
/// Implementations must tolerate concurrent `load`/`save` calls.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Reads the current cursor.
    async fn load(&self, ctx: &Context) -> CursorResult<i64>;

    /// Persists a new cursor.
    async fn save(&self, ctx: &Context, cursor: i64) -> CursorResult<()>;
}

/// Process-local cursor backed by an atomic integer.
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursor: AtomicI64,
}

impl InMemoryCursorStore {
    pub fn new(initial: i64) -> Self {
        Self {
            cursor: AtomicI64::new(initial),
        }
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn load(&self, _ctx: &Context) -> CursorResult<i64> {
        Ok(self.cursor.load(Ordering::SeqCst))
    }

    async fn save(&self, _ctx: &Context, cursor: i64) -> CursorResult<()> {
        self.cursor.store(cursor, Ordering::SeqCst);
        Ok(())
    }
}
