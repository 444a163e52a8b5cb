//! Error types shared across the Herald crates.
//!
//! Listener failures are plain [`BoxError`](tower::BoxError)s; everything the
//! ingestion layer can report is modelled here.

use thiserror::Error;

// =============================================================================
// Context Errors
// =============================================================================

/// Why a [`Context`](crate::Context) is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was canceled explicitly.
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

// =============================================================================
// Cursor Errors
// =============================================================================

/// Errors raised by a [`CursorStore`](crate::CursorStore).
#[derive(Debug, Clone, Error)]
pub enum CursorError {
    /// The backing storage could not be read or written.
    #[error("cursor storage error: {0}")]
    Storage(String),

    /// The stored value is not a valid cursor.
    #[error("invalid stored cursor: {0}")]
    Corrupt(String),

    /// The operation was abandoned because its context finished.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl From<std::io::Error> for CursorError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

// =============================================================================
// API Errors
// =============================================================================

/// Errors raised by the upstream Bot API collaborator.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("API error ({status}): {description}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Description returned by the upstream, if any.
        description: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The call was abandoned because its context finished.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors raised by an [`UpdateSource`](crate::UpdateSource) lifecycle call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The start/stop context finished before the operation completed.
    ///
    /// For `stop` this means the worker is still winding down in the
    /// background.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A previous `stop` timed out and its worker has not exited yet.
    #[error("update source is still stopping")]
    StillStopping,

    /// The source failed to bind its listener.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// Requested bind address.
        addr: String,
        /// Underlying I/O error.
        reason: String,
    },

    /// Registering with the upstream failed.
    #[error("upstream registration failed: {0}")]
    Registration(#[from] ApiError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for cursor store operations.
pub type CursorResult<T> = Result<T, CursorError>;

/// Result type for upstream API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for update source lifecycle calls.
pub type SourceResult<T> = Result<T, SourceError>;
