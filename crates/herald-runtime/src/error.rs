//! Runtime error types.

use herald_core::{ApiError, ContextError, SourceError};
use thiserror::Error;

use crate::config::ConfigError;

/// Why the dispatch loop stopped abnormally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    /// The loop context was canceled or timed out.
    #[error("dispatch loop aborted: {0}")]
    Context(#[from] ContextError),
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Starting or stopping the update source failed.
    #[error("Update source error: {0}")]
    Source(#[from] SourceError),

    /// A Bot API call made by the runtime failed.
    #[error("Bot API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Bot(#[from] BotError),

    /// The update stream was already taken by another consumer.
    #[error("Update stream already taken")]
    StreamTaken,

    /// The configuration needs a cargo feature that is not enabled.
    #[error("Feature `{0}` is required by this configuration")]
    FeatureDisabled(&'static str),
}

pub type BotResult<T> = Result<T, BotError>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
