//! Event names and payloads emitted by the framework.
//!
//! The dispatch loop emits [`ON_UPDATE`] for every update. The classifier
//! fans messages out as [`ON_MESSAGE`], and the command parser turns
//! `/commands` into [`ON_COMMAND`].

use herald_core::{Message, Update};

use crate::message_kind::MessageKind;

/// Emitted once per received update.
pub const ON_UPDATE: &str = "onUpdate";

/// Emitted for every update carrying a message, whatever its kind.
pub const ON_MESSAGE: &str = "onMessage";

/// Emitted for text messages that start with a bot command.
pub const ON_COMMAND: &str = "onCommand";

/// Payload of [`ON_UPDATE`].
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub update: Update,
}

impl UpdateEvent {
    pub fn new(update: Update) -> Self {
        Self { update }
    }
}

/// Payload of [`ON_MESSAGE`].
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message: Message,
    /// Most specific kind detected for `message`.
    pub kind: MessageKind,
}

impl MessageEvent {
    /// Wraps `message`, detecting its kind.
    pub fn new(message: Message) -> Self {
        let kind = MessageKind::detect(&message);
        Self { message, kind }
    }
}

/// Payload of [`ON_COMMAND`].
#[derive(Debug, Clone)]
pub struct CommandEvent {
    pub message: Message,
    /// Command name without the leading `/` or the `@botname` suffix.
    pub command: String,
    /// Text following the command, leading spaces removed.
    pub args: String,
}
