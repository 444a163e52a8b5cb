//! # Herald Framework
//!
//! Bot-level building blocks on top of the core event bus.
//!
//! This layer provides:
//! - Event names and payloads ([`ON_UPDATE`], [`ON_MESSAGE`], [`ON_COMMAND`])
//! - Message-type detection ([`MessageKind`])
//! - The classifier and command-parser listeners that derive message and
//!   command events from raw updates
//! - Stock middleware ([`logger`], [`recoverer`], [`context_injector`])
//! - Typed handler registration ([`HandlerRegistry`])
//!
//! ## Event Flow
//!
//! ```text
//! onUpdate ──classifier──▶ onMessage ──command_parser──▶ onCommand
//! ```

pub mod events;
pub mod listeners;
pub mod message_kind;
pub mod middleware;
pub mod registry;

pub use events::{CommandEvent, MessageEvent, ON_COMMAND, ON_MESSAGE, ON_UPDATE, UpdateEvent};
pub use listeners::{classifier, command_parser, parse_command};
pub use message_kind::{MessageKind, UnknownMessageKind};
pub use middleware::{context_injector, logger, recoverer};
pub use registry::HandlerRegistry;
