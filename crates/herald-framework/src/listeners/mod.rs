//! Built-in listeners that derive higher-level events from updates.

mod classifier;
mod command_parser;

pub use classifier::classifier;
pub use command_parser::{command_parser, parse_command};
