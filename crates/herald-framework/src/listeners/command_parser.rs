use std::sync::Arc;

use herald_core::{EventBus, Listener, Message, MessageEntity, typed_listener};
use tracing::debug;

use crate::events::{CommandEvent, MessageEvent, ON_COMMAND};
use crate::message_kind::MessageKind;

/// Emits [`ON_COMMAND`] for text messages that contain a bot command.
///
/// Register it on [`ON_MESSAGE`](crate::events::ON_MESSAGE). Commands
/// addressed to another bot (`/start@otherbot`) are skipped; when `bot_name` is
/// `None` every addressed command is skipped. Only the first matching command
/// of a message is emitted.
pub fn command_parser(bus: &EventBus, bot_name: Option<String>) -> Listener {
    let bus = bus.downgrade();
    let bot_name: Option<Arc<str>> = bot_name.map(Into::into);
    typed_listener(move |ctx, event: Arc<MessageEvent>| {
        let bus = bus.clone();
        let bot_name = bot_name.clone();
        async move {
            if event.kind != MessageKind::Text {
                return Ok(());
            }
            let Some(command) = parse_command(&event.message, bot_name.as_deref()) else {
                return Ok(());
            };
            let Some(bus) = bus.upgrade() else {
                return Ok(());
            };
            debug!(
                command = %command.command,
                message_id = event.message.message_id,
                "Command received"
            );
            bus.emit(&ctx, ON_COMMAND, Arc::new(command)).await;
            Ok(())
        }
    })
}

/// Extracts the first command addressed to this bot from `message`.
pub fn parse_command(message: &Message, bot_name: Option<&str>) -> Option<CommandEvent> {
    let text = message.text.as_deref()?;
    let units: Vec<u16> = text.encode_utf16().collect();

    message
        .entities
        .iter()
        .filter(|e| e.is_bot_command())
        .find_map(|entity| {
            let raw = slice_units(&units, entity.offset, entity.length);
            let command = match raw.split_once('@') {
                Some((name, addressee)) => {
                    match bot_name {
                        Some(bot) if addressee.eq_ignore_ascii_case(bot) => name,
                        _ => return None,
                    }
                }
                None => raw.as_str(),
            };
            let command = command.strip_prefix('/').unwrap_or(command).to_string();
            let args = slice_from(&units, end_of(entity))
                .trim_start_matches(' ')
                .to_string();
            Some(CommandEvent {
                message: message.clone(),
                command,
                args,
            })
        })
}

fn end_of(entity: &MessageEntity) -> usize {
    entity.offset.saturating_add(entity.length)
}

/// Decodes `units[offset..offset + length]`, clamped to the text.
fn slice_units(units: &[u16], offset: usize, length: usize) -> String {
    let start = offset.min(units.len());
    let end = offset.saturating_add(length).min(units.len());
    String::from_utf16_lossy(&units[start..end])
}

fn slice_from(units: &[u16], offset: usize) -> String {
    String::from_utf16_lossy(&units[offset.min(units.len())..])
}
