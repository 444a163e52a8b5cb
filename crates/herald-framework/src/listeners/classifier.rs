use std::sync::Arc;

use herald_core::{EventBus, Listener, typed_listener};
use tracing::trace;

use crate::events::{MessageEvent, ON_MESSAGE, UpdateEvent};

/// Emits [`ON_MESSAGE`] for every update that carries a message.
///
/// Register it on [`ON_UPDATE`](crate::events::ON_UPDATE). Updates without a
/// message, and payloads of other types, are ignored.
pub fn classifier(bus: &EventBus) -> Listener {
    let bus = bus.downgrade();
    typed_listener(move |ctx, event: Arc<UpdateEvent>| {
        let bus = bus.clone();
        async move {
            let (Some(message), Some(bus)) = (&event.update.message, bus.upgrade()) else {
                return Ok(());
            };
            let message_event = MessageEvent::new(message.clone());
            trace!(
                update_id = event.update.update_id,
                kind = %message_event.kind,
                "Classified message"
            );
            bus.emit(&ctx, ON_MESSAGE, Arc::new(message_event)).await;
            Ok(())
        }
    })
}
