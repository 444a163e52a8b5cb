//! Typed handler registration on top of the event bus.

use std::future::Future;
use std::sync::Arc;

use herald_core::{BoxError, Context, EventBus, Subscription};
use tracing::debug;

use crate::events::{CommandEvent, MessageEvent, ON_COMMAND, ON_MESSAGE, ON_UPDATE, UpdateEvent};
use crate::message_kind::MessageKind;

/// Registers typed handlers for the framework events.
///
/// Every method returns the [`Subscription`] of the underlying listener.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    bus: EventBus,
}

impl HandlerRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Handles every update.
    pub fn on_update<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(Context, Arc<UpdateEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        debug!(event = ON_UPDATE, "Adding update handler");
        self.bus.on(ON_UPDATE, handler)
    }

    /// Handles every message, whatever its kind.
    pub fn on_message<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(Context, Arc<MessageEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        debug!(event = ON_MESSAGE, "Adding message handler");
        self.bus.on(ON_MESSAGE, handler)
    }

    /// Handles messages of the given kinds. An empty list matches every kind.
    pub fn on_message_kind<I, F, Fut>(&self, kinds: I, handler: F) -> Subscription
    where
        I: IntoIterator<Item = MessageKind>,
        F: Fn(Context, Arc<MessageEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let kinds: Vec<MessageKind> = kinds.into_iter().collect();
        debug!(event = ON_MESSAGE, ?kinds, "Adding message handler");
        self.bus.on(ON_MESSAGE, move |ctx, event: Arc<MessageEvent>| {
            let run = kinds.is_empty() || kinds.contains(&event.kind);
            let fut = run.then(|| handler(ctx, event));
            async move {
                match fut {
                    Some(fut) => fut.await,
                    None => Ok(()),
                }
            }
        })
    }

    /// Handles every command.
    pub fn on_command<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(Context, Arc<CommandEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        debug!(event = ON_COMMAND, "Adding command handler");
        self.bus.on(ON_COMMAND, handler)
    }

    /// Handles one command, matched by exact name without the leading `/`.
    pub fn on_command_named<F, Fut>(&self, name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Context, Arc<CommandEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        debug!(event = ON_COMMAND, command = %name, "Adding command handler");
        self.bus.on(ON_COMMAND, move |ctx, event: Arc<CommandEvent>| {
            let fut = (event.command == name).then(|| handler(ctx, event));
            async move {
                match fut {
                    Some(fut) => fut.await,
                    None => Ok(()),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Message, Update};
    use parking_lot::Mutex;

    type Seen<T> = Arc<Mutex<Vec<Arc<T>>>>;

    fn recorder<T: Send + Sync + 'static>() -> (
        Seen<T>,
        impl Fn(Context, Arc<T>) -> futures::future::Ready<Result<(), BoxError>> + Send + Sync + 'static,
    ) {
        let seen: Seen<T> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = move |_ctx: Context, event: Arc<T>| {
            sink.lock().push(event);
            futures::future::ready(Ok(()))
        };
        (seen, handler)
    }

    fn message_event(kind: MessageKind) -> Arc<MessageEvent> {
        Arc::new(MessageEvent {
            message: Message::text(1, 1, "hi"),
            kind,
        })
    }

    fn command_event(command: &str) -> Arc<CommandEvent> {
        Arc::new(CommandEvent {
            message: Message::text(1, 1, format!("/{command}")),
            command: command.to_string(),
            args: String::new(),
        })
    }

    #[tokio::test]
    async fn test_on_update() {
        let bus = EventBus::new();
        let registry = HandlerRegistry::new(bus.clone());
        let (seen, handler) = recorder::<UpdateEvent>();
        let sub = registry.on_update(handler);

        let payload = Arc::new(UpdateEvent::new(Update::new(1)));
        bus.emit(&Context::background(), ON_UPDATE, payload.clone()).await;
        assert_eq!(seen.lock().len(), 1);
        assert!(Arc::ptr_eq(&seen.lock()[0], &payload));

        sub.unsubscribe();
        bus.emit(&Context::background(), ON_UPDATE, payload).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_on_message() {
        let bus = EventBus::new();
        let registry = HandlerRegistry::new(bus.clone());
        let (seen, handler) = recorder::<MessageEvent>();
        let sub = registry.on_message(handler);

        bus.emit(&Context::background(), ON_MESSAGE, message_event(MessageKind::Photo))
            .await;
        assert_eq!(seen.lock().len(), 1);

        sub.unsubscribe();
        bus.emit(&Context::background(), ON_MESSAGE, message_event(MessageKind::Photo))
            .await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_on_message_kind() {
        let bus = EventBus::new();
        let registry = HandlerRegistry::new(bus.clone());
        let (seen, handler) = recorder::<MessageEvent>();
        let sub = registry.on_message_kind([MessageKind::Text], handler);

        bus.emit(&Context::background(), ON_MESSAGE, message_event(MessageKind::Photo))
            .await;
        assert!(seen.lock().is_empty());

        let text = message_event(MessageKind::Text);
        bus.emit(&Context::background(), ON_MESSAGE, text.clone()).await;
        assert_eq!(seen.lock().len(), 1);
        assert!(Arc::ptr_eq(&seen.lock()[0], &text));

        sub.unsubscribe();
        bus.emit(&Context::background(), ON_MESSAGE, text).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_on_message_kind_empty_matches_all() {
        let bus = EventBus::new();
        let registry = HandlerRegistry::new(bus.clone());
        let (seen, handler) = recorder::<MessageEvent>();
        registry.on_message_kind([], handler);

        bus.emit(&Context::background(), ON_MESSAGE, message_event(MessageKind::Voice))
            .await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_on_command() {
        let bus = EventBus::new();
        let registry = HandlerRegistry::new(bus.clone());
        let (all, handler) = recorder::<CommandEvent>();
        let sub = registry.on_command(handler);
        let (named, handler) = recorder::<CommandEvent>();
        registry.on_command_named("ping", handler);

        bus.emit(&Context::background(), ON_COMMAND, command_event("start")).await;
        bus.emit(&Context::background(), ON_COMMAND, command_event("ping")).await;
        assert_eq!(all.lock().len(), 2);
        assert_eq!(named.lock().len(), 1);
        assert_eq!(named.lock()[0].command, "ping");

        sub.unsubscribe();
        bus.emit(&Context::background(), ON_COMMAND, command_event("ping")).await;
        assert_eq!(all.lock().len(), 2);
        assert_eq!(named.lock().len(), 2);
    }
}
