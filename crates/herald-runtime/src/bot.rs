//! The bot and its dispatch loop.
//!
//! A [`Bot`] owns an event bus wired with the default middleware and
//! listeners. [`Bot::run`] drains an update stream into that bus, emitting
//! [`ON_UPDATE`] once per update.

use std::sync::Arc;

use herald_core::{
    BoxError, Context, EventBus, EventBusOptions, Update, UpdateReceiver, WeakEventBus,
};
use herald_framework::{
    HandlerRegistry, ON_MESSAGE, ON_UPDATE, UpdateEvent, classifier, command_parser,
    context_injector, logger, recoverer,
};
use tracing::{debug, info};

#[cfg(feature = "http-client")]
use herald_transport::HttpBotApi;

use crate::error::{BotError, BotResult};

/// What listeners know about the bot they run for.
///
/// Every listener context carries one; read it with
/// [`BotHandle::from_context`].
#[derive(Debug, Clone)]
pub struct BotHandle {
    name: Option<Arc<str>>,
    bus: WeakEventBus,
    #[cfg(feature = "http-client")]
    api: Option<Arc<HttpBotApi>>,
}

impl BotHandle {
    /// Returns the handle attached to `ctx`, if any.
    pub fn from_context(ctx: &Context) -> Option<Arc<BotHandle>> {
        ctx.value::<BotHandle>()
    }

    /// The bot username, without `@`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The bot's event bus, unless the bot has been dropped.
    pub fn bus(&self) -> Option<EventBus> {
        self.bus.upgrade()
    }

    /// The upstream client, when the bot was built with one.
    #[cfg(feature = "http-client")]
    pub fn api(&self) -> Option<&HttpBotApi> {
        self.api.as_deref()
    }
}

/// Builder for [`Bot`].
pub struct BotBuilder {
    name: Option<String>,
    bus: Option<EventBus>,
    options: EventBusOptions,
    default_middleware: bool,
    #[cfg(feature = "http-client")]
    api: Option<Arc<HttpBotApi>>,
}

impl BotBuilder {
    fn new() -> Self {
        Self {
            name: None,
            bus: None,
            options: EventBusOptions::default(),
            default_middleware: true,
            #[cfg(feature = "http-client")]
            api: None,
        }
    }

    /// Sets the bot username used to filter `/command@name`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Uses an existing bus instead of creating one.
    ///
    /// The bus options set on this builder are ignored in that case.
    pub fn bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.options = self.options.with_stop_on_error(stop);
        self
    }

    /// Called with `(event, error)` whenever a listener fails.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &BoxError) + Send + Sync + 'static,
    {
        self.options = self.options.with_error_handler(handler);
        self
    }

    /// Skips the logger and recoverer middleware.
    ///
    /// The bot handle is injected regardless.
    pub fn without_default_middleware(mut self) -> Self {
        self.default_middleware = false;
        self
    }

    #[cfg(feature = "http-client")]
    pub fn api(mut self, api: Arc<HttpBotApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Looks the bot name up with `getMe` unless one was set.
    #[cfg(feature = "http-client")]
    pub async fn resolve_name(mut self, ctx: &Context) -> crate::RuntimeResult<Self> {
        if self.name.is_some() {
            return Ok(self);
        }
        if let Some(api) = &self.api {
            let me = api.get_me(ctx).await?;
            match me.username {
                Some(username) => {
                    info!(username = %username, "Resolved bot username");
                    self.name = Some(username);
                }
                None => tracing::warn!("getMe returned no username, addressed commands are ignored"),
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Bot {
        let bus = self
            .bus
            .unwrap_or_else(|| EventBus::with_options(self.options));

        let handle = BotHandle {
            name: self.name.as_deref().map(Arc::from),
            bus: bus.downgrade(),
            #[cfg(feature = "http-client")]
            api: self.api,
        };

        bus.use_middleware("*", [context_injector(handle.clone())]);
        if self.default_middleware {
            bus.use_middleware("*", [logger(), recoverer()]);
        }

        bus.add_listener(ON_UPDATE, classifier(&bus));
        bus.add_listener(ON_MESSAGE, command_parser(&bus, self.name));

        debug!(bot = ?handle.name(), "Bot built");
        Bot {
            handlers: HandlerRegistry::new(bus.clone()),
            bus,
            handle,
        }
    }
}

/// A bot: an event bus plus the dispatch loop feeding it.
pub struct Bot {
    bus: EventBus,
    handle: BotHandle,
    handlers: HandlerRegistry,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn handle(&self) -> &BotHandle {
        &self.handle
    }

    /// Typed handler registration.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Emits `update` as [`ON_UPDATE`] and waits for every listener.
    pub async fn dispatch(&self, ctx: &Context, update: Update) {
        debug!(update_id = update.update_id, "Dispatching update");
        self.bus
            .emit(ctx, ON_UPDATE, Arc::new(UpdateEvent::new(update)))
            .await;
    }

    /// Drains `updates` until the stream closes or `ctx` is done.
    ///
    /// A closed stream is a clean shutdown and returns `Ok`. A done context
    /// returns [`BotError::Context`].
    pub async fn run(&self, ctx: &Context, mut updates: UpdateReceiver) -> BotResult<()> {
        let ctx = ctx.with_value(self.handle.clone());
        info!(bot = ?self.handle.name(), "Dispatch loop started");

        loop {
            tokio::select! {
                biased;
                err = ctx.done() => {
                    info!(reason = %err, "Dispatch loop stopped");
                    return Err(BotError::Context(err));
                }
                update = updates.recv() => match update {
                    Some(update) => self.dispatch(&ctx, update).await,
                    None => {
                        info!("Update stream closed, dispatch loop finished");
                        return Ok(());
                    }
                },
            }
        }
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.handle.name())
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{ContextError, Message, MessageEntity};
    use herald_framework::{CommandEvent, MessageKind};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    fn command_update(id: i64, text: &str, len: usize) -> Update {
        let mut message = Message::text(id * 10, 1, text);
        message.entities = vec![MessageEntity::bot_command(0, len)];
        Update::new(id).with_message(message)
    }

    #[tokio::test]
    async fn test_run_emits_updates() {
        let bot = Bot::builder().build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bot.handlers().on_update(move |_, event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(event.update.update_id);
                Ok(())
            }
        });

        let (tx, rx) = mpsc::channel(4);
        tx.send(Update::new(1)).await.unwrap();
        tx.send(Update::new(2)).await.unwrap();
        drop(tx);

        tokio_test::assert_ok!(bot.run(&Context::background(), rx).await);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_run_returns_context_error_on_cancel() {
        let bot = Bot::builder().build();
        let (_tx, rx) = mpsc::channel::<Update>(1);
        let (ctx, cancel) = Context::background().with_cancel();

        let run = tokio::spawn(async move { bot.run(&ctx, rx).await });
        cancel.cancel();

        let result = run.await.unwrap();
        assert_eq!(result, Err(BotError::Context(ContextError::Canceled)));
    }

    #[tokio::test]
    async fn test_closed_stream_is_clean_shutdown() {
        let bot = Bot::builder().build();
        let (tx, rx) = mpsc::channel::<Update>(1);
        drop(tx);
        assert_eq!(bot.run(&Context::background(), rx).await, Ok(()));
    }

    #[tokio::test]
    async fn test_listeners_see_bot_handle() {
        let bot = Bot::builder().name("herald_bot").build();
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        bot.handlers().on_message(move |ctx, _| {
            let sink = Arc::clone(&sink);
            async move {
                let handle = BotHandle::from_context(&ctx).ok_or("no bot handle")?;
                sink.lock().push(handle.name().map(String::from));
                assert!(handle.bus().is_some());
                Ok(())
            }
        });

        bot.dispatch(
            &Context::background(),
            Update::new(1).with_message(Message::text(1, 1, "hi")),
        )
        .await;
        assert_eq!(*names.lock(), vec![Some("herald_bot".to_string())]);
    }

    #[tokio::test]
    async fn test_update_to_command_pipeline() {
        let bot = Bot::builder().name("herald_bot").build();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let commands = Arc::new(Mutex::new(Vec::<Arc<CommandEvent>>::new()));

        let sink = Arc::clone(&kinds);
        bot.handlers().on_message(move |_, event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(event.kind);
                Ok(())
            }
        });
        let sink = Arc::clone(&commands);
        bot.handlers().on_command_named("ping", move |_, event| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(event);
                Ok(())
            }
        });

        let ctx = Context::background();
        bot.dispatch(&ctx, command_update(1, "/ping", 5)).await;
        bot.dispatch(&ctx, command_update(2, "/ping@other_bot", 15)).await;
        bot.dispatch(&ctx, command_update(3, "/ping@herald_bot hello", 16)).await;

        assert_eq!(*kinds.lock(), vec![MessageKind::Text; 3]);
        let commands = commands.lock();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].args, "hello");
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_loop() {
        let bot = Bot::builder().build();
        let seen = Arc::new(Mutex::new(0));
        bot.handlers().on_update(|_, event| async move {
            if event.update.update_id == 1 {
                panic!("handler exploded");
            }
            Ok(())
        });
        let sink = Arc::clone(&seen);
        bot.handlers().on_update(move |_, _| {
            let sink = Arc::clone(&sink);
            async move {
                *sink.lock() += 1;
                Ok(())
            }
        });

        let (tx, rx) = mpsc::channel(4);
        tx.send(Update::new(1)).await.unwrap();
        tx.send(Update::new(2)).await.unwrap();
        drop(tx);

        tokio_test::assert_ok!(bot.run(&Context::background(), rx).await);
        // The recoverer turns the panic into success, so both updates reach
        // the second handler.
        assert_eq!(*seen.lock(), 2);
    }

    #[tokio::test]
    async fn test_error_handler_and_stop_on_error() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let bot = Bot::builder()
            .stop_on_error(false)
            .without_default_middleware()
            .error_handler(move |event, err| sink.lock().push(format!("{event}: {err}")))
            .build();

        let reached = Arc::new(Mutex::new(false));
        bot.handlers()
            .on_update(|_, _| async { Err::<(), BoxError>("first failed".into()) });
        let flag = Arc::clone(&reached);
        bot.handlers().on_update(move |_, _| {
            let flag = Arc::clone(&flag);
            async move {
                *flag.lock() = true;
                Ok(())
            }
        });

        bot.dispatch(&Context::background(), Update::new(7)).await;
        assert_eq!(*errors.lock(), vec!["onUpdate: first failed".to_string()]);
        assert!(*reached.lock());
    }
}
