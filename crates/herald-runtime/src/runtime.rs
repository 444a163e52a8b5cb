//! Process-level orchestration.
//!
//! [`HeraldRuntime`] pairs a [`Bot`] with an [`UpdateSource`], starts the
//! source, runs the dispatch loop until a shutdown signal arrives and then
//! stops the source.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! // herald.toml + HERALD_* environment variables
//! let runtime = HeraldRuntime::builder().build().await?;
//!
//! runtime.handlers().on_command_named("ping", |_ctx, _cmd| async { Ok(()) });
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use herald_core::{Context, UpdateSource};
use herald_framework::HandlerRegistry;
use tokio::signal;
use tracing::{info, warn};

use crate::bot::Bot;
use crate::error::{RuntimeError, RuntimeResult};
use crate::lifecycle::{LifecycleTimeouts, run_source};

#[cfg(feature = "http-client")]
use crate::config::{ConfigLoader, ConfigResult, HeraldConfig, SourceConfig, validate_config};
#[cfg(feature = "http-client")]
use herald_core::{CursorStore, InMemoryCursorStore};
#[cfg(feature = "http-client")]
use herald_transport::{FileCursorStore, HttpBotApi, Poller, PollerOptions};

/// The Herald runtime: one bot fed by one update source.
pub struct HeraldRuntime {
    bot: Bot,
    source: Arc<dyn UpdateSource>,
    timeouts: LifecycleTimeouts,
}

impl HeraldRuntime {
    /// Creates a runtime from parts built by hand.
    pub fn new(bot: Bot, source: Arc<dyn UpdateSource>) -> Self {
        Self {
            bot,
            source,
            timeouts: LifecycleTimeouts::default(),
        }
    }

    /// Creates a runtime builder that loads the configuration.
    #[cfg(feature = "http-client")]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds the bot and update source described by `config`.
    ///
    /// This initializes logging, validates the configuration and, when no bot
    /// name is configured, resolves it with `getMe`.
    #[cfg(feature = "http-client")]
    pub async fn from_config(config: &HeraldConfig) -> RuntimeResult<Self> {
        crate::logging::init_from_config(&config.logging);
        validate_config(config)?;

        let api = Arc::new(HttpBotApi::new(&config.bot.api_url, &config.bot.token)?);

        let mut bot = Bot::builder()
            .api(Arc::clone(&api))
            .stop_on_error(config.bus.stop_on_error);
        if let Some(name) = &config.bot.name {
            bot = bot.name(name);
        }
        let setup = Context::background().with_timeout(config.shutdown.start_timeout());
        let bot = bot.resolve_name(&setup).await?.build();

        let source = build_source(config, &api)?;

        info!(
            source = config.source.kind(),
            bot = ?bot.handle().name(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self::new(bot, source).with_timeouts(LifecycleTimeouts::from(&config.shutdown)))
    }

    pub fn with_timeouts(mut self, timeouts: LifecycleTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Typed handler registration on the bot.
    pub fn handlers(&self) -> &HandlerRegistry {
        self.bot.handlers()
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Herald runtime is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes or the update stream closes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let updates = self.source.stream().ok_or(RuntimeError::StreamTaken)?;
        let (ctx, cancel) = Context::background().with_cancel();

        let run = run_source(self.source.as_ref(), &ctx, self.timeouts, |ctx| {
            let bot = &self.bot;
            async move { bot.run(&ctx, updates).await }
        });
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => return res,
            _ = shutdown => info!("Shutdown requested"),
        }
        cancel.cancel();
        run.await
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("bot", &self.bot)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

#[cfg(feature = "http-client")]
fn build_source(config: &HeraldConfig, api: &Arc<HttpBotApi>) -> RuntimeResult<Arc<dyn UpdateSource>> {
    match &config.source {
        SourceConfig::Poller(poller) => {
            let fetcher = HttpBotApi::clone(api)
                .with_limit(poller.limit)
                .with_long_poll(std::time::Duration::from_secs(poller.long_poll_secs))?;
            let cursor: Arc<dyn CursorStore> = match &poller.cursor_file {
                Some(path) => Arc::new(FileCursorStore::new(path)),
                None => Arc::new(InMemoryCursorStore::new(0)),
            };
            let options = PollerOptions::default()
                .with_interval(poller.interval())
                .with_buffer_size(poller.buffer_size);
            Ok(Arc::new(Poller::new(Arc::new(fetcher), cursor, options)))
        }
        #[cfg(feature = "http-server")]
        SourceConfig::Webhook(hook) => {
            use herald_transport::{Webhook, WebhookOptions};

            let mut options = WebhookOptions::default()
                .with_path(&hook.path)
                .with_buffer_size(hook.buffer_size)
                .with_enqueue_timeout(hook.enqueue_timeout())
                .with_listen_addr(&hook.listen_addr);
            if let Some(secret) = &hook.secret_token {
                options = options.with_secret_token(secret);
            }
            if let Some(url) = &hook.public_url {
                options = options.with_registration(url, Arc::clone(api) as _);
            }
            Ok(Arc::new(Webhook::new(options)))
        }
        #[cfg(not(feature = "http-server"))]
        SourceConfig::Webhook(_) => Err(RuntimeError::FeatureDisabled("http-server")),
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, running until the stream closes");
            futures::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder that loads configuration before creating a [`HeraldRuntime`].
///
/// ```rust,ignore
/// let runtime = HeraldRuntime::builder()
///     .config_file("config/herald.toml")
///     .profile("production")
///     .build()
///     .await?;
/// ```
#[cfg(feature = "http-client")]
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

#[cfg(feature = "http-client")]
impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Overrides a single dotted configuration key.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration without building anything.
    pub fn load(self) -> ConfigResult<HeraldConfig> {
        self.config_loader.load()
    }

    pub async fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = self.config_loader.load()?;
        HeraldRuntime::from_config(&config).await
    }
}

#[cfg(feature = "http-client")]
impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
