//! Runs a body of work between an update source's start and stop.

use std::future::Future;
use std::time::Duration;

use herald_core::{Context, UpdateSource};
use tracing::{debug, error, info};

use crate::config::ShutdownConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Bounds for [`UpdateSource::start`] and [`UpdateSource::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimeouts {
    pub start: Duration,
    pub stop: Duration,
}

impl Default for LifecycleTimeouts {
    fn default() -> Self {
        Self::from(&ShutdownConfig::default())
    }
}

impl From<&ShutdownConfig> for LifecycleTimeouts {
    fn from(config: &ShutdownConfig) -> Self {
        Self {
            start: config.start_timeout(),
            stop: config.stop_timeout(),
        }
    }
}

/// Starts `source`, runs `body` until it returns or `ctx` is done, then
/// stops `source`.
///
/// `start` is bounded by `ctx` and `timeouts.start`. `stop` always runs once
/// `start` succeeded, on a fresh context bounded by `timeouts.stop`, so a
/// canceled `ctx` still gets a clean shutdown. `ctx` finishing counts as
/// success; an error from `body` wins over an error from `stop`.
pub async fn run_source<S, F, Fut, E>(
    source: &S,
    ctx: &Context,
    timeouts: LifecycleTimeouts,
    body: F,
) -> RuntimeResult<()>
where
    S: UpdateSource + ?Sized,
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Into<RuntimeError>,
{
    debug!(timeout = ?timeouts.start, "Starting update source");
    source.start(&ctx.with_timeout(timeouts.start)).await?;
    info!("Update source started");

    let outcome = tokio::select! {
        biased;
        _ = ctx.done() => Ok(()),
        res = body(ctx.clone()) => res.map_err(Into::into),
    };

    debug!(timeout = ?timeouts.stop, "Stopping update source");
    let stopped = source
        .stop(&Context::background().with_timeout(timeouts.stop))
        .await;
    match &stopped {
        Ok(()) => info!("Update source stopped"),
        Err(e) => error!(error = %e, "Failed to stop update source"),
    }

    outcome?;
    stopped.map_err(Into::into)
}
