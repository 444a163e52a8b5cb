//! Capabilities at the ingestion boundary.
//!
//! - [`UpdateSource`]: anything that produces a stream of updates and has an
//!   explicit start/stop lifecycle (poller, webhook receiver).
//! - [`UpdateFetcher`]: the upstream "fetch updates starting at offset N" call
//!   the poller depends on.
//! - [`WebhookRegistrar`]: tells the upstream where to push updates.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::context::Context;
use crate::error::{ApiResult, SourceResult};
use crate::update::Update;

/// Receiving half of an update stream.
pub type UpdateReceiver = mpsc::Receiver<Update>;

/// A producer of updates with an explicit lifecycle.
///
/// The contexts passed to [`start`](Self::start) and [`stop`](Self::stop)
/// bound only those calls; they do not govern how long the stream lives.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Starts producing updates. Returns once the source is ready.
    async fn start(&self, ctx: &Context) -> SourceResult<()>;

    /// Stops producing updates.
    ///
    /// Safe to call repeatedly. On success no further update is pushed onto
    /// the stream. If `ctx` finishes first the call fails with the context
    /// error and the source keeps winding down in the background.
    async fn stop(&self, ctx: &Context) -> SourceResult<()>;

    /// Takes the receiving half of the stream.
    ///
    /// The stream has a single consumer; every call after the first returns
    /// `None`.
    fn stream(&self) -> Option<UpdateReceiver>;
}

/// Upstream "get updates" capability.
#[async_trait]
pub trait UpdateFetcher: Send + Sync {
    /// Fetches the next batch of updates whose id is at least `offset`.
    async fn get_updates(&self, ctx: &Context, offset: i64) -> ApiResult<Vec<Update>>;
}

/// Upstream webhook registration capability.
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Points the upstream at `url`, optionally with a shared secret.
    async fn set_webhook(&self, ctx: &Context, url: &str, secret_token: Option<&str>)
    -> ApiResult<()>;
}
