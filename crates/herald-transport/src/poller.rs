//! Pull-based update source.
//!
//! A [`Poller`] owns one background worker while running. Every `interval`
//! the worker loads the cursor, fetches a batch starting there, pushes the
//! batch into the bounded stream in ascending `update_id` order and finally
//! commits `last delivered id + 1` as the new cursor.
//!
//! Delivery is at-least-once: the commit trails the hand-off, so updates that
//! were fetched but not delivered (or delivered but not committed) are fetched
//! again on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use herald_core::{
    Context, CursorStore, SourceError, SourceResult, Update, UpdateFetcher, UpdateReceiver,
    UpdateSource,
};

/// Tuning knobs for a [`Poller`].
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Time between two fetches.
    pub interval: Duration,
    /// Capacity of the update stream.
    pub buffer_size: usize,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            buffer_size: 100,
        }
    }
}

impl PollerOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

/// Handles to the running worker.
struct Worker {
    /// Cancelled by `stop`.
    stop: CancellationToken,
    /// Cancelled by the worker itself on exit (including on panic).
    finished: CancellationToken,
}

/// Everything the worker task needs; cloned into it on `start`.
#[derive(Clone)]
struct PollLoop {
    fetcher: Arc<dyn UpdateFetcher>,
    cursor: Arc<dyn CursorStore>,
    tx: mpsc::Sender<Update>,
    interval: Duration,
}

/// Timer-driven long-poll update source.
pub struct Poller {
    poll: PollLoop,
    rx: Mutex<Option<UpdateReceiver>>,
    worker: Mutex<Option<Worker>>,
}

impl Poller {
    /// Creates a stopped poller.
    pub fn new(
        fetcher: Arc<dyn UpdateFetcher>,
        cursor: Arc<dyn CursorStore>,
        options: PollerOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.buffer_size.max(1));
        Self {
            poll: PollLoop {
                fetcher,
                cursor,
                tx,
                interval: options.interval,
            },
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
        }
    }

    /// Returns `true` while a worker is active and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.stop.is_cancelled())
    }
}

#[async_trait]
impl UpdateSource for Poller {
    async fn start(&self, _ctx: &Context) -> SourceResult<()> {
        let mut slot = self.worker.lock();

        if let Some(worker) = slot.as_ref() {
            if !worker.stop.is_cancelled() {
                trace!("Poller already running");
                return Ok(());
            }
            if !worker.finished.is_cancelled() {
                return Err(SourceError::StillStopping);
            }
        }

        // The worker outlives this call, so it gets its own root context.
        let (worker_ctx, stop) = Context::background().with_cancel();
        let finished = CancellationToken::new();
        let guard = finished.clone().drop_guard();
        let poll = self.poll.clone();

        tokio::spawn(async move {
            let _guard = guard;
            poll.run(worker_ctx).await;
        });

        *slot = Some(Worker { stop, finished });
        info!(interval = ?self.poll.interval, "Poller started");
        Ok(())
    }

    async fn stop(&self, ctx: &Context) -> SourceResult<()> {
        let finished = {
            let slot = self.worker.lock();
            match slot.as_ref() {
                Some(worker) => {
                    worker.stop.cancel();
                    worker.finished.clone()
                }
                None => return Ok(()),
            }
        };

        tokio::select! {
            () = finished.cancelled() => {}
            err = ctx.done() => {
                warn!(error = %err, "Poller worker did not exit in time");
                return Err(err.into());
            }
        }

        let mut slot = self.worker.lock();
        if slot.as_ref().is_some_and(|w| w.finished.is_cancelled()) {
            *slot = None;
        }
        info!("Poller stopped");
        Ok(())
    }

    fn stream(&self) -> Option<UpdateReceiver> {
        self.rx.lock().take()
    }
}

impl PollLoop {
    async fn run(self, ctx: Context) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ctx.done() => break,
                _ = ticker.tick() => self.poll_once(&ctx).await,
            }
        }
        debug!("Poll loop exited");
    }

    /// One load → fetch → deliver → commit cycle.
    async fn poll_once(&self, ctx: &Context) {
        let offset = match self.cursor.load(ctx).await {
            Ok(offset) => offset,
            Err(e) => {
                if !ctx.is_done() {
                    error!(error = %e, "Failed to load cursor");
                }
                return;
            }
        };

        let mut updates = match self.fetcher.get_updates(ctx, offset).await {
            Ok(updates) => updates,
            Err(e) => {
                if !ctx.is_done() {
                    warn!(error = %e, offset, "Failed to fetch updates");
                }
                return;
            }
        };
        if updates.is_empty() {
            trace!(offset, "No new updates");
            return;
        }
        updates.sort_by_key(|u| u.update_id);

        let mut next = offset;
        let mut delivered = 0usize;
        for update in updates {
            let id = update.update_id;
            tokio::select! {
                biased;
                _ = ctx.done() => break,
                res = self.tx.send(update) => {
                    if res.is_err() {
                        debug!("Update stream receiver dropped");
                        break;
                    }
                    next = next.max(id.saturating_add(1));
                    delivered += 1;
                }
            }
        }
        if delivered == 0 {
            return;
        }

        // Updates already handed off must be acknowledged even when the
        // worker is being cancelled.
        if let Err(e) = self.cursor.save(&Context::background(), next).await {
            error!(error = %e, cursor = next, "Failed to save cursor");
            return;
        }
        debug!(delivered, cursor = next, "Delivered updates");
    }
}
