//! Push-based update source.
//!
//! [`Webhook`] exposes an axum handler that validates an inbound request,
//! decodes it into an [`Update`] and hands it to the bounded stream. Request
//! checks run in a fixed order:
//!
//! | Check | Failure |
//! |-------|---------|
//! | receiver stopped | `503 Service Unavailable` |
//! | method is `POST` | `405 Method Not Allowed` |
//! | secret header matches (if configured) | `401 Unauthorized` |
//! | body decodes as an update | `400 Bad Request` |
//! | enqueue before the request context is done | `408 Request Timeout` |
//!
//! `stop` waits for in-flight handoffs (those blocked on a full stream are
//! released with `503`), so nothing is enqueued once it returns `Ok`.
//!
//! A full stream therefore turns into an HTTP timeout instead of an
//! unbounded wait or a silent drop.
//!
//! The router can be mounted into an existing axum application through
//! [`Webhook::router`], or served by the webhook itself when
//! [`WebhookOptions::listen_addr`] is set.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{self, Body},
    extract::{Request, State},
    http::{Method, StatusCode},
    routing::any,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use herald_core::{
    Context, SourceError, SourceResult, Update, UpdateReceiver, UpdateSource, WebhookRegistrar,
};

/// Header carrying the shared secret.
pub const SECRET_TOKEN_HEADER: &str = "X-Bot-Api-Secret-Token";

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration for a [`Webhook`].
#[derive(Clone)]
pub struct WebhookOptions {
    /// Route the handler is mounted at.
    pub path: String,
    /// Expected value of [`SECRET_TOKEN_HEADER`]; `None` disables the check.
    pub secret_token: Option<String>,
    /// Capacity of the update stream.
    pub buffer_size: usize,
    /// Enqueue bound for requests that carry no [`Context`] extension.
    pub enqueue_timeout: Duration,
    /// Address to serve on. `None` means the router is mounted elsewhere.
    pub listen_addr: Option<String>,
    /// Public URL registered with the upstream on start.
    pub public_url: Option<String>,
    /// Upstream used to register `public_url`.
    pub registrar: Option<Arc<dyn WebhookRegistrar>>,
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            secret_token: None,
            buffer_size: 100,
            enqueue_timeout: Duration::from_secs(10),
            listen_addr: None,
            public_url: None,
            registrar: None,
        }
    }
}

impl WebhookOptions {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_secret_token(mut self, token: impl Into<String>) -> Self {
        self.secret_token = Some(token.into());
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Registers `url` with `registrar` whenever the webhook starts.
    pub fn with_registration(
        mut self,
        url: impl Into<String>,
        registrar: Arc<dyn WebhookRegistrar>,
    ) -> Self {
        self.public_url = Some(url.into());
        self.registrar = Some(registrar);
        self
    }
}

impl std::fmt::Debug for WebhookOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookOptions")
            .field("path", &self.path)
            .field("secret_token", &self.secret_token.as_ref().map(|_| "***"))
            .field("buffer_size", &self.buffer_size)
            .field("enqueue_timeout", &self.enqueue_timeout)
            .field("listen_addr", &self.listen_addr)
            .field("public_url", &self.public_url)
            .finish()
    }
}

/// State shared by every request.
struct Receiver {
    tx: mpsc::Sender<Update>,
    secret_token: Option<String>,
    enqueue_timeout: Duration,
    closed: AtomicBool,
    /// Held for read by every handoff; `stop` takes it for write to wait
    /// them out.
    handoffs: RwLock<()>,
    /// Canceled by `stop` so blocked handoffs give up with `503`.
    closing: Mutex<CancellationToken>,
}

/// The server spawned by `start` when `listen_addr` is set.
struct Server {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// HTTP push update source.
pub struct Webhook {
    options: WebhookOptions,
    receiver: Arc<Receiver>,
    rx: Mutex<Option<UpdateReceiver>>,
    server: Mutex<Option<Server>>,
}

impl Webhook {
    pub fn new(options: WebhookOptions) -> Self {
        let (tx, rx) = mpsc::channel(options.buffer_size.max(1));
        let receiver = Arc::new(Receiver {
            tx,
            secret_token: options.secret_token.clone(),
            enqueue_timeout: options.enqueue_timeout,
            closed: AtomicBool::new(false),
            handoffs: RwLock::new(()),
            closing: Mutex::new(CancellationToken::new()),
        });
        Self {
            options,
            receiver,
            rx: Mutex::new(Some(rx)),
            server: Mutex::new(None),
        }
    }

    /// Builds a router serving the webhook at the configured path.
    ///
    /// Every method is routed to the handler so that wrong methods get `405`
    /// from the handler itself.
    pub fn router(&self) -> Router {
        let path = normalize_path(&self.options.path);
        Router::new()
            .route(&path, any(receive_update))
            .with_state(Arc::clone(&self.receiver))
    }

    /// Address of the owned server, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().as_ref().map(|s| s.local_addr)
    }

    async fn bind(&self, ctx: &Context, addr: &str) -> SourceResult<()> {
        if self.server.lock().is_some() {
            return Ok(());
        }

        let listener = tokio::select! {
            res = TcpListener::bind(addr) => res.map_err(|e| SourceError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?,
            err = ctx.done() => return Err(err.into()),
        };
        let local_addr = listener.local_addr().map_err(|e| SourceError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let router = self.router();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Webhook server error");
            }
        });

        info!(addr = %local_addr, path = %normalize_path(&self.options.path), "Webhook listening");
        *self.server.lock() = Some(Server {
            local_addr,
            shutdown,
            handle,
        });
        Ok(())
    }

    async fn shutdown_server(&self, ctx: &Context) -> SourceResult<()> {
        let server = self.server.lock().take();
        let Some(mut server) = server else {
            return Ok(());
        };
        server.shutdown.cancel();

        tokio::select! {
            _ = &mut server.handle => {
                info!(addr = %server.local_addr, "Webhook server stopped");
                Ok(())
            }
            err = ctx.done() => {
                warn!(addr = %server.local_addr, error = %err, "Webhook server still draining");
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl UpdateSource for Webhook {
    async fn start(&self, ctx: &Context) -> SourceResult<()> {
        {
            let mut closing = self.receiver.closing.lock();
            if closing.is_cancelled() {
                *closing = CancellationToken::new();
            }
        }
        self.receiver.closed.store(false, Ordering::SeqCst);

        if let Some(addr) = &self.options.listen_addr {
            self.bind(ctx, addr).await?;
        }

        if let (Some(url), Some(registrar)) = (&self.options.public_url, &self.options.registrar)
        {
            let secret = self.options.secret_token.as_deref();
            if let Err(e) = registrar.set_webhook(ctx, url, secret).await {
                error!(error = %e, url = %url, "Failed to register webhook");
                // The registration error takes precedence.
                let _ = self.shutdown_server(ctx).await;
                self.receiver.closed.store(true, Ordering::SeqCst);
                return Err(e.into());
            }
            info!(url = %url, "Webhook registered upstream");
        }
        Ok(())
    }

    async fn stop(&self, ctx: &Context) -> SourceResult<()> {
        if !self.receiver.closed.swap(true, Ordering::SeqCst) {
            debug!("Webhook closed");
        }
        self.receiver.closing.lock().cancel();

        // No handoff can start once `closed` is set, so the write lock is
        // granted as soon as the in-flight ones return.
        tokio::select! {
            guard = self.receiver.handoffs.write() => drop(guard),
            err = ctx.done() => {
                warn!(error = %err, "Webhook handoffs still in flight");
                return Err(err.into());
            }
        }
        self.shutdown_server(ctx).await
    }

    fn stream(&self) -> Option<UpdateReceiver> {
        self.rx.lock().take()
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Axum handler for one webhook delivery.
async fn receive_update(State(receiver): State<Arc<Receiver>>, request: Request) -> StatusCode {
    if receiver.closed.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    let (parts, body) = request.into_parts();

    if parts.method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    if let Some(expected) = &receiver.secret_token {
        let provided = parts
            .headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            debug!("Rejected webhook request with bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update = match decode(body).await {
        Some(update) => update,
        None => return StatusCode::BAD_REQUEST,
    };
    let update_id = update.update_id;
    trace!(update_id, "Received update");

    let ctx = parts
        .extensions
        .get::<Context>()
        .cloned()
        .unwrap_or_else(|| Context::background().with_timeout(receiver.enqueue_timeout));

    let _handoff = receiver.handoffs.read().await;
    if receiver.closed.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    let closing = receiver.closing.lock().clone();

    tokio::select! {
        biased;
        res = receiver.tx.send(update) => match res {
            Ok(()) => StatusCode::OK,
            Err(_) => StatusCode::SERVICE_UNAVAILABLE,
        },
        _ = closing.cancelled() => {
            debug!(update_id, "Webhook stopped during handoff");
            StatusCode::SERVICE_UNAVAILABLE
        }
        err = ctx.done() => {
            warn!(update_id, error = %err, "Update stream is full, rejecting request");
            StatusCode::REQUEST_TIMEOUT
        }
    }
}

async fn decode(body: Body) -> Option<Update> {
    let bytes = match body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Failed to read webhook body");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(update) => Some(update),
        Err(e) => {
            debug!(error = %e, "Malformed webhook body");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use herald_core::{ApiError, ApiResult};
    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    const BODY: &str = r#"{"update_id": 10, "message": {"message_id": 1, "date": 0, "chat": {"id": 1, "type": "private"}, "text": "hi"}}"#;

    fn post() -> axum::http::request::Builder {
        HttpRequest::builder().method(Method::POST).uri("/hook")
    }

    async fn send(webhook: &Webhook, request: HttpRequest<Body>) -> StatusCode {
        webhook.router().oneshot(request).await.unwrap().status()
    }

    fn secured() -> Webhook {
        Webhook::new(
            WebhookOptions::default()
                .with_path("hook")
                .with_secret_token("s3cret"),
        )
    }

    #[tokio::test]
    async fn test_valid_request_is_enqueued() {
        let webhook = secured();
        let mut rx = webhook.stream().unwrap();

        let request = post()
            .header(SECRET_TOKEN_HEADER, "s3cret")
            .body(Body::from(BODY))
            .unwrap();
        assert_eq!(send(&webhook, request).await, StatusCode::OK);

        let update = rx.try_recv().unwrap();
        assert_eq!(update.update_id, 10);
        assert_eq!(update.message.unwrap().text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_bad_secret_is_rejected() {
        let webhook = secured();
        let mut rx = webhook.stream().unwrap();

        let wrong = post()
            .header(SECRET_TOKEN_HEADER, "nope")
            .body(Body::from(BODY))
            .unwrap();
        assert_eq!(send(&webhook, wrong).await, StatusCode::UNAUTHORIZED);

        let missing = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, missing).await, StatusCode::UNAUTHORIZED);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_secret_configured_skips_check() {
        let webhook = Webhook::new(WebhookOptions::default().with_path("/hook"));
        let request = post()
            .header(SECRET_TOKEN_HEADER, "anything")
            .body(Body::from(BODY))
            .unwrap();
        assert_eq!(send(&webhook, request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_method_checked_before_secret() {
        let webhook = secured();
        let request = HttpRequest::builder()
            .method(Method::GET)
            .uri("/hook")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&webhook, request).await, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let webhook = secured();
        let mut rx = webhook.stream().unwrap();

        for body in ["not json", r#"{"message": {}}"#] {
            let request = post()
                .header(SECRET_TOKEN_HEADER, "s3cret")
                .body(Body::from(body))
                .unwrap();
            assert_eq!(send(&webhook, request).await, StatusCode::BAD_REQUEST);
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_stream_with_canceled_context_times_out() {
        let webhook = Webhook::new(
            WebhookOptions::default()
                .with_path("/hook")
                .with_buffer_size(1),
        );
        let _rx = webhook.stream().unwrap();

        let first = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, first).await, StatusCode::OK);

        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let second = post()
            .extension(ctx)
            .body(Body::from(BODY))
            .unwrap();
        assert_eq!(send(&webhook, second).await, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_stream_times_out_after_enqueue_timeout() {
        let webhook = Webhook::new(
            WebhookOptions::default()
                .with_path("/hook")
                .with_buffer_size(1)
                .with_enqueue_timeout(Duration::from_millis(50)),
        );
        let _rx = webhook.stream().unwrap();

        let first = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, first).await, StatusCode::OK);
        let second = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, second).await, StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_stopped_webhook_refuses_requests() {
        let webhook = Webhook::new(WebhookOptions::default().with_path("/hook"));
        let mut rx = webhook.stream().unwrap();

        assert_ok!(webhook.stop(&Context::background()).await);
        assert_ok!(webhook.stop(&Context::background()).await);

        let request = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, request).await, StatusCode::SERVICE_UNAVAILABLE);
        assert!(rx.try_recv().is_err());

        assert_ok!(webhook.start(&Context::background()).await);
        let request = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stop_releases_blocked_handoff() {
        let webhook = Arc::new(Webhook::new(
            WebhookOptions::default()
                .with_path("/hook")
                .with_buffer_size(1),
        ));
        let mut rx = webhook.stream().unwrap();

        let first = post().body(Body::from(BODY)).unwrap();
        assert_eq!(send(&webhook, first).await, StatusCode::OK);

        let router = webhook.router();
        let blocked = tokio::spawn(async move {
            let body = r#"{"update_id": 11}"#;
            let request = post().body(Body::from(body)).unwrap();
            router.oneshot(request).await.unwrap().status()
        });
        // Let the second request reach the full stream.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_ok!(webhook.stop(&Context::background()).await);
        assert_eq!(blocked.await.unwrap(), StatusCode::SERVICE_UNAVAILABLE);

        assert_eq!(rx.recv().await.unwrap().update_id, 10);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_waits_for_handoff_until_deadline() {
        let webhook = Webhook::new(WebhookOptions::default().with_path("/hook"));
        let _rx = webhook.stream().unwrap();

        let held = webhook.receiver.handoffs.read().await;
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let err = assert_err!(webhook.stop(&ctx).await);
        assert!(matches!(err, SourceError::Context(_)));
        drop(held);

        assert_ok!(webhook.stop(&Context::background()).await);
    }

    #[derive(Default)]
    struct RecordingRegistrar {
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl WebhookRegistrar for RecordingRegistrar {
        async fn set_webhook(
            &self,
            _ctx: &Context,
            url: &str,
            secret_token: Option<&str>,
        ) -> ApiResult<()> {
            self.calls
                .lock()
                .push((url.to_string(), secret_token.map(str::to_string)));
            if self.fail {
                return Err(ApiError::Status {
                    status: 400,
                    description: "bad webhook url".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_start_serves_and_registers() {
        let registrar = Arc::new(RecordingRegistrar::default());
        let webhook = Webhook::new(
            WebhookOptions::default()
                .with_secret_token("s3cret")
                .with_listen_addr("127.0.0.1:0")
                .with_registration("https://example.test/hook", registrar.clone()),
        );

        assert_ok!(webhook.start(&Context::background()).await);
        assert!(webhook.local_addr().is_some());
        assert_eq!(
            *registrar.calls.lock(),
            vec![(
                "https://example.test/hook".to_string(),
                Some("s3cret".to_string())
            )]
        );

        assert_ok!(webhook.stop(&Context::background()).await);
        assert!(webhook.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_failed_registration_is_reported() {
        let registrar = Arc::new(RecordingRegistrar {
            fail: true,
            ..Default::default()
        });
        let webhook = Webhook::new(
            WebhookOptions::default()
                .with_listen_addr("127.0.0.1:0")
                .with_registration("https://example.test/hook", registrar),
        );

        let err = assert_err!(webhook.start(&Context::background()).await);
        assert!(matches!(err, SourceError::Registration(_)));
        assert!(webhook.local_addr().is_none());
    }
}
