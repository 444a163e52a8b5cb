//! The synchronous-per-emission event bus.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::RwLock;
use tower::BoxError;
use tracing::{Instrument, Level, debug, span, trace};

use super::listener::{
    Break, ErrorHandler, Listener, ListenerPanicked, Middleware, Payload, typed_listener,
};
use super::pattern::EventPattern;
use crate::context::Context;

/// Configuration for an [`EventBus`].
#[derive(Clone)]
pub struct EventBusOptions {
    stop_on_error: bool,
    error_handler: Option<ErrorHandler>,
}

impl Default for EventBusOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            error_handler: None,
        }
    }
}

impl EventBusOptions {
    /// Creates the default options: stop on error, no error handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether an ordinary listener error stops the current emission.
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    /// Sets the callback that receives `(event_name, error)` for failed listeners.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &BoxError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }
}

impl std::fmt::Debug for EventBusOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBusOptions")
            .field("stop_on_error", &self.stop_on_error)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// One registered listener.
struct ListenerEntry {
    id: u64,
    pattern: EventPattern,
    listener: Listener,
    once: bool,
    /// Set when a once-listener is claimed by an emission.
    fired: AtomicBool,
}

impl ListenerEntry {
    /// Claims the right to invoke this entry. Always succeeds for persistent
    /// listeners; succeeds exactly once for once-listeners.
    fn claim(&self) -> bool {
        !self.once || !self.fired.swap(true, Ordering::AcqRel)
    }
}

struct MiddlewareEntry {
    pattern: EventPattern,
    middleware: Middleware,
}

/// Listener and middleware tables, both kept in registration order.
#[derive(Default)]
struct Registry {
    listeners: Vec<Arc<ListenerEntry>>,
    middleware: Vec<MiddlewareEntry>,
}

impl Registry {
    fn remove(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }
}

struct Inner {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    options: EventBusOptions,
}

/// Handle returned by [`EventBus::add_listener`] and [`EventBus::once`].
///
/// Calling [`unsubscribe`](Self::unsubscribe) removes exactly the registration
/// that produced it. The handle holds only a weak reference to the bus and
/// dropping it does **not** unsubscribe.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    pattern: String,
    registry: Weak<Inner>,
}

impl Subscription {
    /// Removes the registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.registry.upgrade()
            && inner.registry.write().remove(self.id)
        {
            trace!(pattern = %self.pattern, id = self.id, "Listener unsubscribed");
        }
    }

    /// Returns the pattern this registration was made under.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Pattern-matching publish/subscribe bus.
///
/// # Emission
///
/// [`emit`](Self::emit) snapshots every listener and middleware whose pattern
/// matches the event name, releases the registry lock and then awaits the
/// listeners one by one in registration order. Each listener is wrapped by all
/// matched middleware, first-registered outermost.
///
/// - `Ok(())` continues with the next listener.
/// - [`Break`] stops the emission silently.
/// - Any other error (including a panic) goes to the error handler and, with
///   `stop_on_error`, stops the emission.
///
/// Once-listeners are removed from the registry as soon as an emission claims
/// them, before they run, so they are gone whatever their outcome and even if
/// the emission is dropped midway.
///
/// # Sharing
///
/// `EventBus` is a cheap handle; clones share the same registry, so listeners
/// may capture a clone to emit follow-up events or to (un)register listeners
/// while an emission is in flight.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with default options.
    pub fn new() -> Self {
        Self::with_options(EventBusOptions::default())
    }

    /// Creates a bus with the given options.
    pub fn with_options(options: EventBusOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                next_id: AtomicU64::new(1),
                options,
            }),
        }
    }

    /// Returns a handle that does not keep the bus alive.
    ///
    /// Listeners registered on a bus that need to emit on it should hold one
    /// of these instead of a clone, so the bus and its listeners do not keep
    /// each other alive.
    pub fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the options this bus was built with.
    pub fn options(&self) -> &EventBusOptions {
        &self.inner.options
    }

    /// Registers a persistent listener for `pattern`.
    pub fn add_listener(&self, pattern: impl Into<String>, listener: Listener) -> Subscription {
        self.register(pattern.into(), listener, false)
    }

    /// Registers a listener that is removed after its first invocation.
    pub fn once(&self, pattern: impl Into<String>, listener: Listener) -> Subscription {
        self.register(pattern.into(), listener, true)
    }

    /// Registers a typed handler; payloads of other types are skipped.
    pub fn on<T, F, Fut>(&self, pattern: impl Into<String>, handler: F) -> Subscription
    where
        T: Send + Sync + 'static,
        F: Fn(Context, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.add_listener(pattern, typed_listener(handler))
    }

    fn register(&self, pattern: String, listener: Listener, once: bool) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(ListenerEntry {
            id,
            pattern: EventPattern::new(pattern.clone()),
            listener,
            once,
            fired: AtomicBool::new(false),
        });

        self.inner.registry.write().listeners.push(entry);
        trace!(pattern = %pattern, id, once, "Listener registered");

        Subscription {
            id,
            pattern,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Removes the registration behind `subscription`.
    pub fn remove_listener(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    /// Appends middleware bound to `pattern`.
    ///
    /// Middleware applies to every listener invoked for an event name that
    /// `pattern` matches, regardless of the listener's own pattern.
    pub fn use_middleware<I>(&self, pattern: impl Into<String>, middleware: I)
    where
        I: IntoIterator<Item = Middleware>,
    {
        let pattern = EventPattern::new(pattern.into());
        let mut registry = self.inner.registry.write();
        for mw in middleware {
            registry.middleware.push(MiddlewareEntry {
                pattern: pattern.clone(),
                middleware: mw,
            });
        }
    }

    /// Number of listeners whose pattern matches `event` right now.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .registry
            .read()
            .listeners
            .iter()
            .filter(|entry| entry.pattern.matches(event))
            .count()
    }

    /// Number of middleware whose pattern matches `event` right now.
    pub fn middleware_count(&self, event: &str) -> usize {
        self.inner
            .registry
            .read()
            .middleware
            .iter()
            .filter(|entry| entry.pattern.matches(event))
            .count()
    }

    /// Removes every listener registered under exactly `pattern`.
    ///
    /// The argument is compared as a string; it is not glob-expanded.
    pub fn remove_all_listeners(&self, pattern: &str) {
        self.inner
            .registry
            .write()
            .listeners
            .retain(|entry| entry.pattern.as_str() != pattern);
    }

    /// Takes a consistent copy of the matching listeners and middleware.
    fn snapshot(&self, event: &str) -> (Vec<Arc<ListenerEntry>>, Vec<Middleware>) {
        let registry = self.inner.registry.read();
        let listeners = registry
            .listeners
            .iter()
            .filter(|entry| entry.pattern.matches(event))
            .cloned()
            .collect();
        let middleware = registry
            .middleware
            .iter()
            .filter(|entry| entry.pattern.matches(event))
            .map(|entry| Arc::clone(&entry.middleware))
            .collect();
        (listeners, middleware)
    }

    /// Delivers `payload` to every listener matching `event`.
    ///
    /// The returned future completes once all invoked listeners have finished
    /// (or the emission was stopped). Listener failures never escape this call.
    pub async fn emit(&self, ctx: &Context, event: &str, payload: Payload) {
        let span = span!(Level::DEBUG, "emit", event = %event);
        self.emit_inner(ctx, event, payload).instrument(span).await;
    }

    async fn emit_inner(&self, ctx: &Context, event: &str, payload: Payload) {
        let (entries, middleware) = self.snapshot(event);
        if entries.is_empty() {
            trace!("No listeners matched");
            return;
        }

        debug!(
            listeners = entries.len(),
            middleware = middleware.len(),
            "Dispatching event"
        );

        for entry in &entries {
            if !entry.claim() {
                // Already consumed by another emission.
                continue;
            }
            if entry.once {
                self.inner.registry.write().remove(entry.id);
            }

            let listener = Arc::clone(&entry.listener);
            let chain = &middleware;
            let ctx = ctx.clone();
            let payload = Arc::clone(&payload);
            let outcome = AssertUnwindSafe(async move {
                let handler = chain.iter().rev().fold(listener, |next, mw| mw(next));
                handler(ctx, payload).await
            })
            .catch_unwind()
            .await;

            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) if Break::is(&err) => {
                    trace!(id = entry.id, "Listener requested break");
                    break;
                }
                Ok(Err(err)) => err,
                Err(panic) => BoxError::from(ListenerPanicked::from_panic(panic)),
            };

            if let Some(handler) = &self.inner.options.error_handler {
                handler(event, &err);
            }
            if self.inner.options.stop_on_error {
                debug!(id = entry.id, error = %err, "Listener failed, stopping emission");
                break;
            }
            debug!(id = entry.id, error = %err, "Listener failed, continuing");
        }
    }
}

/// Non-owning handle to an [`EventBus`].
#[derive(Clone)]
pub struct WeakEventBus {
    inner: Weak<Inner>,
}

impl WeakEventBus {
    /// Returns the bus if it is still alive.
    pub fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

impl std::fmt::Debug for WeakEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakEventBus")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry.read();
        f.debug_struct("EventBus")
            .field("listeners", &registry.listeners.len())
            .field("middleware", &registry.middleware.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::listener::{listener_fn, middleware_fn};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        listener_fn(move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn failing(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        listener_fn(move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("dummy error".into())
            }
        })
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Listener {
        let log = Arc::clone(log);
        listener_fn(move |_, _| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(name);
                Ok(())
            }
        })
    }

    fn unit() -> Payload {
        Arc::new(())
    }

    #[tokio::test]
    async fn test_stop_on_error_halts_emission() {
        let bus = EventBus::with_options(EventBusOptions::new().with_stop_on_error(true));
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_listener("test", failing(&calls));
        bus.add_listener("test", counting(&calls));
        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_all() {
        let bus = EventBus::with_options(EventBusOptions::new().with_stop_on_error(false));
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_listener("test", failing(&calls));
        bus.add_listener("test", counting(&calls));
        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_handler_receives_event_and_error() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let bus = EventBus::with_options(EventBusOptions::new().with_error_handler(
            move |event, err| {
                *seen_clone.lock() = Some((event.to_string(), err.to_string()));
            },
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_listener("test", failing(&calls));
        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(
            seen.lock().clone(),
            Some(("test".to_string(), "dummy error".to_string()))
        );
    }

    #[tokio::test]
    async fn test_break_stops_without_reporting() {
        let reported = Arc::new(AtomicUsize::new(0));
        let reported_clone = Arc::clone(&reported);
        let bus = EventBus::with_options(EventBusOptions::new().with_error_handler(
            move |_, _| {
                reported_clone.fetch_add(1, Ordering::SeqCst);
            },
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_listener("test", listener_fn(|_, _| async { Err(Break.into()) }));
        bus.add_listener("test", counting(&calls));

        bus.emit(&Context::background(), "test", unit()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(reported.load(Ordering::SeqCst), 0);

        // The break only applies to that emission.
        assert_eq!(bus.listener_count("test"), 2);
    }

    #[tokio::test]
    async fn test_glob_matching_and_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.add_listener("test.*", recording(&log, "glob"));
        bus.add_listener("other", recording(&log, "other"));
        bus.add_listener("test.event", recording(&log, "specific"));
        bus.add_listener("*", recording(&log, "all"));

        bus.emit(&Context::background(), "test.event", unit()).await;

        assert_eq!(*log.lock(), vec!["glob", "specific", "all"]);
        assert_eq!(bus.listener_count("test.event"), 3);
        assert_eq!(bus.listener_count("other"), 2);
    }

    #[tokio::test]
    async fn test_once_fires_once_for_every_outcome() {
        for (stop_on_error, outcome) in [(true, 0), (true, 1), (false, 1), (true, 2)] {
            let bus =
                EventBus::with_options(EventBusOptions::new().with_stop_on_error(stop_on_error));
            let calls = Arc::new(AtomicUsize::new(0));
            let calls_clone = Arc::clone(&calls);

            bus.once(
                "test",
                listener_fn(move |_, _| {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        match outcome {
                            0 => Ok(()),
                            1 => Err("fail".into()),
                            _ => Err(Break.into()),
                        }
                    }
                }),
            );

            bus.emit(&Context::background(), "test", unit()).await;
            bus.emit(&Context::background(), "test", unit()).await;

            assert_eq!(calls.load(Ordering::SeqCst), 1, "outcome {outcome}");
            assert_eq!(bus.listener_count("test"), 0);
        }
    }

    #[tokio::test]
    async fn test_once_not_refired_by_nested_emit() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let inner_bus = bus.clone();

        bus.once(
            "test",
            listener_fn(move |ctx, payload| {
                let calls = Arc::clone(&calls_clone);
                let bus = inner_bus.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    bus.emit(&ctx, "test", payload).await;
                    Ok(())
                }
            }),
        );

        bus.emit(&Context::background(), "test", unit()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let sub = bus.add_listener("test", counting(&calls));
        assert_eq!(bus.listener_count("test"), 1);

        bus.emit(&Context::background(), "test", unit()).await;
        sub.unsubscribe();
        assert_eq!(bus.listener_count("test"), 0);

        bus.emit(&Context::background(), "test", unit()).await;
        sub.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_once_before_emit() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let sub = bus.once("test", counting(&calls));
        bus.remove_listener(&sub);
        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_only_removes_own_registration() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = counting(&calls);

        let first = bus.add_listener("test", Arc::clone(&listener));
        let _second = bus.add_listener("test", listener);
        first.unsubscribe();

        bus.emit(&Context::background(), "test", unit()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listener_can_unsubscribe_itself() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);
        let calls_clone = Arc::clone(&calls);

        let sub = bus.add_listener(
            "test",
            listener_fn(move |_, _| {
                let slot = Arc::clone(&slot_clone);
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(sub) = slot.lock().take() {
                        sub.unsubscribe();
                    }
                    Ok(())
                }
            }),
        );
        *slot.lock() = Some(sub);

        bus.emit(&Context::background(), "test", unit()).await;
        bus.emit(&Context::background(), "test", unit()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_middleware_order_outermost_first() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["outer", "inner"] {
            let log = Arc::clone(&log);
            bus.use_middleware(
                "*",
                [middleware_fn(move |next: Listener| {
                    let log = Arc::clone(&log);
                    listener_fn(move |ctx, payload| {
                        let log = Arc::clone(&log);
                        let next = Arc::clone(&next);
                        async move {
                            log.lock().push(name);
                            next(ctx, payload).await
                        }
                    })
                })],
            );
        }
        bus.add_listener("test", recording(&log, "listener"));

        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(*log.lock(), vec!["outer", "inner", "listener"]);
        assert_eq!(bus.middleware_count("test"), 2);
    }

    #[tokio::test]
    async fn test_middleware_matched_by_emitted_name() {
        let bus = EventBus::new();
        let wrapped = Arc::new(AtomicUsize::new(0));
        let wrapped_clone = Arc::clone(&wrapped);

        bus.use_middleware(
            "test.event",
            [middleware_fn(move |next: Listener| {
                let wrapped = Arc::clone(&wrapped_clone);
                listener_fn(move |ctx, payload| {
                    wrapped.fetch_add(1, Ordering::SeqCst);
                    next(ctx, payload)
                })
            })],
        );
        let calls = Arc::new(AtomicUsize::new(0));
        bus.add_listener("test.*", counting(&calls));

        bus.emit(&Context::background(), "test.event", unit()).await;
        bus.emit(&Context::background(), "test.other", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(wrapped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let reported_clone = Arc::clone(&reported);
        let bus = EventBus::with_options(
            EventBusOptions::new()
                .with_stop_on_error(false)
                .with_error_handler(move |_, err| reported_clone.lock().push(err.to_string())),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        bus.once(
            "test",
            listener_fn(|_, _| async {
                if true {
                    panic!("boom");
                }
                Ok(())
            }),
        );
        bus.add_listener("test", counting(&calls));

        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*reported.lock(), vec!["listener panicked: boom".to_string()]);
        // Bookkeeping still ran and the lock is free.
        assert_eq!(bus.listener_count("test"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_emit_still_removes_once_listener() {
        let bus = EventBus::new();
        bus.once(
            "test",
            listener_fn(|_, _| async {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok(())
            }),
        );

        let ctx = Context::background();
        let emit = bus.emit(&ctx, "test", unit());
        let timed_out = tokio::time::timeout(std::time::Duration::from_secs(1), emit).await;

        assert!(timed_out.is_err());
        assert_eq!(bus.listener_count("test"), 0);
    }

    #[tokio::test]
    async fn test_middleware_panic_while_wrapping_is_contained() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let reported_clone = Arc::clone(&reported);
        let bus = EventBus::with_options(
            EventBusOptions::new()
                .with_stop_on_error(false)
                .with_error_handler(move |_, err| reported_clone.lock().push(err.to_string())),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        bus.use_middleware(
            "test",
            [middleware_fn(|_next| -> Listener { panic!("bad wrap") })],
        );
        bus.once("test", counting(&calls));
        bus.add_listener("test", counting(&calls));

        bus.emit(&Context::background(), "test", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *reported.lock(),
            vec!["listener panicked: bad wrap".to_string(); 2]
        );
        assert_eq!(bus.listener_count("test"), 1);
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_skipped() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_listener("[", counting(&calls));
        bus.emit(&Context::background(), "test", unit()).await;
        bus.emit(&Context::background(), "[", unit()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.listener_count("["), 0);
    }

    #[tokio::test]
    async fn test_remove_all_listeners_is_exact() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        bus.add_listener("test", counting(&calls));
        bus.add_listener("test", counting(&calls));
        bus.add_listener("t*", counting(&calls));
        assert_eq!(bus.listener_count("test"), 3);

        bus.remove_all_listeners("test");
        assert_eq!(bus.listener_count("test"), 1);

        // Unknown patterns are fine.
        bus.remove_all_listeners("non-existent");
    }

    #[tokio::test]
    async fn test_typed_listener_ignores_other_payloads() {
        #[derive(Debug)]
        struct MyEvent {
            data: String,
        }

        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(None));
        let received_clone = Arc::clone(&received);

        bus.on::<MyEvent, _, _>("test", move |_, event| {
            let received = Arc::clone(&received_clone);
            async move {
                *received.lock() = Some(event.data.clone());
                Ok(())
            }
        });

        bus.emit(
            &Context::background(),
            "test",
            Arc::new(MyEvent {
                data: "hello".into(),
            }),
        )
        .await;
        assert_eq!(received.lock().as_deref(), Some("hello"));

        *received.lock() = None;
        bus.emit(&Context::background(), "test", Arc::new("wrong type")).await;
        assert!(received.lock().is_none());
    }

    #[test]
    fn test_weak_handle_does_not_keep_bus_alive() {
        let bus = EventBus::new();
        let weak = bus.downgrade();
        assert!(weak.upgrade().is_some());

        drop(bus);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_context_reaches_listener() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        bus.add_listener(
            "test",
            listener_fn(move |ctx, _| {
                let seen = Arc::clone(&seen_clone);
                async move {
                    if let Some(v) = ctx.value::<usize>() {
                        seen.store(*v, Ordering::SeqCst);
                    }
                    Ok(())
                }
            }),
        );

        let ctx = Context::background().with_value(42_usize);
        bus.emit(&ctx, "test", unit()).await;
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }
}
