//! Per-request result routing with abandonment timers.
//!
//! [`ResultRouter`] maps each outstanding [`RequestId`] to the
//! [`UiSurface`] that asked for it. Every entry owns an abandonment timer:
//! a spawned task that waits [`DEFAULT_ABANDON_AFTER`] and, unless its
//! [`CancellationToken`] fires first, removes the entry and delivers a
//! synthesized `"No response from server"` error.
//!
//! - a token event appends to the entry and re-arms the timer
//! - `done` and `error` remove the entry and cancel the timer
//! - events for unknown ids are dropped
//!
//! Removal happens under the table lock, so an entry is removed exactly
//! once whether the terminal event or the timer gets there first.
//!
//! If a surface rejects an event, the entry is dropped and exactly one
//! fallback error notification is attempted (on the fallback surface when
//! one is configured, otherwise on the original target).
//!
//! [`register`](ResultRouter::register) hands back a request token. The
//! router cancels it whenever it drops an entry on its own (abandonment,
//! failed delivery, re-registration) so the producer can stop work nobody
//! will see.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use replywise_types::{Ack, MessagingError, RequestId, RouteEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How long an entry may go without any event before it is abandoned.
pub const DEFAULT_ABANDON_AFTER: Duration = Duration::from_millis(25_000);

/// Error text delivered when an entry is abandoned.
pub const NO_RESPONSE_MESSAGE: &str = "No response from server";

/// Error text of the fallback notification after a failed delivery.
pub const DELIVERY_FAILED_MESSAGE: &str = "Could not deliver the reply to the page";

/// A UI surface that displays routed events.
#[async_trait]
pub trait UiSurface: Send + Sync {
    /// Deliver one event. Events of one request arrive in order.
    async fn deliver(&self, event: RouteEvent) -> Result<Ack, MessagingError>;
}

struct RouteEntry {
    target: Arc<dyn UiSurface>,
    accumulated: String,
    timer: CancellationToken,
    /// Cancelled when the router gives up on the request.
    request: CancellationToken,
    /// Identifies the currently armed timer; stale timers see a mismatch.
    generation: u64,
}

struct RouterInner {
    entries: Mutex<HashMap<RequestId, RouteEntry>>,
    abandon_after: Duration,
    next_generation: AtomicU64,
    fallback: Option<Arc<dyn UiSurface>>,
}

/// Routes events to the surface that registered each request.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct ResultRouter {
    inner: Arc<RouterInner>,
}

impl std::fmt::Debug for ResultRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultRouter")
            .field("pending", &self.pending())
            .field("abandon_after", &self.inner.abandon_after)
            .finish_non_exhaustive()
    }
}

impl Default for ResultRouter {
    fn default() -> Self {
        Self::new(DEFAULT_ABANDON_AFTER)
    }
}

impl ResultRouter {
    pub fn new(abandon_after: Duration) -> Self {
        Self::build(abandon_after, None)
    }

    /// A router that escalates delivery failures to `fallback`.
    pub fn with_fallback(abandon_after: Duration, fallback: Arc<dyn UiSurface>) -> Self {
        Self::build(abandon_after, Some(fallback))
    }

    fn build(abandon_after: Duration, fallback: Option<Arc<dyn UiSurface>>) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                entries: Mutex::new(HashMap::new()),
                abandon_after,
                next_generation: AtomicU64::new(0),
                fallback,
            }),
        }
    }

    pub fn abandon_after(&self) -> Duration {
        self.inner.abandon_after
    }

    pub fn has_fallback(&self) -> bool {
        self.inner.fallback.is_some()
    }

    /// An empty router with a new abandonment timeout and the same fallback.
    pub fn reconfigured(&self, abandon_after: Duration) -> Self {
        Self::build(abandon_after, self.inner.fallback.clone())
    }

    /// Register `id` for `target` and arm its abandonment timer.
    ///
    /// Returns the request token, cancelled if the router drops the entry
    /// before a terminal event is routed. Re-registering an id replaces the
    /// previous entry and cancels both of its tokens. Must be called inside
    /// a tokio runtime.
    pub fn register(&self, id: RequestId, target: Arc<dyn UiSurface>) -> CancellationToken {
        let (timer, generation) = self.arm(id.clone());
        let request = CancellationToken::new();
        let previous = self.inner.entries.lock().insert(
            id.clone(),
            RouteEntry {
                target,
                accumulated: String::new(),
                timer,
                request: request.clone(),
                generation,
            },
        );
        if let Some(old) = previous {
            old.timer.cancel();
            old.request.cancel();
            debug!(request_id = %id, "request re-registered, previous entry replaced");
        }
        trace!(request_id = %id, "request registered");
        request
    }

    /// Route `event` to the surface registered for `id`.
    ///
    /// Returns `false` (and drops the event) if `id` is not registered.
    pub async fn route(&self, id: &RequestId, event: RouteEvent) -> bool {
        let target = {
            let mut entries = self.inner.entries.lock();
            match &event {
                RouteEvent::Token { text } => {
                    let Some(entry) = entries.get_mut(id) else {
                        trace!(request_id = %id, "token for unknown request dropped");
                        return false;
                    };
                    entry.accumulated.push_str(text);
                    entry.timer.cancel();
                    let (timer, generation) = self.arm(id.clone());
                    entry.timer = timer;
                    entry.generation = generation;
                    entry.target.clone()
                }
                RouteEvent::Done { .. } | RouteEvent::Error { .. } => {
                    let Some(entry) = entries.remove(id) else {
                        trace!(request_id = %id, "terminal event for unknown request dropped");
                        return false;
                    };
                    entry.timer.cancel();
                    entry.target
                }
            }
        };

        self.deliver(id, target, event).await;
        true
    }

    /// Whether `id` is still outstanding.
    pub fn is_registered(&self, id: &RequestId) -> bool {
        self.inner.entries.lock().contains_key(id)
    }

    /// Text routed so far for `id`.
    pub fn accumulated(&self, id: &RequestId) -> Option<String> {
        self.inner
            .entries
            .lock()
            .get(id)
            .map(|e| e.accumulated.clone())
    }

    /// Number of outstanding requests.
    pub fn pending(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Spawn a timer task for `id`; returns its token and generation.
    fn arm(&self, id: RequestId) -> (CancellationToken, u64) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let router = self.clone();
        let after = self.inner.abandon_after;

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(after) => {
                    router.abandon(id, generation).await;
                }
            }
        });

        (token, generation)
    }

    async fn abandon(&self, id: RequestId, generation: u64) {
        let target = {
            let mut entries = self.inner.entries.lock();
            let current = entries.get(&id).is_some_and(|e| e.generation == generation);
            if current {
                entries.remove(&id).map(|e| {
                    e.request.cancel();
                    e.target
                })
            } else {
                None
            }
        };
        let Some(target) = target else {
            return;
        };

        warn!(
            request_id = %id,
            after_ms = self.inner.abandon_after.as_millis() as u64,
            "request abandoned, no terminal event received"
        );
        let event = RouteEvent::Error {
            message: NO_RESPONSE_MESSAGE.to_string(),
        };
        self.deliver(&id, target, event).await;
    }

    async fn deliver(&self, id: &RequestId, target: Arc<dyn UiSurface>, event: RouteEvent) {
        let Err(err) = target.deliver(event).await else {
            return;
        };
        warn!(request_id = %id, error = %err, "delivery failed, sending fallback notification");

        if let Some(entry) = self.inner.entries.lock().remove(id) {
            entry.timer.cancel();
            entry.request.cancel();
        }

        let escalate_to = self.inner.fallback.clone().unwrap_or(target);
        let fallback = RouteEvent::Error {
            message: DELIVERY_FAILED_MESSAGE.to_string(),
        };
        if let Err(e) = escalate_to.deliver(fallback).await {
            debug!(request_id = %id, error = %e, "fallback notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every delivered event; optionally fails the first N deliveries.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<RouteEvent>>,
        fail_first: Mutex<usize>,
    }

    impl Recorder {
        fn failing(n: usize) -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail_first: Mutex::new(n),
            }
        }

        fn events(&self) -> Vec<RouteEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl UiSurface for Recorder {
        async fn deliver(&self, event: RouteEvent) -> Result<Ack, MessagingError> {
            {
                let mut remaining = self.fail_first.lock();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(MessagingError::Disconnected);
                }
            }
            self.events.lock().push(event);
            Ok(Ack)
        }
    }

    fn token(t: &str) -> RouteEvent {
        RouteEvent::Token { text: t.into() }
    }

    fn no_response() -> RouteEvent {
        RouteEvent::Error {
            message: NO_RESPONSE_MESSAGE.into(),
        }
    }

    /// Let spawned timer tasks observe the current (paused) clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ── Routing ─────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn tokens_then_done_reach_the_registered_surface() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("r1");
        router.register(id.clone(), ui.clone());

        assert!(router.route(&id, token("Hel")).await);
        assert!(router.route(&id, token("lo")).await);
        assert_eq!(router.accumulated(&id).as_deref(), Some("Hello"));
        assert!(router.route(&id, RouteEvent::Done { usage: None }).await);

        assert_eq!(
            ui.events(),
            vec![token("Hel"), token("lo"), RouteEvent::Done { usage: None }]
        );
        assert!(!router.is_registered(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_are_dropped() {
        let router = ResultRouter::default();
        assert!(!router.route(&RequestId::from("ghost"), token("x")).await);
        assert!(
            !router
                .route(&RequestId::from("ghost"), RouteEvent::Done { usage: None })
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_are_isolated() {
        let router = ResultRouter::default();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        router.register(RequestId::from("a"), a.clone());
        router.register(RequestId::from("b"), b.clone());

        router.route(&RequestId::from("b"), token("for b")).await;
        router.route(&RequestId::from("a"), token("for a")).await;

        assert_eq!(a.events(), vec![token("for a")]);
        assert_eq!(b.events(), vec![token("for b")]);
        assert_eq!(router.pending(), 2);
    }

    // ── Abandonment ─────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn silent_request_is_abandoned_exactly_once() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("slow");
        router.register(id.clone(), ui.clone());

        tokio::time::sleep(DEFAULT_ABANDON_AFTER - Duration::from_millis(1)).await;
        settle().await;
        assert!(ui.events().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(ui.events(), vec![no_response()]);
        assert!(!router.is_registered(&id));

        // A late terminal event finds nothing to remove.
        assert!(!router.route(&id, RouteEvent::Done { usage: None }).await);
        tokio::time::sleep(DEFAULT_ABANDON_AFTER * 2).await;
        settle().await;
        assert_eq!(ui.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refresh_the_timer() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("chatty");
        router.register(id.clone(), ui.clone());

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(20)).await;
            settle().await;
            router.route(&id, token(".")).await;
        }
        assert!(router.is_registered(&id));

        tokio::time::sleep(DEFAULT_ABANDON_AFTER + Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(ui.events().last(), Some(&no_response()));
        assert!(!router.is_registered(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_event_cancels_the_timer() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("quick");
        router.register(id.clone(), ui.clone());
        router
            .route(&id, RouteEvent::Error { message: "boom".into() })
            .await;

        tokio::time::sleep(DEFAULT_ABANDON_AFTER * 2).await;
        settle().await;
        assert_eq!(ui.events(), vec![RouteEvent::Error { message: "boom".into() }]);
    }

    #[tokio::test(start_paused = true)]
    async fn abandonment_cancels_the_request_token() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("stalled");
        let request = router.register(id.clone(), ui.clone());

        tokio::time::sleep(DEFAULT_ABANDON_AFTER + Duration::from_millis(1)).await;
        settle().await;
        assert!(request.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_event_leaves_the_request_token_alone() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("ok");
        let request = router.register(id.clone(), ui.clone());
        router.route(&id, RouteEvent::Done { usage: None }).await;

        tokio::time::sleep(DEFAULT_ABANDON_AFTER * 2).await;
        settle().await;
        assert!(!request.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn re_registration_cancels_the_previous_request() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::default());
        let id = RequestId::from("dup");
        let first = router.register(id.clone(), ui.clone());
        let second = router.register(id.clone(), ui.clone());
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn reconfigured_keeps_the_fallback() {
        let backup = Arc::new(Recorder::default());
        let router = ResultRouter::with_fallback(DEFAULT_ABANDON_AFTER, backup);
        let changed = router.reconfigured(Duration::from_secs(5));
        assert!(changed.has_fallback());
        assert_eq!(changed.abandon_after(), Duration::from_secs(5));
        assert!(!ResultRouter::default().reconfigured(Duration::from_secs(5)).has_fallback());
    }

    // ── Delivery failure ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_sends_one_fallback_and_drops_entry() {
        let router = ResultRouter::default();
        let ui = Arc::new(Recorder::failing(1));
        let id = RequestId::from("lost");
        let request = router.register(id.clone(), ui.clone());

        router.route(&id, token("x")).await;
        assert!(!router.is_registered(&id));
        assert!(request.is_cancelled());
        assert_eq!(
            ui.events(),
            vec![RouteEvent::Error {
                message: DELIVERY_FAILED_MESSAGE.into()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_surface_receives_escalation() {
        let backup = Arc::new(Recorder::default());
        let router = ResultRouter::with_fallback(DEFAULT_ABANDON_AFTER, backup.clone());
        let ui = Arc::new(Recorder::failing(usize::MAX));
        let id = RequestId::from("tab-closed");
        router.register(id.clone(), ui.clone());

        router.route(&id, RouteEvent::Done { usage: None }).await;
        assert!(ui.events().is_empty());
        assert_eq!(backup.events().len(), 1);
    }
}
