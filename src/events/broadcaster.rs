//! Per-order event log and live-progress broadcaster.
//!
//! Owns the only state in the system mutated by multiple concurrent
//! actors: each order's append-only event history and its set of live
//! subscribers. One service instance is created at startup and injected
//! wherever events are recorded or observed; there are no globals.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{OrderEvent, OrderStatus};

/// Identifies one attached subscriber within an order's channel.
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<OrderEvent>,
}

#[derive(Default)]
struct OrderChannel {
    history: Vec<OrderEvent>,
    subscribers: Vec<Subscriber>,
}

/// Ordered, replayable progress visibility for orders.
///
/// Ordering is guaranteed only within a single order's event sequence:
/// `record` appends and fans out under that order's map entry, so every
/// subscriber observes one order's events in emission order. No ordering
/// guarantee is made across different orders.
pub struct Broadcaster {
    channels: Arc<DashMap<Uuid, OrderChannel>>,
    cleanup_timers: Arc<DashMap<Uuid, JoinHandle<()>>>,
    history_grace: Duration,
    next_subscriber_id: AtomicU64,
}

impl Broadcaster {
    pub fn new(history_grace: Duration) -> Arc<Self> {
        Arc::new(Self {
            channels: Arc::new(DashMap::new()),
            cleanup_timers: Arc::new(DashMap::new()),
            history_grace,
            next_subscriber_id: AtomicU64::new(1),
        })
    }

    /// Append one event to the order's history, then deliver it to every
    /// currently attached subscriber, best-effort. A subscriber whose
    /// channel has closed is dropped and logged; delivery failures never
    /// reach the caller. Non-blocking: delivery is a channel handoff, the
    /// pipeline does not wait for consumption.
    pub fn record(&self, order_id: Uuid, status: OrderStatus, meta: serde_json::Value) {
        let event = OrderEvent::new(order_id, status, meta);
        let mut channel = self.channels.entry(order_id).or_default();
        channel.history.push(event.clone());

        channel.subscribers.retain(|sub| {
            if let Err(e) = sub.tx.send(event.clone()) {
                warn!(
                    %order_id,
                    subscriber = sub.id,
                    "dropping subscriber, delivery failed: {e}"
                );
                false
            } else {
                true
            }
        });
        debug!(%order_id, %status, history_len = channel.history.len(), "event recorded");
    }

    /// Register a live subscriber and replay the order's full existing
    /// history into its channel before any new live event. A subscriber
    /// attaching after the pipeline has progressed still observes every
    /// prior stage transition, in original order.
    pub fn attach(&self, order_id: Uuid) -> (SubscriberId, mpsc::UnboundedReceiver<OrderEvent>) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut channel = self.channels.entry(order_id).or_default();
        for event in &channel.history {
            // Receiver is still in scope, sends cannot fail here.
            let _ = tx.send(event.clone());
        }
        debug!(
            %order_id,
            subscriber = id,
            replayed = channel.history.len(),
            "subscriber attached"
        );
        channel.subscribers.push(Subscriber { id, tx });
        (id, rx)
    }

    /// Remove a subscriber. Idempotent: detaching an unknown or already
    /// removed subscriber is a no-op. An entry left with no subscribers
    /// and no history is dropped, so connects to arbitrary order ids
    /// cannot grow the map unboundedly.
    pub fn detach(&self, order_id: Uuid, subscriber_id: SubscriberId) {
        if let Some(mut channel) = self.channels.get_mut(&order_id) {
            channel.subscribers.retain(|sub| sub.id != subscriber_id);
            debug!(%order_id, subscriber = subscriber_id, "subscriber detached");
        }
        self.channels.remove_if(&order_id, |_, ch| {
            ch.subscribers.is_empty() && ch.history.is_empty()
        });
    }

    /// Discard the stored history for an order. Subscribers attaching
    /// afterwards observe only events emitted after this point; live
    /// subscribers are unaffected.
    pub fn clear(&self, order_id: Uuid) {
        Self::clear_channel(&self.channels, order_id);
    }

    fn clear_channel(channels: &DashMap<Uuid, OrderChannel>, order_id: Uuid) {
        if let Some(mut channel) = channels.get_mut(&order_id) {
            let dropped = channel.history.len();
            channel.history.clear();
            debug!(%order_id, dropped, "event history cleared");
        }
        // Drop the entry entirely once nobody is listening.
        channels.remove_if(&order_id, |_, ch| {
            ch.subscribers.is_empty() && ch.history.is_empty()
        });
    }

    /// Schedule a one-shot history cleanup after the grace window.
    /// Replaces any previously scheduled timer for the order. Called on
    /// terminal states so slow-joining subscribers keep a replay window.
    pub fn schedule_cleanup(&self, order_id: Uuid) {
        let channels = Arc::clone(&self.channels);
        let timers = Arc::clone(&self.cleanup_timers);
        let grace = self.history_grace;
        // The task removes its own timer entry, so it must not start
        // counting down until the entry exists; otherwise a short grace
        // lets the removal run first and the insert below would park a
        // finished handle in the map.
        let (armed_tx, armed_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if armed_rx.await.is_err() {
                return;
            }
            tokio::time::sleep(grace).await;
            timers.remove(&order_id);
            Self::clear_channel(&channels, order_id);
        });
        if let Some(previous) = self.cleanup_timers.insert(order_id, handle) {
            previous.abort();
        }
        let _ = armed_tx.send(());
    }

    /// Abort a pending cleanup timer, if any. Called when an order is
    /// re-attempted after a terminal state already scheduled cleanup.
    pub fn cancel_cleanup(&self, order_id: Uuid) {
        if let Some((_, handle)) = self.cleanup_timers.remove(&order_id) {
            handle.abort();
            debug!(%order_id, "pending history cleanup cancelled");
        }
    }

    pub fn history_len(&self, order_id: Uuid) -> usize {
        self.channels
            .get(&order_id)
            .map(|ch| ch.history.len())
            .unwrap_or(0)
    }

    pub fn subscriber_count(&self, order_id: Uuid) -> usize {
        self.channels
            .get(&order_id)
            .map(|ch| ch.subscribers.len())
            .unwrap_or(0)
    }

    /// Number of orders with live state (history or subscribers).
    pub fn active_orders(&self) -> usize {
        self.channels.len()
    }

    /// Number of cleanup timers currently registered.
    pub fn pending_cleanups(&self) -> usize {
        self.cleanup_timers.len()
    }
}
