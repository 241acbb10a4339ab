#![deny(unsafe_code)]
#![warn(missing_docs)]
//! mgit-events
//!
//! A typed multi-producer, multi-consumer [`EventBus`] for [`ProgressEvent`]
//! values (spec.md C9 / §4.9), grounded on the teacher's
//! `abp-runtime::bus` module shape (a registry of per-subscriber channels
//! behind a shared lock), but over bounded `tokio::sync::mpsc` channels
//! rather than `broadcast`: spec.md §4.9 requires "producers block when no
//! consumer drains (bounded buffer)," and §5 lists Event Bus sends among
//! the operations that may suspend, which a lossy `broadcast` sender can
//! never do. `publish()` therefore suspends until every live subscriber has
//! room, pruning subscribers that have been dropped.

use mgit_core::ProgressEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};

/// Default per-subscriber channel capacity for a new [`EventBus`].
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct StatsInner {
    total_published: AtomicU64,
    dropped_events: AtomicU64,
}

/// Bus distributing [`ProgressEvent`]s to every current subscriber over a
/// bounded channel per subscriber.
pub struct EventBus {
    capacity: usize,
    subscribers: Mutex<Vec<mpsc::Sender<ProgressEvent>>>,
    stats: Arc<StatsInner>,
}

impl EventBus {
    /// Create a bus with the default per-subscriber channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit per-subscriber channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            subscribers: Mutex::new(Vec::new()),
            stats: Arc::new(StatsInner::default()),
        }
    }

    /// Subscribe to future events. Unsubscribing is implicit: dropping the
    /// returned [`EventSubscription`] is idempotent and requires no explicit
    /// call, satisfying spec.md §6's "unsubscribe is idempotent". The
    /// dropped sender is pruned lazily, on the next [`publish`](Self::publish).
    pub async fn subscribe(&self) -> EventSubscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.lock().await.push(tx);
        EventSubscription { rx }
    }

    /// Publish an event to all current subscribers, suspending until each
    /// one has room in its bounded buffer (spec.md §4.9 "producers block
    /// when no consumer drains"). With no subscribers the event is dropped
    /// and counted in [`EventBusStats::dropped_events`]; a subscriber whose
    /// receiver has been dropped is pruned rather than retried.
    pub async fn publish(&self, event: ProgressEvent) {
        self.stats.total_published.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.is_empty() {
            self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let mut i = 0;
        while i < subscribers.len() {
            match subscribers[i].send(event.clone()).await {
                Ok(()) => i += 1,
                Err(_) => {
                    subscribers.remove(i);
                }
            }
        }
    }

    /// Number of currently active subscribers.
    #[must_use]
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// Snapshot of cumulative bus statistics.
    #[must_use]
    pub async fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_published: self.stats.total_published.load(Ordering::Relaxed),
            active_subscribers: self.subscribers.lock().await.len(),
            dropped_events: self.stats.dropped_events.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle for receiving [`ProgressEvent`]s from an [`EventBus`].
pub struct EventSubscription {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl EventSubscription {
    /// Receive the next event, waiting asynchronously. Returns `None` once
    /// the bus has no more senders for this subscription (the bus was
    /// dropped, or this subscription was pruned after its buffer closed).
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.rx.try_recv().ok()
    }
}

/// Snapshot of [`EventBus`] statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusStats {
    /// Total events published, including dropped ones.
    pub total_published: u64,
    /// Currently active subscriber count.
    pub active_subscribers: usize,
    /// Events dropped for having no subscriber at publish time.
    pub dropped_events: u64,
}
