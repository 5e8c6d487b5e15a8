// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Event Store - append-only, sequence-numbered log of field state changes
//!
//! # Ordering
//!
//! `append` holds the log's write lock while it assigns the next sequence,
//! inserts the record, hands it to matching subscribers and queues it for the
//! durable sink. Sequences are therefore gapless and every subscriber and
//! the sink backlog observe records in sequence order.
//!
//! # Subscribers
//!
//! Each subscription owns a bounded channel drained by its own tokio task,
//! so a slow or failing handler only delays itself. When a subscriber's
//! queue is full the new record is dropped for that subscriber alone and the
//! drop is logged and counted. `unsubscribe` flips the
//! subscription's active flag before returning; the task checks the flag
//! before every delivery.
//!
//! # Durable sink
//!
//! Records destined for the sink sit in a bounded backlog until `put`
//! succeeds. When the sink is unreachable the store turns degraded and the
//! flusher retries with capped exponential backoff. A full backlog drops its
//! oldest record and logs the lost sequence.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::config::{FieldConfig, RetryConfig};
use crate::domain::errors::StoreError;
use crate::domain::events::{EventFilter, StateEvent, StateEventKind};
use crate::domain::repository::DurableSink;

type Log = Arc<RwLock<BTreeMap<u64, StateEvent>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery target for a subscription.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &StateEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl EventHandler for mpsc::UnboundedSender<StateEvent> {
    async fn handle(&self, event: &StateEvent) -> anyhow::Result<()> {
        self.send(event.clone())
            .map_err(|_| anyhow::anyhow!("subscriber queue closed"))
    }
}

#[async_trait]
impl EventHandler for mpsc::Sender<StateEvent> {
    async fn handle(&self, event: &StateEvent) -> anyhow::Result<()> {
        self.send(event.clone())
            .await
            .map_err(|_| anyhow::anyhow!("subscriber queue closed"))
    }
}

/// Adapts a plain closure into an [`EventHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&StateEvent) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, event: &StateEvent) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

struct Subscriber {
    filter: EventFilter,
    tx: mpsc::Sender<StateEvent>,
    active: Arc<AtomicBool>,
    dropped: AtomicU64,
}

/// Retention and backlog settings.
#[derive(Debug, Clone)]
pub struct EventStoreConfig {
    pub retention_age: Duration,
    pub prune_significance: f64,
    pub always_keep_significance: f64,
    pub backlog_capacity: usize,
    pub subscriber_capacity: usize,
    pub retry: RetryConfig,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self::from(&FieldConfig::default())
    }
}

impl From<&FieldConfig> for EventStoreConfig {
    fn from(config: &FieldConfig) -> Self {
        Self {
            retention_age: config.retention_age,
            prune_significance: config.prune_significance,
            always_keep_significance: config.always_keep_significance,
            backlog_capacity: config.backlog_capacity,
            subscriber_capacity: config.subscriber_capacity,
            retry: config.sink_retry.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Backlog {
    queue: VecDeque<StateEvent>,
    dropped: u64,
    dropped_first: Option<u64>,
    dropped_last: Option<u64>,
}

/// Degraded-mode indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHealth {
    pub degraded: bool,
    pub head_sequence: u64,
    pub log_len: usize,
    pub backlog_len: usize,
    pub dropped_events: u64,
    pub dropped_range: Option<(u64, u64)>,
    pub subscribers: usize,
    /// Records not delivered because a subscriber queue was full.
    pub subscriber_drops: u64,
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub removed: usize,
    pub remaining: usize,
}

pub struct EventStore {
    config: EventStoreConfig,
    log: Log,
    head: AtomicU64,
    subscribers: DashMap<SubscriptionId, Subscriber>,
    sink: Option<Arc<dyn DurableSink>>,
    backlog: Mutex<Backlog>,
    degraded: AtomicBool,
    flush_signal: Notify,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    pub fn new(
        config: EventStoreConfig,
        sink: Option<Arc<dyn DurableSink>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            log: Arc::new(RwLock::new(BTreeMap::new())),
            head: AtomicU64::new(0),
            subscribers: DashMap::new(),
            sink,
            backlog: Mutex::new(Backlog::default()),
            degraded: AtomicBool::new(false),
            flush_signal: Notify::new(),
            clock,
        }
    }

    /// Append a record and return its sequence number.
    pub fn append(&self, kind: StateEventKind, payload: serde_json::Value, significance: f64) -> u64 {
        self.append_with(kind, significance, |_| payload)
    }

    /// Append a record whose payload depends on the sequence it receives.
    pub fn append_with<F>(&self, kind: StateEventKind, significance: f64, build: F) -> u64
    where
        F: FnOnce(u64) -> serde_json::Value,
    {
        let significance = if significance.is_finite() {
            significance.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut log = self.log.write();
        let sequence = self.head.load(Ordering::Acquire) + 1;
        let event = StateEvent {
            sequence,
            kind,
            payload: build(sequence),
            significance,
            timestamp: self.clock.now(),
        };

        log.insert(sequence, event.clone());
        self.head.store(sequence, Ordering::Release);
        self.dispatch(&event);
        if self.sink.is_some() {
            self.enqueue(event);
        }
        drop(log);

        debug!(sequence, kind = %kind, significance, "appended state event");
        sequence
    }

    fn dispatch(&self, event: &StateEvent) {
        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.active.load(Ordering::Acquire) || !subscriber.filter.matches(event) {
                continue;
            }
            match subscriber.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    let dropped = subscriber.dropped.fetch_add(1, Ordering::AcqRel) + 1;
                    warn!(
                        subscription = %entry.key().0,
                        sequence = event.sequence,
                        dropped,
                        "Subscriber queue full, event not delivered"
                    );
                }
                // The subscriber task is gone.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    fn enqueue(&self, event: StateEvent) {
        let mut backlog = self.backlog.lock();
        if backlog.queue.len() >= self.config.backlog_capacity {
            if let Some(dropped) = backlog.queue.pop_front() {
                backlog.dropped += 1;
                backlog.dropped_first.get_or_insert(dropped.sequence);
                backlog.dropped_last = Some(dropped.sequence);
                self.degraded.store(true, Ordering::Release);
                let err = StoreError::Overflow {
                    first: backlog.dropped_first.unwrap_or(dropped.sequence),
                    last: dropped.sequence,
                    count: backlog.dropped,
                };
                warn!(
                    sequence = dropped.sequence,
                    error = %err,
                    "Backlog full, dropped oldest buffered event"
                );
            }
        }
        backlog.queue.push_back(event);
        drop(backlog);
        self.flush_signal.notify_one();
    }

    /// Register a handler for records matching `filter`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<H>(&self, filter: EventFilter, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        let id = SubscriptionId::new();
        let (tx, mut rx) = mpsc::channel::<StateEvent>(self.config.subscriber_capacity.max(1));
        let active = Arc::new(AtomicBool::new(true));
        let task_active = active.clone();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !task_active.load(Ordering::Acquire) {
                    break;
                }
                if let Err(e) = handler.handle(&event).await {
                    warn!(
                        subscription = %id.0,
                        sequence = event.sequence,
                        error = %e,
                        "Subscriber failed to handle event"
                    );
                }
            }
            debug!(subscription = %id.0, "Subscriber task finished");
        });

        self.subscribers.insert(
            id,
            Subscriber {
                filter,
                tx,
                active,
                dropped: AtomicU64::new(0),
            },
        );
        debug!(subscription = %id.0, "Subscription registered");
        id
    }

    /// Stop deliveries to a subscription. Returns false for unknown ids.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.subscribers.remove(&id) {
            Some((_, subscriber)) => {
                subscriber.active.store(false, Ordering::Release);
                debug!(subscription = %id.0, "Subscription removed");
                true
            }
            None => false,
        }
    }

    /// Lazily iterate records with `sequence >= from_sequence`.
    ///
    /// The replay is bounded by the head sequence at the time of the call, so
    /// it is finite and covers a consistent prefix even while appends go on.
    pub fn replay(&self, from_sequence: u64) -> Replay {
        let end = self.head.load(Ordering::Acquire);
        Replay {
            log: self.log.clone(),
            from: from_sequence,
            cursor: from_sequence,
            end,
        }
    }

    pub fn get(&self, sequence: u64) -> Option<StateEvent> {
        self.log.read().get(&sequence).cloned()
    }

    pub fn head_sequence(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Drop old, insignificant records.
    ///
    /// A record goes when its significance is below `prune_significance` and
    /// it is older than `retention_age`. Records at or above
    /// `always_keep_significance` and the newest record always stay.
    pub fn prune(&self, now: DateTime<Utc>) -> PruneReport {
        let retention = chrono::Duration::from_std(self.config.retention_age)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let prune_below = self.config.prune_significance;
        let always_keep = self.config.always_keep_significance;

        let mut log = self.log.write();
        let newest = self.head.load(Ordering::Acquire);
        let before = log.len();
        log.retain(|sequence, event| {
            *sequence == newest
                || event.significance >= always_keep
                || event.significance >= prune_below
                || event.timestamp >= cutoff
        });
        let report = PruneReport {
            removed: before - log.len(),
            remaining: log.len(),
        };
        drop(log);

        if report.removed > 0 {
            info!(removed = report.removed, remaining = report.remaining, "Pruned event log");
        }
        report
    }

    /// Load persisted records from the sink on cold start.
    pub async fn hydrate(&self) -> Result<usize, StoreError> {
        let Some(sink) = &self.sink else {
            return Ok(0);
        };

        let from = self.head_sequence() + 1;
        let records = sink
            .query(from)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut log = self.log.write();
        let mut head = self.head.load(Ordering::Acquire);
        let mut loaded = 0;
        for record in records {
            if record.sequence <= head {
                continue;
            }
            if record.sequence != head + 1 {
                debug!(
                    expected = head + 1,
                    found = record.sequence,
                    "Gap in persisted event log"
                );
            }
            head = record.sequence;
            log.insert(record.sequence, record);
            loaded += 1;
        }
        self.head.store(head, Ordering::Release);
        drop(log);

        info!(loaded, head_sequence = head, "Hydrated event log from durable sink");
        Ok(loaded)
    }

    /// Push every backlogged record to the sink, stopping at the first
    /// failure. Returns how many records were persisted.
    pub async fn flush(&self) -> Result<usize, StoreError> {
        let Some(sink) = &self.sink else {
            return Ok(0);
        };

        let mut persisted = 0;
        loop {
            let next = self.backlog.lock().queue.front().cloned();
            let Some(record) = next else {
                if self.degraded.swap(false, Ordering::AcqRel) {
                    info!("Durable sink caught up, leaving degraded mode");
                }
                return Ok(persisted);
            };

            match sink.put(record.sequence, &record).await {
                Ok(()) => {
                    let mut backlog = self.backlog.lock();
                    // The record may have been dropped by an overflow meanwhile.
                    if backlog.queue.front().map(|r| r.sequence) == Some(record.sequence) {
                        backlog.queue.pop_front();
                    }
                    persisted += 1;
                }
                Err(e) => {
                    if !self.degraded.swap(true, Ordering::AcqRel) {
                        warn!(error = %e, "Durable sink unavailable, entering degraded mode");
                    }
                    return Err(StoreError::Unavailable(e.to_string()));
                }
            }
        }
    }

    /// Start the background task that drains the backlog into the sink.
    ///
    /// Returns `None` when the store has no sink.
    pub fn spawn_flusher(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        self.sink.as_ref()?;
        let store = self.clone();

        Some(tokio::spawn(async move {
            let initial = store.config.retry.initial;
            let max = store.config.retry.max;
            let mut backoff = initial;
            info!("Starting event store flusher");

            loop {
                match store.flush().await {
                    Ok(_) => {
                        backoff = initial;
                        tokio::select! {
                            _ = store.flush_signal.notified() => {}
                            _ = shutdown.cancelled() => break,
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, retry_in_ms = backoff.as_millis() as u64, "Flush failed");
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = shutdown.cancelled() => break,
                        }
                        backoff = (backoff * 2).min(max);
                    }
                }
            }

            if let Err(e) = store.flush().await {
                warn!(
                    error = %e,
                    backlog = store.backlog.lock().queue.len(),
                    "Final flush failed, backlogged events not persisted"
                );
            }
            info!("Event store flusher stopped");
        }))
    }

    pub fn health(&self) -> StoreHealth {
        let backlog = self.backlog.lock();
        StoreHealth {
            degraded: self.is_degraded(),
            head_sequence: self.head_sequence(),
            log_len: self.log.read().len(),
            backlog_len: backlog.queue.len(),
            dropped_events: backlog.dropped,
            dropped_range: backlog.dropped_first.zip(backlog.dropped_last),
            subscribers: self.subscribers.len(),
            subscriber_drops: self
                .subscribers
                .iter()
                .map(|s| s.dropped.load(Ordering::Acquire))
                .sum(),
        }
    }
}

/// Lazy, finite, restartable iteration over the event log.
pub struct Replay {
    log: Log,
    from: u64,
    cursor: u64,
    end: u64,
}

impl Replay {
    /// Rewind to the first requested sequence.
    pub fn restart(&mut self) {
        self.cursor = self.from;
    }

    /// Last sequence this replay will yield.
    pub fn high_water(&self) -> u64 {
        self.end
    }
}

impl Iterator for Replay {
    type Item = StateEvent;

    fn next(&mut self) -> Option<StateEvent> {
        if self.cursor > self.end {
            return None;
        }
        let next = self
            .log
            .read()
            .range(self.cursor..=self.end)
            .next()
            .map(|(_, event)| event.clone());

        match next {
            Some(event) => {
                self.cursor = event.sequence + 1;
                Some(event)
            }
            None => {
                self.cursor = self.end + 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::{ManualClock, SystemClock};
    use crate::infrastructure::sinks::InMemorySink;
    use serde_json::json;

    fn store() -> EventStore {
        EventStore::new(EventStoreConfig::default(), None, Arc::new(SystemClock))
    }

    fn store_with_sink(sink: Arc<InMemorySink>, backlog_capacity: usize) -> EventStore {
        let config = EventStoreConfig {
            backlog_capacity,
            ..EventStoreConfig::default()
        };
        EventStore::new(config, Some(sink), Arc::new(SystemClock))
    }

    #[test]
    fn test_sequences_start_at_one_and_are_gapless() {
        let store = store();
        let seqs: Vec<u64> = (0..5)
            .map(|i| store.append(StateEventKind::SignalFolded, json!({ "i": i }), 0.5))
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.head_sequence(), 5);
    }

    #[test]
    fn test_significance_is_clamped() {
        let store = store();
        let a = store.append(StateEventKind::SignalFolded, json!(null), 3.0);
        let b = store.append(StateEventKind::SignalFolded, json!(null), f64::NAN);
        assert_eq!(store.get(a).unwrap().significance, 1.0);
        assert_eq!(store.get(b).unwrap().significance, 0.0);
    }

    #[test]
    fn test_replay_is_restartable_and_bounded() {
        let store = store();
        for i in 0..4 {
            store.append(StateEventKind::SignalFolded, json!(i), 0.5);
        }

        let mut replay = store.replay(2);
        store.append(StateEventKind::SignalFolded, json!("late"), 0.5);

        let first: Vec<u64> = replay.by_ref().map(|e| e.sequence).collect();
        assert_eq!(first, vec![2, 3, 4]);
        assert_eq!(replay.next(), None);

        replay.restart();
        let second: Vec<u64> = replay.map(|e| e.sequence).collect();
        assert_eq!(second, first);
    }

    #[test]
    fn test_prune_policy() {
        let clock = Arc::new(ManualClock::default());
        let config = EventStoreConfig {
            retention_age: Duration::from_secs(3600),
            prune_significance: 0.3,
            always_keep_significance: 0.8,
            ..EventStoreConfig::default()
        };
        let store = EventStore::new(config, None, clock.clone());

        let low = store.append(StateEventKind::SignalFolded, json!(null), 0.1);
        let mid = store.append(StateEventKind::SignalFolded, json!(null), 0.5);
        let high = store.append(StateEventKind::SignalFolded, json!(null), 0.9);
        let newest_low = store.append(StateEventKind::SignalFolded, json!(null), 0.0);

        // Nothing is old enough yet.
        assert_eq!(store.prune(clock.now()).removed, 0);

        clock.advance(chrono::Duration::hours(2));
        let report = store.prune(clock.now());

        assert_eq!(report, PruneReport { removed: 1, remaining: 3 });
        assert!(store.get(low).is_none());
        assert!(store.get(mid).is_some());
        assert!(store.get(high).is_some());
        assert!(store.get(newest_low).is_some(), "newest record is never pruned");
    }

    #[tokio::test]
    async fn test_subscriber_receives_filtered_events_in_order() {
        let store = store();
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(EventFilter::all().with_min_significance(0.5), tx);

        store.append(StateEventKind::SignalFolded, json!(1), 0.9);
        store.append(StateEventKind::SignalFolded, json!(2), 0.1);
        store.append(StateEventKind::SignalFolded, json!(3), 0.6);

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!((a.sequence, b.sequence), (1, 3));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let store = store();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = store.subscribe(EventFilter::all(), tx);

        store.append(StateEventKind::SignalFolded, json!(1), 0.5);
        assert_eq!(rx.recv().await.unwrap().sequence, 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.append(StateEventKind::SignalFolded, json!(2), 0.5);

        // The forwarding task ends, closing the channel without delivering 2.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_subscriber_queue_drops_new_events() {
        let config = EventStoreConfig {
            subscriber_capacity: 2,
            ..EventStoreConfig::default()
        };
        let store = EventStore::new(config, None, Arc::new(SystemClock));
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(EventFilter::all(), tx);

        // The subscriber task cannot run between these synchronous appends.
        for i in 1..=5 {
            store.append(StateEventKind::SignalFolded, json!(i), 0.5);
        }
        assert_eq!(store.health().subscriber_drops, 3);

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        assert_eq!(rx.recv().await.unwrap().sequence, 2);

        store.append(StateEventKind::SignalFolded, json!(6), 0.5);
        assert_eq!(rx.recv().await.unwrap().sequence, 6);
        assert_eq!(store.health().subscriber_drops, 3);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let store = store();
        store.subscribe(
            EventFilter::all(),
            FnHandler(|_: &StateEvent| Err(anyhow::anyhow!("boom"))),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        store.subscribe(EventFilter::all(), tx);

        store.append(StateEventKind::SignalFolded, json!(1), 0.5);
        assert_eq!(rx.recv().await.unwrap().sequence, 1);
    }

    #[tokio::test]
    async fn test_flush_persists_backlog() {
        let sink = Arc::new(InMemorySink::new());
        let store = store_with_sink(sink.clone(), 10);

        store.append(StateEventKind::SignalFolded, json!(1), 0.5);
        store.append(StateEventKind::SignalFolded, json!(2), 0.5);
        assert_eq!(store.health().backlog_len, 2);

        assert_eq!(store.flush().await.unwrap(), 2);
        assert_eq!(store.health().backlog_len, 0);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_sink_degrades_and_overflows() {
        let sink = Arc::new(InMemorySink::unavailable());
        let store = store_with_sink(sink.clone(), 3);

        for i in 0..5 {
            store.append(StateEventKind::SignalFolded, json!(i), 0.5);
        }
        assert!(matches!(store.flush().await, Err(StoreError::Unavailable(_))));

        let health = store.health();
        assert!(health.degraded);
        assert_eq!(health.backlog_len, 3);
        assert_eq!(health.dropped_events, 2);
        assert_eq!(health.dropped_range, Some((1, 2)));

        // Recovery drains what is left and clears the flag.
        sink.set_available(true);
        assert_eq!(store.flush().await.unwrap(), 3);
        assert!(!store.is_degraded());
        let stored: Vec<u64> = sink.query(0).await.unwrap().iter().map(|e| e.sequence).collect();
        assert_eq!(stored, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_flusher_retries_until_sink_returns() {
        let sink = Arc::new(InMemorySink::unavailable());
        let config = EventStoreConfig {
            retry: RetryConfig {
                initial: Duration::from_millis(5),
                max: Duration::from_millis(20),
            },
            ..EventStoreConfig::default()
        };
        let store = Arc::new(EventStore::new(config, Some(sink.clone()), Arc::new(SystemClock)));
        let shutdown = CancellationToken::new();
        let handle = store.spawn_flusher(shutdown.clone()).unwrap();

        store.append(StateEventKind::SignalFolded, json!(1), 0.5);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(sink.len(), 0);

        sink.set_available(true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.len(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_hydrate_restores_log_and_head() {
        let sink = Arc::new(InMemorySink::new());
        {
            let store = store_with_sink(sink.clone(), 10);
            for i in 0..3 {
                store.append(StateEventKind::SignalFolded, json!(i), 0.5);
            }
            store.flush().await.unwrap();
        }

        let restarted = store_with_sink(sink.clone(), 10);
        assert_eq!(restarted.hydrate().await.unwrap(), 3);
        assert_eq!(restarted.head_sequence(), 3);
        assert_eq!(restarted.append(StateEventKind::SignalFolded, json!(3), 0.5), 4);
    }
}
