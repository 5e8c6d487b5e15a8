// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Aggregation Field - folds signals from many sessions into one shared state
//!
//! Every accepted signal moves through `Received -> Validated -> Enriched ->
//! Folded -> Published`:
//!
//! - **Validated**: bounded fields are checked; a rejected signal leaves no
//!   trace in any state.
//! - **Enriched**: resonance, tags, session coherence and pattern matches are
//!   derived. Computation errors degrade the value but never stop the signal.
//! - **Folded**: under the fold lock the enriched signal updates the running
//!   aggregates and tracked patterns.
//! - **Published**: a `signal_folded` record carrying the new snapshot is
//!   appended to the event store, which hands it to subscribers, and the
//!   snapshot is swapped in as the live one.
//!
//! Fold records contain every input of the fold plus a checkpoint of the fold
//! aggregates, so replaying the log through [`AggregationField::rebuild_from`]
//! reproduces the live snapshot even when earlier records are missing.
//!
//! # Time
//!
//! Snapshot aggregates run on the fold clock (the newest signal timestamp),
//! which keeps refolds independent of when they happen. Pattern strength and
//! session idleness run on the field's [`Clock`]: patterns are stamped and
//! sessions touched at the moment a signal is accepted, and decay and
//! eviction measure against the same clock.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Ingest pipeline, shared snapshot and maintenance entry point

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::clock::Clock;
use crate::domain::config::FieldConfig;
use crate::domain::errors::{ComputationError, FieldError, FieldResult};
use crate::domain::events::{
    EventFilter, FoldCheckpoint, FoldRecord, PatternsPrunedRecord, SessionCheckpoint, StateEvent,
    StateEventKind,
};
use crate::domain::pattern::{PatternDecay, PatternFilter, PatternMatch, PatternRecord};
use crate::domain::repository::DurableSink;
use crate::domain::signal::{IngestStage, SessionId, SignalEnvelope, SignalEvent};
use crate::domain::snapshot::FieldSnapshot;
use crate::infrastructure::cache::CacheStatsSnapshot;
use crate::infrastructure::event_store::{
    EventHandler, EventStore, EventStoreConfig, PruneReport, Replay, StoreHealth, SubscriptionId,
};

use super::metric_engine::{normalize, Derived, MetricEngine, MetricSettings, Readiness};
use super::pattern_extractor::{ExtractorSettings, PatternExtractor};

/// Result of a successful ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub sequence: u64,
    pub snapshot: Arc<FieldSnapshot>,
    pub matches: Vec<PatternMatch>,
    /// Computation errors absorbed while enriching the signal.
    pub degraded: Vec<ComputationError>,
}

/// A tracked pattern together with its strength at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPattern {
    pub record: PatternRecord,
    pub current_strength: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub cache_entries_expired: usize,
    pub patterns_pruned: Vec<String>,
    pub sessions_evicted: usize,
    pub events_pruned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub records: usize,
    pub folds: usize,
    /// Folds restored from their recorded checkpoint because earlier records
    /// were missing from the replay.
    pub reseeded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldHealth {
    pub store: StoreHealth,
    pub metric_cache: CacheStatsSnapshot,
    pub tag_cache: CacheStatsSnapshot,
    pub sessions: usize,
    pub patterns: usize,
}

struct SessionState {
    events: VecDeque<SignalEvent>,
    tags: VecDeque<BTreeSet<String>>,
    /// Field clock reading when the session last delivered a signal.
    last_seen: DateTime<Utc>,
}

impl SessionState {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            events: VecDeque::new(),
            tags: VecDeque::new(),
            last_seen: at,
        }
    }

    fn push(
        &mut self,
        event: SignalEvent,
        tags: BTreeSet<String>,
        seen_at: DateTime<Utc>,
        history_window: usize,
        tag_window: usize,
    ) {
        self.last_seen = self.last_seen.max(seen_at);
        self.events.push_back(event);
        while self.events.len() > history_window.max(1) {
            self.events.pop_front();
        }
        self.tags.push_back(tags);
        while self.tags.len() > tag_window + 1 {
            self.tags.pop_front();
        }
    }
}

#[derive(Debug, Clone)]
struct FoldParams {
    balance_decay: f64,
    activity_window: chrono::Duration,
    history_window: usize,
    growth_window: usize,
}

impl From<&FieldConfig> for FoldParams {
    fn from(config: &FieldConfig) -> Self {
        Self {
            balance_decay: config.balance_decay,
            activity_window: chrono::Duration::from_std(config.activity_window)
                .unwrap_or(chrono::Duration::MAX),
            history_window: config.history_window,
            growth_window: config.growth_window,
        }
    }
}

#[derive(Debug, Clone)]
struct SessionFold {
    coherence: f64,
    folds: usize,
    last_seen: DateTime<Utc>,
}

/// Running aggregates. Only ever changed by [`FoldState::apply`] and
/// [`FoldState::restore`], so the same inputs in the same order give the same
/// snapshots. Sessions are ordered so the weighted coherence sums in a fixed
/// order.
#[derive(Debug, Clone, Default)]
struct FoldState {
    balance: BTreeMap<String, f64>,
    clock: Option<DateTime<Utc>>,
    recent_coherence: VecDeque<f64>,
    sessions: BTreeMap<SessionId, SessionFold>,
}

impl FoldState {
    fn apply(
        &mut self,
        params: &FoldParams,
        session: &SessionId,
        timestamp: DateTime<Utc>,
        resonance: &BTreeMap<String, f64>,
        session_coherence: f64,
        sequence: u64,
    ) -> FieldSnapshot {
        let clock = self.advance_clock(timestamp);

        if !resonance.is_empty() {
            if self.balance.is_empty() {
                self.balance = resonance.clone();
            } else {
                let decay = params.balance_decay;
                let labels: BTreeSet<String> =
                    self.balance.keys().chain(resonance.keys()).cloned().collect();
                self.balance = labels
                    .into_iter()
                    .map(|label| {
                        let old = self.balance.get(&label).copied().unwrap_or(0.0);
                        let new = resonance.get(&label).copied().unwrap_or(0.0);
                        (label, decay * old + (1.0 - decay) * new)
                    })
                    .collect();
            }
            self.balance = normalize(&self.balance).unwrap_or_default();
        }

        self.touch_session(params, session, timestamp, session_coherence, clock);

        let previous = self.recent_coherence.back().copied().unwrap_or(0.0);
        let weighted = self.sessions.values().fold((0.0, 0.0), |(sum, total), s| {
            let w = s.folds.min(params.history_window).max(1) as f64;
            (sum + w * s.coherence, total + w)
        });
        let coherence = if weighted.1 > 0.0 {
            (weighted.0 / weighted.1).clamp(0.0, 1.0)
        } else {
            previous
        };

        let growth_rate = self.push_coherence(params, coherence);

        FieldSnapshot {
            elemental_balance: self.balance.clone(),
            coherence,
            growth_rate,
            participant_count: self.sessions.len(),
            updated_at: clock,
            sequence,
        }
    }

    fn checkpoint(&self) -> FoldCheckpoint {
        FoldCheckpoint {
            clock: self.clock.unwrap_or(DateTime::<Utc>::MIN_UTC),
            recent_coherence: self.recent_coherence.iter().copied().collect(),
            sessions: self
                .sessions
                .iter()
                .map(|(id, s)| SessionCheckpoint {
                    session_id: id.clone(),
                    coherence: s.coherence,
                    folds: s.folds,
                    last_seen: s.last_seen,
                })
                .collect(),
        }
    }

    /// Resume from a recorded fold when the folds leading up to it are gone.
    fn restore(checkpoint: &FoldCheckpoint, snapshot: &FieldSnapshot) -> Self {
        Self {
            balance: snapshot.elemental_balance.clone(),
            clock: Some(checkpoint.clock),
            recent_coherence: checkpoint.recent_coherence.iter().copied().collect(),
            sessions: checkpoint
                .sessions
                .iter()
                .map(|s| {
                    (
                        s.session_id.clone(),
                        SessionFold {
                            coherence: s.coherence,
                            folds: s.folds,
                            last_seen: s.last_seen,
                        },
                    )
                })
                .collect(),
        }
    }

    fn advance_clock(&mut self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let clock = self.clock.map_or(timestamp, |c| c.max(timestamp));
        self.clock = Some(clock);
        clock
    }

    fn touch_session(
        &mut self,
        params: &FoldParams,
        session: &SessionId,
        timestamp: DateTime<Utc>,
        session_coherence: f64,
        clock: DateTime<Utc>,
    ) {
        let entry = self
            .sessions
            .entry(session.clone())
            .or_insert_with(|| SessionFold {
                coherence: session_coherence,
                folds: 0,
                last_seen: timestamp,
            });
        entry.coherence = session_coherence;
        entry.folds += 1;
        entry.last_seen = entry.last_seen.max(timestamp);

        let cutoff = clock
            .checked_sub_signed(params.activity_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.sessions.retain(|_, s| s.last_seen >= cutoff);
    }

    /// Record the coherence of this fold and return the growth rate over
    /// the rolling window.
    fn push_coherence(&mut self, params: &FoldParams, coherence: f64) -> f64 {
        self.recent_coherence.push_back(coherence);
        while self.recent_coherence.len() > params.growth_window.max(2) {
            self.recent_coherence.pop_front();
        }
        match (self.recent_coherence.front(), self.recent_coherence.back()) {
            (Some(first), Some(last)) if self.recent_coherence.len() >= 2 => {
                (last - first) / (self.recent_coherence.len() - 1) as f64
            }
            _ => 0.0,
        }
    }
}

pub struct AggregationField {
    config: FieldConfig,
    params: FoldParams,
    decay: PatternDecay,
    clock: Arc<dyn Clock>,
    metrics: MetricEngine,
    extractor: PatternExtractor,
    store: Arc<EventStore>,
    sessions: DashMap<SessionId, SessionState>,
    patterns: RwLock<BTreeMap<String, PatternRecord>>,
    fold: Mutex<FoldState>,
    snapshot: RwLock<Arc<FieldSnapshot>>,
}

impl AggregationField {
    pub fn new(config: FieldConfig, sink: Option<Arc<dyn DurableSink>>, clock: Arc<dyn Clock>) -> Self {
        let metrics = MetricEngine::new(MetricSettings::from(&config), config.cache_capacity, clock.clone());
        let extractor =
            PatternExtractor::new(ExtractorSettings::from(&config), config.cache_capacity, clock.clone());
        Self::with_extractor(config, sink, clock, metrics, extractor)
    }

    /// Build a field around a customized extractor (own dictionary or
    /// templates).
    pub fn with_extractor(
        config: FieldConfig,
        sink: Option<Arc<dyn DurableSink>>,
        clock: Arc<dyn Clock>,
        metrics: MetricEngine,
        extractor: PatternExtractor,
    ) -> Self {
        let store = Arc::new(EventStore::new(EventStoreConfig::from(&config), sink, clock.clone()));
        let empty = FieldSnapshot::empty(clock.now());
        Self {
            params: FoldParams::from(&config),
            decay: config.pattern_decay(),
            config,
            clock,
            metrics,
            extractor,
            store,
            sessions: DashMap::new(),
            patterns: RwLock::new(BTreeMap::new()),
            fold: Mutex::new(FoldState::default()),
            snapshot: RwLock::new(Arc::new(empty)),
        }
    }

    /// Cold start: load the persisted log from `sink` and refold it.
    pub async fn recover(
        config: FieldConfig,
        sink: Arc<dyn DurableSink>,
        clock: Arc<dyn Clock>,
    ) -> FieldResult<Self> {
        let field = Self::new(config, Some(sink), clock);
        let loaded = field.store.hydrate().await?;
        let report = field.rebuild_from(field.store.replay(0))?;
        info!(
            loaded,
            folds = report.folds,
            reseeded = report.reseeded,
            sequence = field.snapshot().sequence,
            "Recovered aggregation field from durable sink"
        );
        Ok(field)
    }

    pub async fn ingest_envelope(&self, envelope: SignalEnvelope) -> FieldResult<IngestOutcome> {
        let event = SignalEvent::try_from(envelope).inspect_err(|e| {
            debug!(stage = %IngestStage::Received, error = %e, "Rejected signal envelope");
        })?;
        self.ingest(event).await
    }

    pub async fn ingest(&self, event: SignalEvent) -> FieldResult<IngestOutcome> {
        let session = event.session_id.clone();
        debug!(session = %session, stage = %IngestStage::Received, "Signal received");

        if let Err(e) = event.validate() {
            debug!(session = %session, error = %e, "Rejected signal");
            return Err(FieldError::Validation(e));
        }
        debug!(session = %session, stage = %IngestStage::Validated, "Signal validated");

        let mut degraded = Vec::new();
        let baseline = self.snapshot().elemental_balance.clone();
        let (resonance, error) = self
            .metrics
            .elemental_resonance(&event.elemental_weights, &baseline)
            .into_parts();
        degraded.extend(error);

        let mut tags = event.active_tags.clone();
        if let Some(text) = &event.text {
            tags.extend(self.extractor.extract_tags(text));
        }

        let (history, prior_tags) = self.record_session(&event, &tags);
        let (session_coherence, error) = self.metrics.session_coherence(&session, &history).into_parts();
        degraded.extend(error);

        let matches = self.extractor.match_patterns(&tags, &prior_tags);
        for error in &degraded {
            warn!(session = %session, error = %error, "Metric degraded to neutral default");
        }
        debug!(
            session = %session,
            stage = %IngestStage::Enriched,
            tags = tags.len(),
            matches = matches.len(),
            "Signal enriched"
        );

        let (sequence, snapshot) =
            self.fold_and_publish(event, tags, resonance, session_coherence, matches.clone());
        debug!(
            session = %session,
            stage = %IngestStage::Published,
            sequence,
            coherence = snapshot.coherence,
            "Snapshot published"
        );

        Ok(IngestOutcome {
            sequence,
            snapshot,
            matches,
            degraded,
        })
    }

    /// Append the signal to its session and return the session history and
    /// the tag sets that preceded this signal.
    fn record_session(
        &self,
        event: &SignalEvent,
        tags: &BTreeSet<String>,
    ) -> (Vec<SignalEvent>, Vec<BTreeSet<String>>) {
        let seen_at = self.clock.now();
        let mut state = self
            .sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| SessionState::new(seen_at));
        let prior: Vec<BTreeSet<String>> = state.tags.iter().cloned().collect();
        state.push(
            event.clone(),
            tags.clone(),
            seen_at,
            self.config.history_window,
            self.config.pattern_window,
        );
        (state.events.iter().cloned().collect(), prior)
    }

    fn fold_and_publish(
        &self,
        mut event: SignalEvent,
        tags: BTreeSet<String>,
        resonance: BTreeMap<String, f64>,
        session_coherence: f64,
        matches: Vec<PatternMatch>,
    ) -> (u64, Arc<FieldSnapshot>) {
        let mut fold = self.fold.lock();
        let previous_coherence = self.snapshot.read().coherence;

        let snapshot = fold.apply(
            &self.params,
            &event.session_id,
            event.timestamp,
            &resonance,
            session_coherence,
            0,
        );
        debug!(session = %event.session_id, stage = %IngestStage::Folded, "Signal folded");

        let delta = (snapshot.coherence - previous_coherence).abs();
        let significance =
            (self.config.significance_base + self.config.significance_gain * delta).min(1.0);
        let patterns = self.reinforce_patterns(&matches, self.clock.now());
        let checkpoint = fold.checkpoint();

        // Non-finite weights do not survive JSON and were already replaced
        // by the resonance fallback.
        event.elemental_weights.retain(|_, w| w.is_finite());
        let mut record = FoldRecord {
            signal: event,
            tags,
            resonance,
            session_coherence,
            matches,
            snapshot,
            patterns,
            checkpoint,
        };
        let sequence = self
            .store
            .append_with(StateEventKind::SignalFolded, significance, |sequence| {
                record.snapshot.sequence = sequence;
                serde_json::to_value(&record).unwrap_or_else(|e| {
                    warn!(sequence, error = %e, "Failed to encode fold record");
                    serde_json::Value::Null
                })
            });

        let snapshot = Arc::new(record.snapshot);
        *self.snapshot.write() = snapshot.clone();
        drop(fold);

        (sequence, snapshot)
    }

    fn reinforce_patterns(&self, matches: &[PatternMatch], at: DateTime<Utc>) -> Vec<PatternRecord> {
        if matches.is_empty() {
            return Vec::new();
        }
        let mut patterns = self.patterns.write();
        matches
            .iter()
            .map(|m| {
                let record = patterns
                    .entry(m.label.clone())
                    .and_modify(|r| r.reinforce(m.confidence, at, &self.decay))
                    .or_insert_with(|| {
                        info!(pattern = %m.label, confidence = m.confidence, "New pattern tracked");
                        PatternRecord::new(m.label.clone(), m.confidence, at)
                    });
                self.extractor.set_support(&record.label, record.support_count);
                record.clone()
            })
            .collect()
    }

    /// Replace all derived state with the result of folding `replay`.
    ///
    /// On error nothing is replaced.
    pub fn rebuild_from<I>(&self, replay: I) -> FieldResult<RebuildReport>
    where
        I: IntoIterator<Item = StateEvent>,
    {
        let mut fold = self.fold.lock();
        let mut state = FoldState::default();
        let mut patterns: BTreeMap<String, PatternRecord> = BTreeMap::new();
        let mut sessions: HashMap<SessionId, SessionState> = HashMap::new();
        // Set by a hole in the sequence, cleared by the next fold record.
        let mut resume = false;
        let mut last_snapshot = None;
        let mut report = RebuildReport::default();
        let mut previous_sequence = 0;

        for event in replay {
            report.records += 1;
            resume |= event.sequence != previous_sequence + 1;
            previous_sequence = event.sequence;

            match event.kind {
                StateEventKind::SignalFolded => {
                    let record: FoldRecord = decode(&event)?;
                    let signal = &record.signal;
                    let snapshot = if !resume {
                        state.apply(
                            &self.params,
                            &signal.session_id,
                            signal.timestamp,
                            &record.resonance,
                            record.session_coherence,
                            event.sequence,
                        )
                    } else {
                        report.reseeded += 1;
                        debug!(sequence = event.sequence, "Resuming fold from recorded checkpoint");
                        state = FoldState::restore(&record.checkpoint, &record.snapshot);
                        resume = false;
                        record.snapshot.clone()
                    };
                    if snapshot != record.snapshot {
                        debug!(sequence = event.sequence, "Refolded snapshot differs from recorded one");
                    }

                    for pattern in &record.patterns {
                        patterns.insert(pattern.label.clone(), pattern.clone());
                    }
                    sessions
                        .entry(signal.session_id.clone())
                        .or_insert_with(|| SessionState::new(event.timestamp))
                        .push(
                            signal.clone(),
                            record.tags.clone(),
                            event.timestamp,
                            self.config.history_window,
                            self.config.pattern_window,
                        );

                    report.folds += 1;
                    last_snapshot = Some(snapshot);
                }
                StateEventKind::PatternsPruned => {
                    let pruned: PatternsPrunedRecord = decode(&event)?;
                    for label in &pruned.labels {
                        patterns.remove(label);
                    }
                }
            }
        }

        *fold = state;
        self.extractor.clear_support();
        for record in patterns.values() {
            self.extractor.set_support(&record.label, record.support_count);
        }
        *self.patterns.write() = patterns;
        self.sessions.clear();
        for (id, session) in sessions {
            self.sessions.insert(id, session);
        }
        if let Some(snapshot) = last_snapshot {
            *self.snapshot.write() = Arc::new(snapshot);
        }
        drop(fold);

        debug!(records = report.records, folds = report.folds, "Rebuilt field from replay");
        Ok(report)
    }

    /// The live snapshot.
    pub fn snapshot(&self) -> Arc<FieldSnapshot> {
        self.snapshot.read().clone()
    }

    /// Tracked patterns above the strength floor, strongest first.
    pub fn patterns(&self, filter: &PatternFilter) -> Vec<TrackedPattern> {
        let now = self.clock.now();
        let mut tracked: Vec<TrackedPattern> = self
            .patterns
            .read()
            .values()
            .filter_map(|record| {
                let current_strength = record.strength_at(now, &self.decay);
                (current_strength > self.decay.floor && filter.matches(record, current_strength)).then(
                    || TrackedPattern {
                        record: record.clone(),
                        current_strength,
                    },
                )
            })
            .collect();
        tracked.sort_by(|a, b| {
            b.current_strength
                .total_cmp(&a.current_strength)
                .then_with(|| a.record.label.cmp(&b.record.label))
        });
        tracked
    }

    /// Phase readiness of a tracked session; `None` for unknown sessions.
    pub fn session_readiness(&self, session: &SessionId) -> Option<Derived<Readiness>> {
        let history: Vec<SignalEvent> = self.sessions.get(session)?.events.iter().cloned().collect();
        Some(
            self.metrics
                .phase_readiness(session, &history, &self.config.readiness),
        )
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// One maintenance pass: cache sweeps, pattern expiry, idle-session
    /// eviction and event log retention.
    pub fn maintain(&self) -> MaintenanceReport {
        let now = self.clock.now();
        let mut report = MaintenanceReport {
            cache_entries_expired: self.metrics.sweep_expired() + self.extractor.sweep_expired(),
            ..MaintenanceReport::default()
        };

        {
            let _fold = self.fold.lock();
            let mut patterns = self.patterns.write();
            let expired: Vec<String> = patterns
                .values()
                .filter(|record| record.is_expired(now, &self.decay))
                .map(|record| record.label.clone())
                .collect();
            for label in &expired {
                patterns.remove(label);
                self.extractor.forget_support(label);
            }
            drop(patterns);

            if !expired.is_empty() {
                let record = PatternsPrunedRecord {
                    labels: expired.clone(),
                    pruned_at: now,
                };
                match serde_json::to_value(&record) {
                    Ok(payload) => {
                        // Kept through retention so a rebuild cannot revive
                        // the patterns from older fold records.
                        self.store.append(
                            StateEventKind::PatternsPruned,
                            payload,
                            self.config.always_keep_significance,
                        );
                    }
                    Err(e) => warn!(error = %e, "Failed to encode pruned patterns record"),
                }
                info!(count = expired.len(), "Pruned decayed patterns");
            }
            report.patterns_pruned = expired;
        }

        let cutoff = now
            .checked_sub_signed(self.params.activity_window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut idle = Vec::new();
        self.sessions.retain(|id, state| {
            let keep = state.last_seen >= cutoff;
            if !keep {
                idle.push(id.clone());
            }
            keep
        });
        for session in &idle {
            self.metrics.invalidate_session(session);
        }
        report.sessions_evicted = idle.len();

        let PruneReport { removed, .. } = self.store.prune(now);
        report.events_pruned = removed;

        debug!(
            expired = report.cache_entries_expired,
            patterns = report.patterns_pruned.len(),
            sessions = report.sessions_evicted,
            events = report.events_pruned,
            "Maintenance pass finished"
        );
        report
    }

    pub fn subscribe<H>(&self, filter: EventFilter, handler: H) -> SubscriptionId
    where
        H: EventHandler + 'static,
    {
        self.store.subscribe(filter, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub fn replay(&self, from_sequence: u64) -> Replay {
        self.store.replay(from_sequence)
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn health(&self) -> FieldHealth {
        FieldHealth {
            store: self.store.health(),
            metric_cache: self.metrics.cache_stats(),
            tag_cache: self.extractor.cache_stats(),
            sessions: self.sessions.len(),
            patterns: self.patterns.read().len(),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(event: &StateEvent) -> FieldResult<T> {
    serde_json::from_value(event.payload.clone()).map_err(|e| FieldError::CorruptRecord {
        sequence: event.sequence,
        reason: e.to_string(),
    })
}
