// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Event log records
//!
//! Every state change of the field is recorded as a [`StateEvent`]. The log
//! is the source for subscriber fan-out and for rebuilding the field after a
//! restart, so fold records carry everything a refold needs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::{PatternMatch, PatternRecord};
use super::signal::{SessionId, SignalEvent};
use super::snapshot::FieldSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateEventKind {
    /// A signal was folded into the field snapshot.
    SignalFolded,
    /// Decayed patterns were dropped by the maintenance pass.
    PatternsPruned,
}

impl StateEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateEventKind::SignalFolded => "signal_folded",
            StateEventKind::PatternsPruned => "patterns_pruned",
        }
    }
}

impl fmt::Display for StateEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only record in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    pub sequence: u64,
    pub kind: StateEventKind,
    pub payload: serde_json::Value,
    pub significance: f64,
    pub timestamp: DateTime<Utc>,
}

/// Payload of a [`StateEventKind::SignalFolded`] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldRecord {
    pub signal: SignalEvent,
    pub tags: BTreeSet<String>,
    pub resonance: BTreeMap<String, f64>,
    pub session_coherence: f64,
    pub matches: Vec<PatternMatch>,
    /// Snapshot published by this fold.
    pub snapshot: FieldSnapshot,
    /// Patterns created or reinforced by this fold.
    pub patterns: Vec<PatternRecord>,
    /// Fold aggregates after this fold.
    pub checkpoint: FoldCheckpoint,
}

/// Running fold aggregates at the end of one fold.
///
/// A replay that starts after a hole in the log resumes from the checkpoint
/// of the first record it still has; the elemental balance comes from that
/// record's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldCheckpoint {
    pub clock: DateTime<Utc>,
    /// Field coherence of the last folds, oldest first.
    pub recent_coherence: Vec<f64>,
    /// Sessions inside the activity window, ordered by id.
    pub sessions: Vec<SessionCheckpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub session_id: SessionId,
    pub coherence: f64,
    pub folds: usize,
    pub last_seen: DateTime<Utc>,
}

/// Payload of a [`StateEventKind::PatternsPruned`] record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternsPrunedRecord {
    pub labels: Vec<String>,
    pub pruned_at: DateTime<Utc>,
}

type Predicate = Arc<dyn Fn(&StateEvent) -> bool + Send + Sync>;

/// Selects which log records a subscriber receives.
#[derive(Clone, Default)]
pub struct EventFilter {
    kinds: Option<BTreeSet<StateEventKind>>,
    min_significance: f64,
    predicate: Option<Predicate>,
}

impl EventFilter {
    /// Every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds(kinds: impl IntoIterator<Item = StateEventKind>) -> Self {
        Self {
            kinds: Some(kinds.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_min_significance(mut self, min: f64) -> Self {
        self.min_significance = min;
        self
    }

    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateEvent) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn matches(&self, event: &StateEvent) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if event.significance < self.min_significance {
            return false;
        }
        self.predicate.as_ref().map_or(true, |p| p(event))
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFilter")
            .field("kinds", &self.kinds)
            .field("min_significance", &self.min_significance)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: StateEventKind, significance: f64) -> StateEvent {
        StateEvent {
            sequence: 1,
            kind,
            payload: serde_json::Value::Null,
            significance,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&StateEventKind::SignalFolded).unwrap();
        assert_eq!(json, "\"signal_folded\"");
        assert_eq!(StateEventKind::PatternsPruned.to_string(), "patterns_pruned");
    }

    #[test]
    fn test_filter_by_kind_and_significance() {
        let filter = EventFilter::kinds([StateEventKind::SignalFolded]).with_min_significance(0.5);

        assert!(filter.matches(&record(StateEventKind::SignalFolded, 0.7)));
        assert!(!filter.matches(&record(StateEventKind::SignalFolded, 0.2)));
        assert!(!filter.matches(&record(StateEventKind::PatternsPruned, 0.9)));
    }

    #[test]
    fn test_filter_predicate() {
        let filter = EventFilter::all().with_predicate(|e| e.sequence % 2 == 0);
        let mut event = record(StateEventKind::SignalFolded, 0.1);
        assert!(!filter.matches(&event));
        event.sequence = 2;
        assert!(filter.matches(&event));
    }
}
