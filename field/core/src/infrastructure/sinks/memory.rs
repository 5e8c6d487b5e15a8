// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! In-memory durable sink
//!
//! Keeps records in a sorted map. Availability can be toggled so callers can
//! exercise the store's degraded mode without a real backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::events::StateEvent;
use crate::domain::repository::DurableSink;

#[derive(Debug)]
pub struct InMemorySink {
    records: RwLock<BTreeMap<u64, StateEvent>>,
    available: AtomicBool,
    failed_puts: AtomicU64,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            failed_puts: AtomicU64::new(0),
        }
    }

    /// A sink that rejects every call until [`set_available`](Self::set_available).
    pub fn unavailable() -> Self {
        let sink = Self::new();
        sink.set_available(false);
        sink
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failed_puts(&self) -> u64 {
        self.failed_puts.load(Ordering::Relaxed)
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableSink for InMemorySink {
    async fn put(&self, sequence: u64, record: &StateEvent) -> Result<()> {
        if !self.available.load(Ordering::Acquire) {
            self.failed_puts.fetch_add(1, Ordering::Relaxed);
            bail!("in-memory sink is unavailable");
        }
        self.records.write().insert(sequence, record.clone());
        Ok(())
    }

    async fn query(&self, from_sequence: u64) -> Result<Vec<StateEvent>> {
        if !self.available.load(Ordering::Acquire) {
            bail!("in-memory sink is unavailable");
        }
        Ok(self
            .records
            .read()
            .range(from_sequence..)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::StateEventKind;
    use chrono::Utc;
    use serde_json::json;

    fn record(sequence: u64) -> StateEvent {
        StateEvent {
            sequence,
            kind: StateEventKind::SignalFolded,
            payload: json!({ "n": sequence }),
            significance: 0.5,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_is_idempotent_and_query_is_ordered() {
        let sink = InMemorySink::new();
        sink.put(2, &record(2)).await.unwrap();
        sink.put(1, &record(1)).await.unwrap();
        sink.put(2, &record(2)).await.unwrap();

        let all: Vec<u64> = sink.query(0).await.unwrap().iter().map(|r| r.sequence).collect();
        assert_eq!(all, vec![1, 2]);
        assert_eq!(sink.query(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_sink_rejects_puts() {
        let sink = InMemorySink::unavailable();
        assert!(sink.put(1, &record(1)).await.is_err());
        assert_eq!(sink.failed_puts(), 1);
        assert!(sink.is_empty());
    }
}
