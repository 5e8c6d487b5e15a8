// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Field Maintenance - background task for cache sweeps, pattern decay and
//! event log retention
//!
//! Runs [`AggregationField::maintain`] on a fixed interval until its
//! cancellation token fires. [`FieldTasks`] bundles it with the event store
//! flusher so a host can start and stop both together.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Periodic upkeep of the aggregation field

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregation_field::AggregationField;

pub struct FieldMaintenance {
    field: Arc<AggregationField>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl FieldMaintenance {
    pub fn new(field: Arc<AggregationField>) -> Self {
        let interval = field.config().maintenance_interval;
        Self::with_interval(field, interval)
    }

    pub fn with_interval(field: Arc<AggregationField>, interval: Duration) -> Self {
        Self {
            field,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Stop when `token` is cancelled instead of an internal token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if self.interval.is_zero() {
            warn!("Field maintenance interval is zero, not starting");
            return;
        }

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting field maintenance background task"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running field maintenance pass");
                    let report = self.field.maintain();
                    if !report.patterns_pruned.is_empty() || report.events_pruned > 0 {
                        info!(
                            patterns = report.patterns_pruned.len(),
                            events = report.events_pruned,
                            sessions = report.sessions_evicted,
                            "Field maintenance pass completed"
                        );
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping field maintenance");
                    break;
                }
            }
        }

        info!("Field maintenance background task stopped");
    }
}

/// Handles to the field's background tasks.
pub struct FieldTasks {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl FieldTasks {
    /// Start maintenance and, when the field has a durable sink, the
    /// backlog flusher.
    pub fn start(field: &Arc<AggregationField>) -> Self {
        let shutdown = CancellationToken::new();
        let mut handles = Vec::with_capacity(2);

        if let Some(flusher) = field.store().spawn_flusher(shutdown.child_token()) {
            handles.push(flusher);
        }
        let maintenance =
            Arc::new(FieldMaintenance::new(field.clone()).with_shutdown_token(shutdown.child_token()));
        handles.push(maintenance.start());

        Self { shutdown, handles }
    }

    /// Cancel every task and wait for it to finish. The flusher makes one
    /// last attempt to drain the backlog before exiting.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::{Clock, ManualClock};
    use crate::domain::config::FieldConfig;
    use crate::domain::pattern::PatternFilter;
    use crate::domain::signal::{SessionId, SignalEvent};
    use crate::infrastructure::sinks::InMemorySink;

    #[tokio::test]
    async fn test_maintenance_runs_and_stops() {
        let clock = Arc::new(ManualClock::default());
        let field = Arc::new(AggregationField::new(FieldConfig::default(), None, clock.clone()));
        field
            .ingest(
                SignalEvent::new(SessionId::new("s1"), clock.now())
                    .with_weight("fire", 1.0)
                    .with_text("phoenix fire"),
            )
            .await
            .unwrap();
        assert_eq!(field.patterns(&PatternFilter::all()).len(), 1);

        clock.advance(chrono::Duration::days(2));
        let maintenance = Arc::new(FieldMaintenance::with_interval(field.clone(), Duration::from_millis(10)));
        let token = maintenance.shutdown_token();
        let handle = maintenance.start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(field.health().patterns, 0);
        assert_eq!(field.session_count(), 0);
    }

    #[tokio::test]
    async fn test_field_tasks_flush_on_shutdown() {
        let sink = Arc::new(InMemorySink::new());
        let clock = Arc::new(ManualClock::default());
        let field = Arc::new(AggregationField::new(
            FieldConfig::default(),
            Some(sink.clone()),
            clock.clone(),
        ));
        let tasks = FieldTasks::start(&field);

        for _ in 0..3 {
            field
                .ingest(SignalEvent::new(SessionId::new("s1"), clock.now()).with_weight("air", 1.0))
                .await
                .unwrap();
        }
        tasks.shutdown().await;

        assert_eq!(sink.len(), 3);
        assert_eq!(field.health().store.backlog_len, 0);
    }
}
