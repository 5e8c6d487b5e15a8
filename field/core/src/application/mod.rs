// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Metric computation, pattern extraction, the aggregation field pipeline
//! and its background maintenance.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates domain types and infrastructure into the ingest and query services

pub mod aggregation_field;
pub mod field_maintenance;
pub mod metric_engine;
pub mod pattern_extractor;

pub use aggregation_field::{
    AggregationField, FieldHealth, IngestOutcome, MaintenanceReport, RebuildReport, TrackedPattern,
};
pub use field_maintenance::{FieldMaintenance, FieldTasks};
pub use metric_engine::{Derived, MetricEngine, MetricSettings, Readiness, NEUTRAL_COHERENCE};
pub use pattern_extractor::{ExtractorSettings, PatternExtractor, PatternTemplate};
