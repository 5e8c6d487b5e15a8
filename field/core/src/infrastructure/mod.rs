// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure
//!
//! Storage-side building blocks of the field: the bounded cache, the event
//! store with its subscriber fan-out and sink backlog, and sink adapters.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Concrete storage and delivery mechanics behind the application services

pub mod cache;
pub mod event_store;
pub mod sinks;

pub use cache::{BoundedCache, CacheStatsSnapshot};
pub use event_store::{
    EventHandler, EventStore, EventStoreConfig, FnHandler, PruneReport, Replay, StoreHealth,
    SubscriptionId,
};
pub use sinks::{InMemorySink, JsonlFileSink};
