// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Durable sink boundary
//!
//! The long-term store is an external collaborator. The event store only
//! needs to put records by sequence and read them back from a starting
//! sequence on cold start.

use async_trait::async_trait;
use anyhow::Result;

use super::events::StateEvent;

#[async_trait]
pub trait DurableSink: Send + Sync {
    /// Persist one record. Re-putting an already stored sequence must be
    /// harmless, since the store retries after failures.
    async fn put(&self, sequence: u64, record: &StateEvent) -> Result<()>;

    /// All stored records with `sequence >= from_sequence`, ordered by
    /// sequence.
    async fn query(&self, from_sequence: u64) -> Result<Vec<StateEvent>>;
}
