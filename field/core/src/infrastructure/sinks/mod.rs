// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Durable sink implementations

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlFileSink;
pub use memory::InMemorySink;
