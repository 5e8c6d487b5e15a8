// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Signal, snapshot, pattern and event-log types shared by every layer.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Value types, error taxonomy, configuration and the durable sink contract

pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod pattern;
pub mod repository;
pub mod signal;
pub mod snapshot;

pub use clock::*;
pub use config::*;
pub use errors::*;
pub use events::*;
pub use pattern::*;
pub use repository::*;
pub use signal::*;
pub use snapshot::*;
