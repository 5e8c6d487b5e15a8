// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Signal Field Core
//!
//! Ingests per-session signal events, derives cached metrics and symbolic
//! patterns from them and folds everything into one shared field snapshot.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, aggregation services and storage primitives

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
