// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy for the signal field
//!
//! A cache miss is not an error and never appears here: lookups return
//! `Option::None` and the caller recomputes.
//!
//! - [`ValidationError`] rejects a signal before any state is touched.
//! - [`ComputationError`] is absorbed: the metric falls back to a neutral
//!   default and the error travels alongside the value.
//! - [`StoreError`] describes durable-sink trouble. It only ever raises the
//!   degraded flag; ingestion keeps going.

use thiserror::Error;

/// A signal that can not be accepted into the field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("`{field}` must lie within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// A derived metric or pattern match that could not be computed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputationError {
    #[error("{metric}: empty input")]
    EmptyInput { metric: &'static str },

    #[error("{metric}: non-finite or negative value for `{label}`")]
    MalformedValue { metric: &'static str, label: String },

    #[error("{metric}: could not encode cache key: {reason}")]
    KeyEncoding { metric: &'static str, reason: String },
}

/// Durable sink failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("durable sink unavailable: {0}")]
    Unavailable(String),

    #[error("backlog overflow: dropped sequences {first}..={last} ({count} events)")]
    Overflow { first: u64, last: u64, count: u64 },
}

/// Errors surfaced synchronously by the ingest and recovery boundaries.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed event log record at sequence {sequence}: {reason}")]
    CorruptRecord { sequence: u64, reason: String },
}

pub type FieldResult<T> = Result<T, FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts_into_field_error() {
        let err: FieldError = ValidationError::OutOfRange {
            field: "quality_score",
            value: 1.5,
        }
        .into();

        assert!(matches!(err, FieldError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "validation failed: `quality_score` must lie within [0, 1], got 1.5"
        );
    }

    #[test]
    fn test_overflow_message_carries_range() {
        let err = StoreError::Overflow { first: 1, last: 1000, count: 1000 };
        assert!(err.to_string().contains("1..=1000"));
    }
}
