// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The shared aggregate over all recent signals.
///
/// Snapshots are immutable values. The field publishes a fresh one after
/// every fold, so a reader holds either the previous or the next snapshot and
/// never a partially written one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    /// Label to normalized weight. Sums to one, or is empty before the first
    /// weighted signal.
    pub elemental_balance: BTreeMap<String, f64>,
    pub coherence: f64,
    pub growth_rate: f64,
    pub participant_count: usize,
    pub updated_at: DateTime<Utc>,
    /// Event log sequence of the fold that produced this snapshot; 0 before
    /// any fold.
    pub sequence: u64,
}

impl FieldSnapshot {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            elemental_balance: BTreeMap::new(),
            coherence: 0.0,
            growth_rate: 0.0,
            participant_count: 0,
            updated_at: at,
            sequence: 0,
        }
    }

    /// Label with the largest share, ties resolved by label order.
    pub fn dominant_element(&self) -> Option<(&str, f64)> {
        self.elemental_balance
            .iter()
            .fold(None, |best: Option<(&str, f64)>, (label, weight)| match best {
                Some((_, w)) if w >= *weight => best,
                _ => Some((label.as_str(), *weight)),
            })
    }

    pub fn weight_of(&self, label: &str) -> f64 {
        self.elemental_balance.get(label).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_element() {
        let mut snapshot = FieldSnapshot::empty(Utc::now());
        assert!(snapshot.dominant_element().is_none());

        snapshot.elemental_balance.insert("air".into(), 0.25);
        snapshot.elemental_balance.insert("fire".into(), 0.5);
        snapshot.elemental_balance.insert("water".into(), 0.25);

        assert_eq!(snapshot.dominant_element(), Some(("fire", 0.5)));
        assert_eq!(snapshot.weight_of("earth"), 0.0);
    }
}
