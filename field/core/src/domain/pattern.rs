// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Tracked symbolic patterns
//!
//! A [`PatternRecord`] stores its strength as of `last_observed`. The current
//! strength is derived on demand: it halves every `half_life` without support
//! and never drops below `floor`. Once a record has sat at the floor for
//! longer than `retention` it is removed by the maintenance pass.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternId(pub Uuid);

impl PatternId {
    /// Ids are derived from the label so a rebuilt field hands out the same
    /// ids as the live one.
    pub fn for_label(label: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, label.as_bytes()))
    }
}

/// Decay parameters applied to every tracked pattern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternDecay {
    pub half_life: Duration,
    pub floor: f64,
    pub retention: Duration,
}

impl Default for PatternDecay {
    fn default() -> Self {
        Self {
            half_life: Duration::from_secs(3600),
            floor: 0.05,
            retention: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    pub id: PatternId,
    pub label: String,
    /// Strength as of `last_observed`.
    pub strength: f64,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    pub support_count: u64,
}

impl PatternRecord {
    pub fn new(label: impl Into<String>, confidence: f64, at: DateTime<Utc>) -> Self {
        let label = label.into();
        Self {
            id: PatternId::for_label(&label),
            label,
            strength: confidence.clamp(0.0, 1.0),
            first_observed: at,
            last_observed: at,
            support_count: 1,
        }
    }

    pub fn strength_at(&self, now: DateTime<Utc>, decay: &PatternDecay) -> f64 {
        let elapsed = seconds_between(self.last_observed, now);
        let half_life = decay.half_life.as_secs_f64();
        let decayed = if half_life > 0.0 {
            self.strength * 0.5f64.powf(elapsed / half_life)
        } else if elapsed > 0.0 {
            0.0
        } else {
            self.strength
        };
        decayed.max(decay.floor)
    }

    /// Fold a supporting match into the record.
    pub fn reinforce(&mut self, confidence: f64, at: DateTime<Utc>, decay: &PatternDecay) {
        let current = self.strength_at(at, decay);
        let confidence = confidence.clamp(0.0, 1.0);
        self.strength = (current + (1.0 - current) * confidence).min(1.0);
        if at > self.last_observed {
            self.last_observed = at;
        }
        self.support_count += 1;
    }

    /// Instant at which the decayed strength first touches the floor.
    pub fn floor_reached_at(&self, decay: &PatternDecay) -> DateTime<Utc> {
        if self.strength <= decay.floor || decay.floor <= 0.0 {
            return self.last_observed;
        }
        let halvings = (self.strength / decay.floor).log2();
        let secs = decay.half_life.as_secs_f64() * halvings;
        self.last_observed + chrono::Duration::milliseconds((secs * 1000.0).round() as i64)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, decay: &PatternDecay) -> bool {
        let retention = chrono::Duration::milliseconds(decay.retention.as_millis() as i64);
        now > self.floor_reached_at(decay) + retention
    }

    pub fn is_live(&self, now: DateTime<Utc>, decay: &PatternDecay) -> bool {
        self.strength_at(now, decay) > decay.floor
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

/// A template that matched the current tag window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub label: String,
    pub confidence: f64,
}

/// Query over tracked patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternFilter {
    pub label_prefix: Option<String>,
    pub min_strength: Option<f64>,
    pub min_support: Option<u64>,
}

impl PatternFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = Some(prefix.into());
        self
    }

    pub fn with_min_strength(mut self, strength: f64) -> Self {
        self.min_strength = Some(strength);
        self
    }

    pub fn with_min_support(mut self, support: u64) -> Self {
        self.min_support = Some(support);
        self
    }

    pub fn matches(&self, record: &PatternRecord, current_strength: f64) -> bool {
        if let Some(prefix) = &self.label_prefix {
            if !record.label.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(min) = self.min_strength {
            if current_strength < min {
                return false;
            }
        }
        if let Some(min) = self.min_support {
            if record.support_count < min {
                return false;
            }
        }
        true
    }
}
