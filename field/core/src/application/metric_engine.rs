// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Metric Engine - derived numeric metrics over signal events
//!
//! Computes elemental resonance, per-session coherence and phase readiness.
//! Successful results are memoized in a [`BoundedCache`] under
//! `"{function}:{session}:{sha256 of inputs}"`; the session segment is empty
//! for session-independent metrics. Malformed input never aborts: the metric
//! returns its neutral default together with a [`ComputationError`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Pure metric computation with memoization

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::clock::Clock;
use crate::domain::config::{FieldConfig, MetricTtlConfig, ReadinessConfig};
use crate::domain::errors::ComputationError;
use crate::domain::signal::{SessionId, SignalEvent};
use crate::infrastructure::cache::{BoundedCache, CacheStatsSnapshot};

/// Neutral coherence returned for sessions without usable history.
pub const NEUTRAL_COHERENCE: f64 = 0.5;

const CONSISTENCY_SHARE: f64 = 0.75;

/// A metric value, possibly a fallback produced after a computation error.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived<T> {
    pub value: T,
    pub error: Option<ComputationError>,
}

impl<T> Derived<T> {
    pub fn ok(value: T) -> Self {
        Self { value, error: None }
    }

    pub fn degraded(value: T, error: ComputationError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_parts(self) -> (T, Option<ComputationError>) {
        (self.value, self.error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub score: f64,
    pub ready: bool,
}

impl Readiness {
    pub const NOT_READY: Readiness = Readiness {
        score: 0.0,
        ready: false,
    };
}

#[derive(Debug, Clone, PartialEq)]
enum MetricValue {
    Weights(BTreeMap<String, f64>),
    Scalar(f64),
    Readiness(Readiness),
}

/// Tunables for the metric computations.
#[derive(Debug, Clone)]
pub struct MetricSettings {
    pub ttl: MetricTtlConfig,
    /// How strongly resonance amplifies deviation from the baseline.
    pub resonance_contrast: f64,
    /// Per-step recency decay applied to session history.
    pub coherence_decay: f64,
}

impl From<&FieldConfig> for MetricSettings {
    fn from(config: &FieldConfig) -> Self {
        Self {
            ttl: config.cache_ttl.metric.clone(),
            resonance_contrast: config.resonance_contrast,
            coherence_decay: config.coherence_decay,
        }
    }
}

impl Default for MetricSettings {
    fn default() -> Self {
        Self::from(&FieldConfig::default())
    }
}

pub struct MetricEngine {
    settings: MetricSettings,
    cache: BoundedCache<MetricValue>,
}

impl MetricEngine {
    pub fn new(settings: MetricSettings, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            cache: BoundedCache::with_clock("metrics", capacity, clock),
        }
    }

    /// Normalize an event's weights against the field's historical balance.
    ///
    /// Labels the event leans into harder than the baseline are amplified,
    /// labels it leans into less are damped. The result sums to one.
    pub fn elemental_resonance(
        &self,
        weights: &BTreeMap<String, f64>,
        baseline: &BTreeMap<String, f64>,
    ) -> Derived<BTreeMap<String, f64>> {
        const METRIC: &str = "resonance";

        let proportions = match normalize_checked(METRIC, weights) {
            Ok(p) => p,
            Err(error) => {
                let labels = if weights.is_empty() {
                    baseline.keys()
                } else {
                    weights.keys()
                };
                return Derived::degraded(uniform(labels), error);
            }
        };

        let key = match cache_key(METRIC, None, &(weights, baseline)) {
            Ok(key) => key,
            Err(error) => {
                return Derived::degraded(self.compute_resonance(&proportions, baseline), error)
            }
        };
        if let Some(MetricValue::Weights(cached)) = self.cache.get(&key) {
            return Derived::ok(cached);
        }

        let value = self.compute_resonance(&proportions, baseline);
        self.cache
            .set(key, MetricValue::Weights(value.clone()), self.settings.ttl.resonance);
        Derived::ok(value)
    }

    fn compute_resonance(
        &self,
        proportions: &BTreeMap<String, f64>,
        baseline: &BTreeMap<String, f64>,
    ) -> BTreeMap<String, f64> {
        if baseline.is_empty() {
            return proportions.clone();
        }
        let contrast = self.settings.resonance_contrast;
        let scaled: BTreeMap<String, f64> = proportions
            .iter()
            .map(|(label, p)| {
                let b = baseline.get(label).copied().unwrap_or(0.0);
                (label.clone(), (p * (1.0 + contrast * (p - b))).max(0.0))
            })
            .collect();
        normalize(&scaled).unwrap_or_else(|| proportions.clone())
    }

    /// Recency-weighted consistency of one session's recent events, in [0, 1].
    ///
    /// Consecutive events are compared by the distance between their weight
    /// distributions and their affect. Newer steps and more confident events
    /// count more. Event quality contributes a smaller share.
    pub fn session_coherence(&self, session: &SessionId, history: &[SignalEvent]) -> Derived<f64> {
        const METRIC: &str = "coherence";

        if history.is_empty() {
            return Derived::degraded(NEUTRAL_COHERENCE, ComputationError::EmptyInput { metric: METRIC });
        }

        let key = match cache_key(METRIC, Some(session), &history) {
            Ok(key) => key,
            Err(error) => return Derived::degraded(self.compute_coherence(history), error),
        };
        if let Some(MetricValue::Scalar(cached)) = self.cache.get(&key) {
            return Derived::ok(cached);
        }

        let value = self.compute_coherence(history);
        self.cache
            .set(key, MetricValue::Scalar(value), self.settings.ttl.coherence);
        Derived::ok(value)
    }

    fn compute_coherence(&self, history: &[SignalEvent]) -> f64 {
        let n = history.len();
        let decay = self.settings.coherence_decay;
        let weight = |i: usize| decay.powi((n - 1 - i) as i32) * history[i].confidence;

        let consistency = if n < 2 {
            NEUTRAL_COHERENCE
        } else {
            let steps = (1..n).map(|i| (weight(i), step_consistency(&history[i - 1], &history[i])));
            weighted_mean(steps).unwrap_or(NEUTRAL_COHERENCE)
        };
        let quality = weighted_mean((0..n).map(|i| (weight(i), history[i].quality_score)))
            .unwrap_or_else(|| history.iter().map(|e| e.quality_score).sum::<f64>() / n as f64);

        (CONSISTENCY_SHARE * consistency + (1.0 - CONSISTENCY_SHARE) * quality).clamp(0.0, 1.0)
    }

    /// Whether a session is ready to move to its next phase.
    ///
    /// The score is coherence scaled by engagement (elapsed time over
    /// `min_engagement`, saturating at one), so it never falls when either
    /// input rises.
    pub fn phase_readiness(
        &self,
        session: &SessionId,
        history: &[SignalEvent],
        thresholds: &ReadinessConfig,
    ) -> Derived<Readiness> {
        const METRIC: &str = "readiness";

        if history.is_empty() {
            return Derived::degraded(Readiness::NOT_READY, ComputationError::EmptyInput { metric: METRIC });
        }

        let key = cache_key(METRIC, Some(session), &(history, thresholds));
        if let Ok(key) = &key {
            if let Some(MetricValue::Readiness(cached)) = self.cache.get(key) {
                return Derived::ok(cached);
            }
        }

        let (coherence, coherence_error) = self.session_coherence(session, history).into_parts();
        let first = history.iter().map(|e| e.timestamp).min();
        let last = history.iter().map(|e| e.timestamp).max();
        let elapsed = match (first, last) {
            (Some(first), Some(last)) => (last - first).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        };
        let engagement = if thresholds.min_engagement.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / thresholds.min_engagement.as_secs_f64()).min(1.0)
        };

        let score = (coherence * engagement).clamp(0.0, 1.0);
        let readiness = Readiness {
            score,
            ready: history.len() >= thresholds.min_events && score >= thresholds.threshold,
        };

        match (key, coherence_error) {
            (Ok(key), None) => {
                self.cache
                    .set(key, MetricValue::Readiness(readiness), self.settings.ttl.readiness);
                Derived::ok(readiness)
            }
            (_, Some(error)) | (Err(error), None) => Derived::degraded(readiness, error),
        }
    }

    /// Drop every cached metric belonging to `session`.
    pub fn invalidate_session(&self, session: &SessionId) -> usize {
        let segment = session_segment(session);
        let coherence = self.cache.invalidate(&format!("coherence:{segment}:"));
        let readiness = self.cache.invalidate(&format!("readiness:{segment}:"));
        if coherence + readiness > 0 {
            debug!(session = %session, removed = coherence + readiness, "Invalidated session metrics");
        }
        coherence + readiness
    }

    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }
}

/// `"{function}:{session}:{sha256 hex}"` over the JSON encoding of `inputs`.
///
/// The session segment is hex encoded so it never contains the `:`
/// separator and a session prefix cannot reach into another session.
pub(crate) fn cache_key<T: Serialize + ?Sized>(
    function: &'static str,
    session: Option<&SessionId>,
    inputs: &T,
) -> Result<String, ComputationError> {
    let encoded = serde_json::to_vec(inputs).map_err(|e| ComputationError::KeyEncoding {
        metric: function,
        reason: e.to_string(),
    })?;
    let digest = hex::encode(Sha256::digest(&encoded));
    let session = session.map(session_segment).unwrap_or_default();
    Ok(format!("{function}:{session}:{digest}"))
}

fn session_segment(session: &SessionId) -> String {
    hex::encode(session.as_str())
}

fn normalize_checked(
    metric: &'static str,
    weights: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, f64>, ComputationError> {
    if let Some((label, _)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(ComputationError::MalformedValue {
            metric,
            label: label.clone(),
        });
    }
    normalize(weights).ok_or(ComputationError::EmptyInput { metric })
}

/// Scale to a unit sum, skipping unusable values. `None` when nothing is left.
pub(crate) fn normalize(weights: &BTreeMap<String, f64>) -> Option<BTreeMap<String, f64>> {
    let total: f64 = weights.values().filter(|w| w.is_finite() && **w > 0.0).sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    Some(
        weights
            .iter()
            .map(|(label, w)| {
                let w = if w.is_finite() && *w > 0.0 { *w } else { 0.0 };
                (label.clone(), w / total)
            })
            .collect(),
    )
}

fn uniform<'a>(labels: impl Iterator<Item = &'a String>) -> BTreeMap<String, f64> {
    let labels: BTreeSet<&String> = labels.collect();
    if labels.is_empty() {
        return BTreeMap::new();
    }
    let share = 1.0 / labels.len() as f64;
    labels.into_iter().map(|l| (l.clone(), share)).collect()
}

/// 1 minus the mean of the total-variation distance between the weight
/// distributions and the mean absolute affect change.
fn step_consistency(previous: &SignalEvent, current: &SignalEvent) -> f64 {
    let distribution_distance = match (
        normalize(&previous.elemental_weights),
        normalize(&current.elemental_weights),
    ) {
        (Some(a), Some(b)) => {
            let labels: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            0.5 * labels
                .into_iter()
                .map(|l| (a.get(l).unwrap_or(&0.0) - b.get(l).unwrap_or(&0.0)).abs())
                .sum::<f64>()
        }
        (None, None) => 0.0,
        _ => 0.5,
    };

    let affect_distance = previous
        .affect
        .components()
        .iter()
        .zip(current.affect.components())
        .map(|(a, b)| (a - b).abs())
        .sum::<f64>()
        / 3.0;

    (1.0 - (distribution_distance + affect_distance) / 2.0).clamp(0.0, 1.0)
}

fn weighted_mean(items: impl Iterator<Item = (f64, f64)>) -> Option<f64> {
    let (sum, total) = items.fold((0.0, 0.0), |(sum, total), (w, v)| (sum + w * v, total + w));
    (total > 0.0).then(|| sum / total)
}
