// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

// Field Configuration
//
// Every tunable of the aggregation engine lives here: cache sizing and TTL
// tiers, pattern decay, event-log retention, backlog sizing and the fold's
// decay constants. Files are YAML; durations use humantime notation
// ("5m", "1h", "7days").

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::pattern::PatternDecay;

pub const CONFIG_PATH_ENV: &str = "SIGNAL_FIELD_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Entries per cache instance (metric cache and pattern cache each get
    /// this capacity).
    pub cache_capacity: usize,

    pub cache_ttl: CacheTtlConfig,

    /// Minimum weighted overlap for a template to be reported.
    pub pattern_confidence_floor: f64,

    /// Prior tag sets per session considered by pattern matching.
    pub pattern_window: usize,

    /// Weight multiplier applied per step back in the tag window.
    pub pattern_recency_decay: f64,

    /// Strength below which a pattern is no longer reported.
    pub pattern_strength_floor: f64,

    #[serde(with = "humantime_serde")]
    pub pattern_half_life: Duration,

    /// How long a pattern may sit at the floor before removal.
    #[serde(with = "humantime_serde")]
    pub pattern_retention: Duration,

    /// Age after which low-significance log records become prunable.
    #[serde(with = "humantime_serde")]
    pub retention_age: Duration,

    /// Records below this significance are pruned once old enough.
    pub prune_significance: f64,

    /// Records at or above this significance are never pruned.
    pub always_keep_significance: f64,

    /// Records held in memory while the durable sink is unreachable.
    pub backlog_capacity: usize,

    /// Undelivered records queued per subscriber before new ones are dropped.
    pub subscriber_capacity: usize,

    /// Window within which a session counts as a participant.
    #[serde(with = "humantime_serde")]
    pub activity_window: Duration,

    /// EWMA retention factor for the elemental balance.
    pub balance_decay: f64,

    /// Per-step recency weight inside session coherence.
    pub coherence_decay: f64,

    /// Mixing factor pulling resonance toward or away from the baseline.
    pub resonance_contrast: f64,

    /// Number of folds the growth rate is measured over.
    pub growth_window: usize,

    /// Events retained per session for coherence and readiness.
    pub history_window: usize,

    /// Significance gained per unit of coherence change.
    pub significance_gain: f64,

    /// Significance every fold gets regardless of coherence change.
    pub significance_base: f64,

    #[serde(with = "humantime_serde")]
    pub maintenance_interval: Duration,

    pub sink_retry: RetryConfig,

    pub readiness: ReadinessConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    pub metric: MetricTtlConfig,
    #[serde(with = "humantime_serde")]
    pub pattern: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricTtlConfig {
    #[serde(with = "humantime_serde")]
    pub resonance: Duration,
    #[serde(with = "humantime_serde")]
    pub coherence: Duration,
    #[serde(with = "humantime_serde")]
    pub readiness: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(with = "humantime_serde")]
    pub initial: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

/// Thresholds for the phase readiness metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Sessions with fewer events are never ready.
    pub min_events: usize,
    /// Engagement time at which the engagement factor saturates.
    #[serde(with = "humantime_serde")]
    pub min_engagement: Duration,
    /// Score at or above which a session is ready.
    pub threshold: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            cache_ttl: CacheTtlConfig::default(),
            pattern_confidence_floor: 0.6,
            pattern_window: 5,
            pattern_recency_decay: 0.5,
            pattern_strength_floor: 0.05,
            pattern_half_life: Duration::from_secs(3600),
            pattern_retention: Duration::from_secs(24 * 3600),
            retention_age: Duration::from_secs(7 * 24 * 3600),
            prune_significance: 0.3,
            always_keep_significance: 0.8,
            backlog_capacity: 1000,
            subscriber_capacity: 1024,
            activity_window: Duration::from_secs(30 * 60),
            // 1 - 2 / (50 + 1): the last ~50 folds dominate.
            balance_decay: 0.96,
            coherence_decay: 0.8,
            resonance_contrast: 0.5,
            growth_window: 10,
            history_window: 20,
            significance_gain: 5.0,
            significance_base: 0.1,
            maintenance_interval: Duration::from_secs(60),
            sink_retry: RetryConfig::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            metric: MetricTtlConfig::default(),
            pattern: Duration::from_secs(15 * 60),
        }
    }
}

impl Default for MetricTtlConfig {
    fn default() -> Self {
        Self {
            resonance: Duration::from_secs(5 * 60),
            coherence: Duration::from_secs(3600),
            readiness: Duration::from_secs(15 * 60),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(30),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            min_events: 5,
            min_engagement: Duration::from_secs(20 * 60),
            threshold: 0.75,
        }
    }
}

impl FieldConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Candidate configuration files, highest precedence first: the
    /// `SIGNAL_FIELD_CONFIG` path, `./signal-field.yaml`,
    /// `~/.signal-field/config.yaml`, then `/etc/signal-field/config.yaml`
    /// on Unix.
    pub fn config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            candidates.push(PathBuf::from(path));
        }
        candidates.push(PathBuf::from("./signal-field.yaml"));
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".signal-field").join("config.yaml"));
        }
        if cfg!(unix) {
            candidates.push(PathBuf::from("/etc/signal-field/config.yaml"));
        }
        candidates
    }

    /// First existing file among [`FieldConfig::config_candidates`].
    pub fn discover_config() -> Option<PathBuf> {
        Self::config_candidates().into_iter().find(|path| path.exists())
    }

    /// Resolve the field configuration.
    ///
    /// An explicit path is mandatory once given; otherwise the first
    /// discovered file wins and the built-in defaults cover the rest.
    /// Environment overrides apply on top in every case.
    pub fn load_or_default(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        let source = explicit.or_else(Self::discover_config);
        let mut config = match &source {
            Some(path) => {
                tracing::info!(path = %path.display(), "Reading field configuration");
                Self::from_yaml_file(path)
                    .with_context(|| format!("invalid field configuration in {}", path.display()))?
            }
            None => {
                tracing::debug!("No field configuration file present, using built-in defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Capacity overrides from `SIGNAL_FIELD_*_CAPACITY` variables.
    pub fn apply_env_overrides(&mut self) {
        override_usize("SIGNAL_FIELD_BACKLOG_CAPACITY", &mut self.backlog_capacity);
        override_usize("SIGNAL_FIELD_CACHE_CAPACITY", &mut self.cache_capacity);
        override_usize("SIGNAL_FIELD_SUBSCRIBER_CAPACITY", &mut self.subscriber_capacity);
    }

    /// Reject settings the field cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache_capacity == 0 {
            anyhow::bail!("cache_capacity must be greater than zero");
        }
        if self.backlog_capacity == 0 {
            anyhow::bail!("backlog_capacity must be greater than zero");
        }
        if self.subscriber_capacity == 0 {
            anyhow::bail!("subscriber_capacity must be greater than zero");
        }

        for (name, value) in [
            ("pattern_confidence_floor", self.pattern_confidence_floor),
            ("pattern_recency_decay", self.pattern_recency_decay),
            ("pattern_strength_floor", self.pattern_strength_floor),
            ("prune_significance", self.prune_significance),
            ("always_keep_significance", self.always_keep_significance),
            ("balance_decay", self.balance_decay),
            ("coherence_decay", self.coherence_decay),
            ("resonance_contrast", self.resonance_contrast),
            ("significance_base", self.significance_base),
            ("readiness.threshold", self.readiness.threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must lie within [0, 1], got {}", name, value);
            }
        }

        if self.prune_significance > self.always_keep_significance {
            anyhow::bail!(
                "prune_significance ({}) must not exceed always_keep_significance ({})",
                self.prune_significance,
                self.always_keep_significance
            );
        }
        if self.pattern_strength_floor >= self.pattern_confidence_floor {
            anyhow::bail!(
                "pattern_strength_floor ({}) must be below pattern_confidence_floor ({})",
                self.pattern_strength_floor,
                self.pattern_confidence_floor
            );
        }
        if self.growth_window < 2 {
            anyhow::bail!("growth_window must cover at least two folds");
        }
        if self.history_window == 0 {
            anyhow::bail!("history_window must be greater than zero");
        }
        if self.significance_gain < 0.0 || !self.significance_gain.is_finite() {
            anyhow::bail!("significance_gain must be a non-negative number");
        }
        if self.sink_retry.initial.is_zero() || self.sink_retry.initial > self.sink_retry.max {
            anyhow::bail!("sink_retry.initial must be non-zero and not exceed sink_retry.max");
        }
        if self.maintenance_interval.is_zero() {
            anyhow::bail!("maintenance_interval must be non-zero");
        }

        Ok(())
    }

    pub fn pattern_decay(&self) -> PatternDecay {
        PatternDecay {
            half_life: self.pattern_half_life,
            floor: self.pattern_strength_floor,
            retention: self.pattern_retention,
        }
    }
}

fn override_usize(var: &str, target: &mut usize) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => {
            tracing::info!(variable = var, value, "Capacity overridden from environment");
            *target = value;
        }
        _ => tracing::warn!(variable = var, value = %raw, "Ignoring capacity override, not a positive integer"),
    }
}
