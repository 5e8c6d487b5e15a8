// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Pattern Extractor - symbolic tags from free text and template matching
//!
//! Text is lowercased and split on anything that is not alphanumeric. A
//! token maps to a tag when it equals a dictionary keyword, or when it starts
//! with a keyword of four or more characters ("transforming" hits
//! "transform"). Extraction results are cached per text hash.
//!
//! Matching scores each template against the current tags plus a window of
//! earlier tag sets. Older sets contribute with geometrically decaying weight
//! and each tag keeps its strongest weight. The score is a weighted Jaccard
//! index: the weight of template tags present over the template size plus
//! the weight of tags outside the template.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Online symbolic pattern detection

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::clock::Clock;
use crate::domain::config::FieldConfig;
use crate::domain::pattern::PatternMatch;
use crate::infrastructure::cache::{BoundedCache, CacheStatsSnapshot};

use super::metric_engine::cache_key;

/// Keywords shorter than this only match whole tokens.
const MIN_PREFIX_KEYWORD_LEN: usize = 4;

const SYMBOLS: &[&str] = &[
    "fire", "water", "earth", "air", "void", "light", "shadow", "tree", "mountain", "ocean", "sky",
    "crystal", "mirror", "phoenix", "dragon", "eagle", "serpent", "lotus", "seed",
];

const THEMES: &[(&str, &[&str])] = &[
    ("transformation", &["change", "transform", "new", "different"]),
    ("relationship", &["love", "connection", "partner", "relationship"]),
    ("purpose", &["purpose", "meaning", "calling", "mission"]),
    ("healing", &["heal", "pain", "trauma", "recovery"]),
    ("growth", &["grow", "develop", "evolve", "expand"]),
    ("creation", &["create", "build", "manifest", "birth"]),
];

const TEMPLATES: &[(&str, &[&str])] = &[
    ("renewal", &["phoenix", "fire", "transformation"]),
    ("grounding", &["earth", "mountain", "tree", "seed"]),
    ("emotional_flow", &["water", "ocean", "healing"]),
    ("clarity", &["air", "sky", "eagle", "light"]),
    ("shadow_work", &["shadow", "serpent", "mirror", "void"]),
    ("creative_emergence", &["creation", "seed", "lotus", "growth"]),
];

/// A named set of tags that together form a recognizable pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTemplate {
    pub label: String,
    pub tags: BTreeSet<String>,
}

impl PatternTemplate {
    pub fn new<I, S>(label: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub confidence_floor: f64,
    /// Number of earlier tag sets considered alongside the current one.
    pub window: usize,
    pub recency_decay: f64,
    pub cache_ttl: Duration,
}

impl From<&FieldConfig> for ExtractorSettings {
    fn from(config: &FieldConfig) -> Self {
        Self {
            confidence_floor: config.pattern_confidence_floor,
            window: config.pattern_window,
            recency_decay: config.pattern_recency_decay,
            cache_ttl: config.cache_ttl.pattern,
        }
    }
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self::from(&FieldConfig::default())
    }
}

pub struct PatternExtractor {
    settings: ExtractorSettings,
    /// keyword -> tag
    dictionary: BTreeMap<String, String>,
    templates: Vec<PatternTemplate>,
    support: RwLock<HashMap<String, u64>>,
    cache: BoundedCache<BTreeSet<String>>,
}

impl PatternExtractor {
    /// Extractor with the built-in symbol dictionary and templates.
    pub fn new(settings: ExtractorSettings, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let mut dictionary: BTreeMap<String, String> =
            SYMBOLS.iter().map(|s| (s.to_string(), s.to_string())).collect();
        for (theme, keywords) in THEMES {
            for keyword in *keywords {
                dictionary.insert(keyword.to_string(), theme.to_string());
            }
        }
        let templates = TEMPLATES
            .iter()
            .map(|(label, tags)| PatternTemplate::new(*label, tags.iter().copied()))
            .collect();

        Self {
            settings,
            dictionary,
            templates,
            support: RwLock::new(HashMap::new()),
            cache: BoundedCache::with_clock("pattern_tags", capacity, clock),
        }
    }

    /// Replace the keyword dictionary.
    pub fn with_dictionary(mut self, dictionary: BTreeMap<String, String>) -> Self {
        self.dictionary = dictionary
            .into_iter()
            .map(|(keyword, tag)| (keyword.to_lowercase(), tag))
            .collect();
        self.cache.clear();
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>, tag: impl Into<String>) -> Self {
        self.dictionary.insert(keyword.into().to_lowercase(), tag.into());
        self.cache.clear();
        self
    }

    /// Replace the template set.
    pub fn with_templates(mut self, templates: Vec<PatternTemplate>) -> Self {
        self.templates = templates;
        self
    }

    pub fn templates(&self) -> &[PatternTemplate] {
        &self.templates
    }

    /// Deterministic tag set for `text`.
    pub fn extract_tags(&self, text: &str) -> BTreeSet<String> {
        let key = cache_key("extract_tags", None, text).ok();
        if let Some(key) = &key {
            if let Some(tags) = self.cache.get(key) {
                return tags;
            }
        }

        let tags = self.tokenize_and_lookup(text);
        if let Some(key) = key {
            self.cache.set(key, tags.clone(), self.settings.cache_ttl);
        }
        trace!(tags = tags.len(), "Extracted tags");
        tags
    }

    fn tokenize_and_lookup(&self, text: &str) -> BTreeSet<String> {
        let lowered = text.to_lowercase();
        let mut tags = BTreeSet::new();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            if let Some(tag) = self.dictionary.get(token) {
                tags.insert(tag.clone());
                continue;
            }
            for (keyword, tag) in &self.dictionary {
                if keyword.chars().count() >= MIN_PREFIX_KEYWORD_LEN && token.starts_with(keyword.as_str()) {
                    tags.insert(tag.clone());
                }
            }
        }
        tags
    }

    /// Templates whose weighted overlap with the tag window reaches the
    /// confidence floor, best first.
    ///
    /// `recent_history` is ordered oldest to newest and excludes `tags`.
    pub fn match_patterns(
        &self,
        tags: &BTreeSet<String>,
        recent_history: &[BTreeSet<String>],
    ) -> Vec<PatternMatch> {
        let window = self.window_weights(tags, recent_history);
        if window.is_empty() {
            return Vec::new();
        }

        let support = self.support.read();
        let mut matches: Vec<(PatternMatch, u64)> = self
            .templates
            .iter()
            .filter(|template| !template.tags.is_empty())
            .filter_map(|template| {
                let inside: f64 = template
                    .tags
                    .iter()
                    .filter_map(|t| window.get(t))
                    .sum();
                let outside: f64 = window
                    .iter()
                    .filter(|(t, _)| !template.tags.contains(*t))
                    .map(|(_, w)| w)
                    .sum();
                let confidence = inside / (template.tags.len() as f64 + outside);

                (confidence >= self.settings.confidence_floor).then(|| {
                    (
                        PatternMatch {
                            label: template.label.clone(),
                            confidence,
                        },
                        support.get(&template.label).copied().unwrap_or(0),
                    )
                })
            })
            .collect();
        drop(support);

        matches.sort_by(|(a, a_support), (b, b_support)| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b_support.cmp(a_support))
                .then_with(|| a.label.cmp(&b.label))
        });
        matches.into_iter().map(|(m, _)| m).collect()
    }

    fn window_weights(
        &self,
        tags: &BTreeSet<String>,
        recent_history: &[BTreeSet<String>],
    ) -> BTreeMap<String, f64> {
        let mut weights: BTreeMap<String, f64> = tags.iter().map(|t| (t.clone(), 1.0)).collect();
        for (k, earlier) in recent_history.iter().rev().take(self.settings.window).enumerate() {
            let w = self.settings.recency_decay.powi(k as i32 + 1);
            for tag in earlier {
                let slot = weights.entry(tag.clone()).or_insert(0.0);
                if w > *slot {
                    *slot = w;
                }
            }
        }
        weights.retain(|_, w| *w > 0.0);
        weights
    }

    /// Record the historical support of a tracked pattern for tie-breaking.
    pub fn set_support(&self, label: &str, support_count: u64) {
        self.support.write().insert(label.to_string(), support_count);
    }

    pub fn forget_support(&self, label: &str) {
        self.support.write().remove(label);
    }

    pub fn clear_support(&self) {
        self.support.write().clear();
    }

    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::SystemClock;

    fn extractor() -> PatternExtractor {
        PatternExtractor::new(ExtractorSettings::default(), 32, Arc::new(SystemClock))
    }

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_extract_symbols_and_themes() {
        let tags = extractor().extract_tags("The Phoenix rose from the fire; everything is transforming!");
        assert_eq!(tags, set(&["fire", "phoenix", "transformation"]));
    }

    #[test]
    fn test_short_keywords_need_whole_tokens() {
        let e = extractor();
        // "newspaper" must not hit "new", "skyline" must not hit "sky".
        assert!(e.extract_tags("newspaper skyline").is_empty());
        assert_eq!(e.extract_tags("something new"), set(&["transformation"]));
    }

    #[test]
    fn test_extraction_is_cached() {
        let e = extractor();
        let first = e.extract_tags("water and earth");
        let second = e.extract_tags("water and earth");
        assert_eq!(first, second);
        assert_eq!(e.cache_stats().hits, 1);
    }

    #[test]
    fn test_custom_keyword() {
        let e = extractor().with_keyword("Wolf", "wolf");
        assert_eq!(e.extract_tags("a WOLF howls"), set(&["wolf"]));
    }

    #[test]
    fn test_match_above_floor() {
        let matches = extractor().match_patterns(&set(&["phoenix", "fire"]), &[]);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label, "renewal");
        assert!((matches[0].confidence - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_match_below_floor() {
        assert!(extractor().match_patterns(&set(&["fire"]), &[]).is_empty());
        assert!(extractor().match_patterns(&BTreeSet::new(), &[]).is_empty());
    }

    #[test]
    fn test_history_contributes_with_decay() {
        let e = extractor();
        let current = set(&["phoenix"]);

        let recent = e.match_patterns(&current, &[set(&["fire", "transformation"])]);
        // phoenix 1.0 + fire 0.5 + transformation 0.5 over 3 template tags.
        assert_eq!(recent.len(), 1);
        assert!((recent[0].confidence - 2.0 / 3.0).abs() < 1e-12);

        let stale = e.match_patterns(
            &current,
            &[set(&["fire", "transformation"]), set(&[]), set(&[])],
        );
        assert!(stale.is_empty());
    }

    #[test]
    fn test_ties_broken_by_support_then_label() {
        let e = extractor().with_templates(vec![
            PatternTemplate::new("beta", ["fire"]),
            PatternTemplate::new("alpha", ["fire"]),
        ]);
        let tags = set(&["fire"]);

        let by_label: Vec<String> = e.match_patterns(&tags, &[]).into_iter().map(|m| m.label).collect();
        assert_eq!(by_label, vec!["alpha", "beta"]);

        e.set_support("beta", 4);
        let by_support: Vec<String> = e.match_patterns(&tags, &[]).into_iter().map(|m| m.label).collect();
        assert_eq!(by_support, vec!["beta", "alpha"]);
    }
}
