// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Properties that must hold for any signal sequence or cache workload.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use proptest::prelude::*;
use signal_field_core::application::AggregationField;
use signal_field_core::infrastructure::BoundedCache;
use signal_field_core::{Affect, Clock, FieldConfig, ManualClock, SessionId, SignalEvent};

const LABELS: [&str; 5] = ["fire", "water", "earth", "air", "void"];

#[derive(Debug, Clone)]
struct SignalShape {
    session: u8,
    affect: (f64, f64, f64),
    quality: f64,
    confidence: f64,
    weights: Vec<(usize, f64)>,
    gap_secs: i64,
}

fn signal_shape() -> impl Strategy<Value = SignalShape> {
    (
        0u8..8,
        (0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64),
        0.0..=1.0f64,
        0.0..=1.0f64,
        prop::collection::vec((0..LABELS.len(), 0.0..10.0f64), 0..5),
        0i64..600,
    )
        .prop_map(|(session, affect, quality, confidence, weights, gap_secs)| SignalShape {
            session,
            affect,
            quality,
            confidence,
            weights,
            gap_secs,
        })
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set(u8),
    Get(u8),
}

fn cache_op() -> impl Strategy<Value = CacheOp> {
    prop_oneof![(0u8..12).prop_map(CacheOp::Set), (0u8..12).prop_map(CacheOp::Get)]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn balance_is_a_distribution_and_coherence_is_bounded(
        shapes in prop::collection::vec(signal_shape(), 1..60)
    ) {
        let clock = Arc::new(ManualClock::default());
        let field = AggregationField::new(FieldConfig::default(), None, clock.clone());

        runtime().block_on(async {
            for shape in &shapes {
                let (arousal, valence, dominance) = shape.affect;
                let mut event = SignalEvent::new(SessionId::new(format!("s{}", shape.session)), clock.now())
                    .with_affect(Affect::new(arousal, valence, dominance))
                    .with_quality(shape.quality)
                    .with_confidence(shape.confidence);
                for (label, weight) in &shape.weights {
                    event = event.with_weight(LABELS[*label], *weight);
                }

                let snapshot = field.ingest(event).await.unwrap().snapshot;

                assert!((0.0..=1.0).contains(&snapshot.coherence), "coherence {}", snapshot.coherence);
                assert!(snapshot.growth_rate.is_finite());
                if !snapshot.elemental_balance.is_empty() {
                    let total: f64 = snapshot.elemental_balance.values().sum();
                    assert!((total - 1.0).abs() < 1e-9, "balance sums to {total}");
                    assert!(snapshot.elemental_balance.values().all(|w| (0.0..=1.0).contains(w)));
                }
                clock.advance(Duration::seconds(shape.gap_secs));
            }
        });
    }

    #[test]
    fn cache_never_exceeds_capacity_and_evicts_least_recent(
        capacity in 1usize..6,
        ops in prop::collection::vec(cache_op(), 1..80)
    ) {
        let clock = Arc::new(ManualClock::default());
        let cache: BoundedCache<u8> = BoundedCache::with_clock("property", capacity, clock);
        let ttl = StdDuration::from_secs(3600);
        // Keys by last use, least recent first.
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                CacheOp::Set(key) => {
                    let evicted = match model.iter().position(|k| *k == key) {
                        Some(pos) => {
                            model.remove(pos);
                            None
                        }
                        None if model.len() >= capacity => Some(model.remove(0)),
                        None => None,
                    };
                    cache.set(key.to_string(), key, ttl);
                    model.push(key);
                    // A miss leaves recency untouched.
                    if let Some(evicted) = evicted {
                        prop_assert_eq!(cache.get(&evicted.to_string()), None);
                    }
                }
                CacheOp::Get(key) => {
                    let hit = cache.get(&key.to_string());
                    match model.iter().position(|k| *k == key) {
                        Some(pos) => {
                            prop_assert_eq!(hit, Some(key));
                            let k = model.remove(pos);
                            model.push(k);
                        }
                        None => prop_assert_eq!(hit, None),
                    }
                }
            }
            prop_assert!(cache.len() <= capacity);
            prop_assert_eq!(cache.len(), model.len());
        }
    }
}
