// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Event store ordering guarantees under concurrency.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use signal_field_core::infrastructure::{EventStore, EventStoreConfig};
use signal_field_core::{EventFilter, StateEventKind, SystemClock};
use tokio::sync::mpsc;

#[test]
fn test_concurrent_appends_are_gapless() {
    let store = Arc::new(EventStore::new(EventStoreConfig::default(), None, Arc::new(SystemClock)));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                (0..250)
                    .map(|i| store.append(StateEventKind::SignalFolded, json!({ "t": t, "i": i }), 0.5))
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut sequences: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=2000).collect::<Vec<u64>>());
    let replayed: Vec<u64> = store.replay(0).map(|e| e.sequence).collect();
    assert_eq!(replayed, sequences);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_each_subscriber_sees_sequence_order() {
    let store = Arc::new(EventStore::new(EventStoreConfig::default(), None, Arc::new(SystemClock)));
    let mut receivers = Vec::new();
    for _ in 0..3 {
        let (tx, rx) = mpsc::unbounded_channel();
        store.subscribe(EventFilter::all(), tx);
        receivers.push(rx);
    }

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    store.append(StateEventKind::SignalFolded, json!(null), 0.5);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    for mut rx in receivers {
        let mut expected = 1;
        while expected <= 400 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.sequence, expected);
            expected += 1;
        }
    }
}
