// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! JSON-lines file sink
//!
//! Appends one serialized [`StateEvent`] per line. Retried puts may write a
//! sequence twice; `query` keeps the last line seen for each sequence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::events::StateEvent;
use crate::domain::repository::DurableSink;

pub struct JsonlFileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DurableSink for JsonlFileSink {
    async fn put(&self, _sequence: u64, record: &StateEvent) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize event")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn query(&self, from_sequence: u64) -> Result<Vec<StateEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let mut records = BTreeMap::new();
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StateEvent>(line) {
                Ok(record) if record.sequence >= from_sequence => {
                    records.insert(record.sequence, record);
                }
                Ok(_) => {}
                Err(e) => {
                    // A torn final line after a crash is expected; skip it.
                    warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping unreadable event log line"
                    );
                }
            }
        }
        Ok(records.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::StateEventKind;
    use chrono::Utc;
    use serde_json::json;

    fn record(sequence: u64) -> StateEvent {
        StateEvent {
            sequence,
            kind: StateEventKind::SignalFolded,
            payload: json!({ "n": sequence }),
            significance: 0.4,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_queries_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileSink::new(dir.path().join("absent.jsonl"));
        assert!(sink.query(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_then_query_dedupes_retries() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileSink::new(dir.path().join("nested").join("events.jsonl"));

        for seq in [1, 2, 2, 3] {
            sink.put(seq, &record(seq)).await.unwrap();
        }

        let seqs: Vec<u64> = sink.query(2).await.unwrap().iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_torn_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let sink = JsonlFileSink::new(&path);
        sink.put(1, &record(1)).await.unwrap();

        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"sequence\": 2, \"kind\"");
        std::fs::write(&path, content).unwrap();

        assert_eq!(sink.query(0).await.unwrap().len(), 1);
    }
}
