// Copyright (c) 2026 Signal Field Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Bounded TTL cache with LRU eviction
//!
//! # Architecture
//!
//! Entries live in a `HashMap` behind a `parking_lot::RwLock`. Lookups only
//! take the read lock: recency is recorded in a per-entry atomic tick drawn
//! from a cache-wide counter, so concurrent readers never wait on each other.
//! Writers (`set`, eviction, invalidation, sweeps) take the write lock.
//!
//! Expiry is lazy on access and also swept by [`BoundedCache::sweep_expired`],
//! which the field's maintenance pass calls periodically so memory is
//! reclaimed for keys nobody reads again.
//!
//! When `set` needs room, expired entries are purged first; then the entry
//! with the oldest access tick is evicted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::clock::{Clock, SystemClock};

/// One cached value with its lifetime bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Hit/miss counters.
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Point-in-time copy of a cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStatsSnapshot {
    /// Hit ratio in [0, 1]; 0 when nothing was looked up yet.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct BoundedCache<V> {
    name: &'static str,
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    tick: AtomicU64,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self::with_clock(name, capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::with_capacity(capacity.min(4096))),
            tick: AtomicU64::new(0),
            clock,
            stats: CacheStats::default(),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up a live entry. Expired entries count as a miss and are dropped.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    entry.last_access.store(self.next_tick(), Ordering::Relaxed);
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                None => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            self.stats.expirations.fetch_add(1, Ordering::Relaxed);
            trace!(cache = self.name, key, "expired entry removed on access");
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace an entry living for `ttl`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now();
        // expires_at must lie strictly after created_at.
        let ttl = chrono::Duration::from_std(ttl.max(Duration::from_millis(1)))
            .unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            self.purge_expired(&mut entries, now);
            while entries.len() >= self.capacity {
                if !self.evict_least_recent(&mut entries) {
                    break;
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at,
                last_access: AtomicU64::new(self.next_tick()),
            },
        );
        self.stats.insertions.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the cached value or compute, store and return a fresh one.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl: Duration, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.set(key, value.clone(), ttl);
        value
    }

    /// Remove the exact key and every key starting with it.
    pub fn invalidate(&self, key_or_prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(key_or_prefix));
        let removed = before - entries.len();
        if removed > 0 {
            trace!(cache = self.name, prefix = key_or_prefix, removed, "invalidated entries");
        }
        removed
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        self.purge_expired(&mut entries, now)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            insertions: self.stats.insertions.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expirations: self.stats.expirations.load(Ordering::Relaxed),
        }
    }

    fn purge_expired(&self, entries: &mut HashMap<String, CacheEntry<V>>, now: DateTime<Utc>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        self.stats.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    fn evict_least_recent(&self, entries: &mut HashMap<String, CacheEntry<V>>) -> bool {
        let victim = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                entries.remove(&key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(cache = self.name, key = %key, "evicted least recently used entry");
                true
            }
            None => false,
        }
    }
}

impl<V> std::fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("stored", &self.entries.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    fn cache(capacity: usize) -> (BoundedCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (BoundedCache::with_clock("test", capacity, clock.clone()), clock)
    }

    #[test]
    fn test_get_and_set() {
        let (cache, _) = cache(4);
        assert_eq!(cache.get("a"), None);
        cache.set("a", 1, MINUTE);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let (cache, _) = cache(3);
        cache.set("a", 1, MINUTE);
        cache.set("b", 2, MINUTE);
        cache.set("c", 3, MINUTE);

        // Touch a and c so b becomes the oldest access.
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));

        cache.set("d", 4, MINUTE);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let (cache, _) = cache(8);
        for i in 0..100u32 {
            cache.set(format!("k{i}"), i, MINUTE);
            assert!(cache.len() <= 8);
        }
        // The survivors are the eight most recent insertions.
        for i in 92..100u32 {
            assert_eq!(cache.get(&format!("k{i}")), Some(i));
        }
    }

    #[test]
    fn test_expired_entry_is_miss_without_sweep() {
        let (cache, clock) = cache(4);
        cache.set("a", 1, MINUTE);

        clock.advance(chrono::Duration::seconds(59));
        assert_eq!(cache.get("a"), Some(1));

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_expired_entries_purged_before_lru_eviction() {
        let (cache, clock) = cache(2);
        cache.set("short", 1, Duration::from_secs(1));
        cache.set("long", 2, MINUTE);
        // Make "long" the least recent access; it must still survive because
        // the expired entry goes first.
        assert_eq!(cache.get("short"), Some(1));

        clock.advance(chrono::Duration::seconds(5));
        cache.set("new", 3, MINUTE);

        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.get("new"), Some(3));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_sweep_reclaims_unread_entries() {
        let (cache, clock) = cache(4);
        cache.set("a", 1, Duration::from_secs(10));
        cache.set("b", 2, Duration::from_secs(10));
        cache.set("c", 3, MINUTE);

        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prefix_invalidation() {
        let (cache, _) = cache(8);
        cache.set("coherence:s1:aa", 1, MINUTE);
        cache.set("coherence:s1:bb", 2, MINUTE);
        cache.set("coherence:s2:aa", 3, MINUTE);
        cache.set("resonance:aa", 4, MINUTE);

        assert_eq!(cache.invalidate("coherence:s1:"), 2);
        assert_eq!(cache.get("coherence:s2:aa"), Some(3));
        assert_eq!(cache.invalidate("resonance:aa"), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let (cache, _) = cache(2);
        cache.set("a", 1, MINUTE);
        cache.set("b", 2, MINUTE);
        cache.set("a", 10, MINUTE);

        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_get_or_insert_with_memoizes() {
        let (cache, _) = cache(2);
        let mut calls = 0;
        let first = cache.get_or_insert_with("k", MINUTE, || {
            calls += 1;
            7
        });
        let second = cache.get_or_insert_with("k", MINUTE, || 99);

        assert_eq!((first, second, calls), (7, 7, 1));
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(BoundedCache::<u64>::new("concurrent", 64));
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        let key = format!("k{}", i % 100);
                        if i % 3 == 0 {
                            cache.set(key, t * 1000 + i, MINUTE);
                        } else {
                            let _ = cache.get(&key);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }
}
