//! Local Tier - In-Process Hot Cache
//!
//! Bounded, TTL-based cache held in process memory. Entries appear here
//! only after the remote tier has seen them, so losing this tier (restart,
//! eviction pressure) costs latency, never correctness.
//!
//! # Design
//!
//! - Sharded concurrent storage via `DashMap`, no global lock
//! - Expired entries are dropped lazily on read
//! - Capacity is bounded in entries; crossing the high watermark triggers
//!   batch eviction down to the low watermark, worst-scored entries first

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use super::entry::CacheEntry;
use super::{DEFAULT_LOCAL_CAPACITY, DEFAULT_LOCAL_TTL};

/// Local tier configuration
#[derive(Debug, Clone)]
pub struct LocalCacheConfig {
    /// Maximum number of entries
    pub capacity: usize,
    /// Default TTL applied to entries without an override; zero disables expiry
    pub ttl: Duration,
    /// Utilization that triggers eviction (0.0 - 1.0)
    pub high_watermark: f64,
    /// Target utilization after eviction (0.0 - 1.0)
    pub low_watermark: f64,
    /// Maximum entries evicted per eviction pass
    pub eviction_batch: usize,
}

impl Default for LocalCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LOCAL_CAPACITY,
            ttl: DEFAULT_LOCAL_TTL,
            high_watermark: 0.90,
            low_watermark: 0.80,
            eviction_batch: 128,
        }
    }
}

/// Local tier statistics snapshot
#[derive(Debug, Clone)]
pub struct LocalStats {
    pub entries: usize,
    pub capacity: usize,
    pub utilization: f64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub evictions: u64,
    pub expirations: u64,
}

/// In-process cache bounded by entry count
pub struct LocalCache {
    config: LocalCacheConfig,
    storage: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::with_config(LocalCacheConfig::default())
    }

    pub fn with_config(config: LocalCacheConfig) -> Self {
        Self {
            config,
            storage: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Get a value, dropping it if its TTL has elapsed
    pub fn get(&self, key: &str) -> Option<Bytes> {
        match self.storage.get(key) {
            Some(entry) if !entry.is_expired(self.config.ttl) => {
                entry.record_access();
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(CacheEntry::value(&entry).clone());
            }
            Some(_expired) => {}
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        // Read guard is released before the removal takes the shard write lock
        self.storage.remove(key);
        self.expirations.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace an entry, evicting if over the high watermark
    pub fn put(&self, key: impl Into<String>, entry: CacheEntry) {
        self.storage.insert(key.into(), entry);
        if self.should_evict() {
            self.evict();
        }
    }

    /// Remove an entry, returning whether it was present
    pub fn remove(&self, key: &str) -> bool {
        self.storage.remove(key).is_some()
    }

    /// Drop all entries, returning how many were removed
    pub fn clear(&self) -> usize {
        let count = self.storage.len();
        self.storage.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn should_evict(&self) -> bool {
        let threshold = (self.config.capacity as f64 * self.config.high_watermark) as usize;
        self.storage.len() >= threshold.max(1)
    }

    /// Evict worst-scored entries until utilization drops below the low
    /// watermark, capped at one batch per pass. Expired entries sort first.
    fn evict(&self) {
        let target = (self.config.capacity as f64 * self.config.low_watermark) as usize;

        let mut candidates: Vec<(String, f64)> = self
            .storage
            .iter()
            .map(|item| {
                let score = if item.value().is_expired(self.config.ttl) {
                    f64::MAX
                } else {
                    item.value().metadata.eviction_score()
                };
                (item.key().clone(), score)
            })
            .collect();

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut evicted = 0usize;
        for (key, _) in candidates {
            if self.storage.len() <= target || evicted >= self.config.eviction_batch {
                break;
            }
            if self.storage.remove(&key).is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, entries = self.storage.len(), "local tier evicted entries");
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> LocalStats {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        let entries = self.storage.len();

        LocalStats {
            entries,
            capacity: self.config.capacity,
            utilization: if self.config.capacity > 0 {
                entries as f64 / self.config.capacity as f64
            } else {
                0.0
            },
            hits,
            misses,
            hit_ratio: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            evictions: self.evictions(),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new()
    }
}
