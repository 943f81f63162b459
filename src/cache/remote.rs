//! Remote Tier - Shared Distributed Backend
//!
//! The remote tier is the authoritative cache shared by every process.
//! `RemoteBackend` is the port a concrete store (Redis, Memcached, a
//! database table) implements; `RemoteTier` binds a backend to one region
//! and applies the region's TTL and per-operation timeout.
//!
//! The in-memory backend exists for tests and single-node deployments. It
//! honors TTLs so expiry behavior matches a real store.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{DEFAULT_REMOTE_TIMEOUT, DEFAULT_REMOTE_TTL};
use crate::error::{Error, Result};

// =============================================================================
// Backend Port
// =============================================================================

/// Port for the shared remote store.
///
/// Implementations map their own failures into `Error::RemoteUnavailable`;
/// callers treat any error as tier unavailability.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Get a value from a region
    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>>;

    /// Store a value in a region; a zero TTL stores without expiry
    async fn put(&self, region: &str, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove a single key, returning whether it was present
    async fn evict(&self, region: &str, key: &str) -> Result<bool>;

    /// Remove every key in a region, returning how many were removed
    async fn clear(&self, region: &str) -> Result<u64>;

    /// Get backend statistics
    fn stats(&self) -> RemoteBackendStats;
}

/// Backend statistics across all regions
#[derive(Debug, Clone, Default)]
pub struct RemoteBackendStats {
    pub entry_count: u64,
    pub reads: u64,
    pub writes: u64,
    pub evictions: u64,
}

// =============================================================================
// In-Memory Backend
// =============================================================================

#[derive(Debug, Clone)]
struct StoredValue {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

/// In-memory implementation of the remote backend
pub struct InMemoryRemoteBackend {
    /// region name -> (key -> stored value)
    regions: DashMap<String, DashMap<String, StoredValue>>,
    entry_count: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryRemoteBackend {
    pub fn new() -> Self {
        Self {
            regions: DashMap::new(),
            entry_count: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryRemoteBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteBackend for InMemoryRemoteBackend {
    async fn get(&self, region: &str, key: &str) -> Result<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        if let Some(region_map) = self.regions.get(region) {
            match region_map.get(key) {
                Some(stored) if !stored.is_expired() => {
                    return Ok(Some(stored.value.clone()));
                }
                Some(_expired) => {}
                None => return Ok(None),
            }

            // Inner guard is dropped; lazily remove the expired entry
            if region_map.remove(key).is_some() {
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(None)
    }

    async fn put(&self, region: &str, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        let stored = StoredValue {
            value,
            expires_at: if ttl.is_zero() {
                None
            } else {
                Some(Instant::now() + ttl)
            },
        };

        let region_map = self
            .regions
            .entry(region.to_string())
            .or_insert_with(DashMap::new);
        if region_map.insert(key.to_string(), stored).is_none() {
            self.entry_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn evict(&self, region: &str, key: &str) -> Result<bool> {
        if let Some(region_map) = self.regions.get(region) {
            if region_map.remove(key).is_some() {
                self.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn clear(&self, region: &str) -> Result<u64> {
        if let Some(region_map) = self.regions.get(region) {
            let removed = region_map.len() as u64;
            region_map.clear();
            self.entry_count.fetch_sub(removed, Ordering::Relaxed);
            self.evictions.fetch_add(removed, Ordering::Relaxed);
            return Ok(removed);
        }
        Ok(0)
    }

    fn stats(&self) -> RemoteBackendStats {
        RemoteBackendStats {
            entry_count: self.entry_count.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Remote Tier
// =============================================================================

/// Remote tier configuration for one region
#[derive(Debug, Clone)]
pub struct RemoteTierConfig {
    /// TTL applied to stored values; zero stores without expiry
    pub ttl: Duration,
    /// Budget for a single backend operation before it counts as unavailable
    pub op_timeout: Duration,
}

impl Default for RemoteTierConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_REMOTE_TTL,
            op_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// Remote tier statistics snapshot
#[derive(Debug, Clone)]
pub struct RemoteTierStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub backend: RemoteBackendStats,
}

/// One region's view of the shared backend
pub struct RemoteTier {
    region: String,
    backend: Arc<dyn RemoteBackend>,
    config: RemoteTierConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RemoteTier {
    pub fn new(
        region: impl Into<String>,
        backend: Arc<dyn RemoteBackend>,
        config: RemoteTierConfig,
    ) -> Self {
        Self {
            region: region.into(),
            backend,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Run a backend operation under the configured timeout
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::RemoteUnavailable {
                region: self.region.clone(),
                reason: format!("operation timed out after {:?}", self.config.op_timeout),
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let value = self.bounded(self.backend.get(&self.region, key)).await?;
        match &value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        Ok(value)
    }

    /// Store a value, with an optional TTL override for this entry
    pub async fn put(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<()> {
        let effective = ttl.unwrap_or(self.config.ttl);
        self.bounded(self.backend.put(&self.region, key, value, effective))
            .await
    }

    pub async fn evict(&self, key: &str) -> Result<bool> {
        self.bounded(self.backend.evict(&self.region, key)).await
    }

    pub async fn clear(&self) -> Result<u64> {
        self.bounded(self.backend.clear(&self.region)).await
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn stats(&self) -> RemoteTierStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        RemoteTierStats {
            hits,
            misses,
            hit_ratio: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            backend: self.backend.stats(),
        }
    }
}
