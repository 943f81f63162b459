//! Tiered Cache - Unified Two-Tier Region
//!
//! One region's local and remote tiers behind a single contract:
//!
//! ```text
//!   get:   local ──miss──▶ remote ──hit──▶ backfill local
//!   load:  double miss ──▶ loader ──▶ remote ──▶ local
//!   put:   remote first, then local
//!   evict: local, then remote; both always attempted
//! ```
//!
//! A region can run with either tier disabled. Remote failures never reach
//! readers; a lookup against an unavailable remote tier degrades to a miss
//! and the failure is logged and counted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::entry::CacheEntry;
use super::local::LocalCache;
use super::metrics::{CacheMetrics, MetricsSnapshot};
use super::remote::{InMemoryRemoteBackend, RemoteTier, RemoteTierConfig};
use crate::error::{Error, Result};

/// A named cache region spanning the local and remote tiers
pub struct TieredCache {
    name: String,
    local: Option<LocalCache>,
    remote: Option<RemoteTier>,
    metrics: CacheMetrics,
}

impl TieredCache {
    /// Regions are materialized by the registry, which guarantees at least
    /// one tier is enabled.
    pub(crate) fn new(
        name: impl Into<String>,
        local: Option<LocalCache>,
        remote: Option<RemoteTier>,
    ) -> Self {
        debug_assert!(local.is_some() || remote.is_some());
        Self {
            name: name.into(),
            local,
            remote,
            metrics: CacheMetrics::new(),
        }
    }

    /// Region backed by fresh in-memory tiers, for tests and single-node use
    pub fn in_memory(name: impl Into<String>) -> Self {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let name = name.into();
        let remote = RemoteTier::new(name.clone(), backend, RemoteTierConfig::default());
        Self::new(name, Some(LocalCache::new()), Some(remote))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a key, checking the local tier first
    #[instrument(skip(self), fields(region = %self.name))]
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(local) = &self.local {
            if let Some(value) = local.get(key) {
                self.metrics.record_local_hit();
                debug!(key, "local tier hit");
                return Some(value);
            }
            self.metrics.record_local_miss();
        }

        let remote = self.remote.as_ref()?;
        match remote.get(key).await {
            Ok(Some(value)) => {
                self.metrics.record_remote_hit();
                debug!(key, "remote tier hit");
                self.backfill(key, &value);
                Some(value)
            }
            Ok(None) => {
                self.metrics.record_remote_miss();
                None
            }
            Err(e) => {
                self.metrics.record_degraded_op();
                warn!(key, error = %e, "remote tier lookup failed, degrading to miss");
                None
            }
        }
    }

    /// Look up a key, invoking `loader` on a double miss and writing the
    /// loaded value through both tiers.
    ///
    /// Concurrent callers that miss the same key each run the loader; it
    /// must be idempotent.
    pub async fn get_with<F, Fut>(&self, key: &str, loader: F) -> Result<Bytes>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Bytes>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        self.metrics.record_load();
        debug!(region = %self.name, key, "double miss, invoking loader");
        let value = loader().await.map_err(|source| {
            self.metrics.record_load_failure();
            Error::Loader {
                key: key.to_string(),
                source,
            }
        })?;

        self.write_through(key, value.clone(), None).await;
        Ok(value)
    }

    /// Store a value in both tiers under the region's TTLs
    pub async fn put(&self, key: &str, value: Bytes) {
        self.metrics.record_put();
        self.write_through(key, value, None).await;
    }

    /// Store a value with a per-entry TTL override
    pub async fn put_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) {
        self.metrics.record_put();
        self.write_through(key, value, Some(ttl)).await;
    }

    /// Remove a key from both tiers.
    ///
    /// Both removals are always attempted. A remote failure surfaces as
    /// `Error::EvictionFailed` after it has been logged and counted, so
    /// callers running a fan-out can tally it and move on.
    #[instrument(skip(self), fields(region = %self.name))]
    pub async fn evict(&self, key: &str) -> Result<()> {
        if let Some(local) = &self.local {
            local.remove(key);
        }

        let mut remote_failed = false;
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.evict(key).await {
                remote_failed = true;
                self.metrics.record_degraded_op();
                warn!(key, error = %e, "remote tier eviction failed");
            }
        }

        self.metrics.record_eviction();
        if remote_failed {
            Err(Error::EvictionFailed {
                region: self.name.clone(),
                key: key.to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Remove every entry in the region from both tiers
    pub async fn clear(&self) -> Result<()> {
        if let Some(local) = &self.local {
            let removed = local.clear();
            debug!(region = %self.name, removed, "local tier cleared");
        }

        if let Some(remote) = &self.remote {
            match remote.clear().await {
                Ok(removed) => debug!(region = %self.name, removed, "remote tier cleared"),
                Err(e) => {
                    self.metrics.record_degraded_op();
                    warn!(region = %self.name, error = %e, "remote tier clear failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Typed lookup through `serde_json`
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Typed store through `serde_json`
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_vec(value)?;
        self.put(key, Bytes::from(raw)).await;
        Ok(())
    }

    /// Remote-first write. The local write is skipped when the remote write
    /// fails, so the local tier never holds a value the shared tier has not
    /// seen.
    async fn write_through(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.put(key, value.clone(), ttl).await {
                self.metrics.record_degraded_op();
                warn!(region = %self.name, key, error = %e, "remote tier write failed, skipping local write");
                return;
            }
        }

        if let Some(local) = &self.local {
            let entry = match ttl {
                Some(ttl) => CacheEntry::with_ttl(value, ttl),
                None => CacheEntry::new(value),
            };
            local.put(key, entry);
        }
    }

    /// Populate the local tier from a remote hit. The local tier is purely
    /// a latency optimization, so this never fails the lookup.
    fn backfill(&self, key: &str, value: &Bytes) {
        if let Some(local) = &self.local {
            local.put(key, CacheEntry::new(value.clone()));
            self.metrics.record_backfill();
        }
    }

    pub fn local(&self) -> Option<&LocalCache> {
        self.local.as_ref()
    }

    pub fn remote(&self) -> Option<&RemoteTier> {
        self.remote.as_ref()
    }

    /// Point-in-time metrics for this region
    pub fn metrics(&self) -> MetricsSnapshot {
        if let Some(local) = &self.local {
            self.metrics.update_local_entries(local.len() as u64);
        }
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.name)
            .field("local", &self.local.is_some())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::remote::{RemoteBackend, RemoteBackendStats};
    use crate::domain::PermissionSet;
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    struct FailingBackend;

    #[async_trait]
    impl RemoteBackend for FailingBackend {
        async fn get(&self, region: &str, _key: &str) -> Result<Option<Bytes>> {
            Err(Error::RemoteUnavailable {
                region: region.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn put(&self, region: &str, _: &str, _: Bytes, _: Duration) -> Result<()> {
            Err(Error::RemoteUnavailable {
                region: region.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn evict(&self, region: &str, _key: &str) -> Result<bool> {
            Err(Error::RemoteUnavailable {
                region: region.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn clear(&self, region: &str) -> Result<u64> {
            Err(Error::RemoteUnavailable {
                region: region.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        fn stats(&self) -> RemoteBackendStats {
            RemoteBackendStats::default()
        }
    }

    fn degraded_cache() -> TieredCache {
        let remote = RemoteTier::new("perms", Arc::new(FailingBackend), RemoteTierConfig::default());
        TieredCache::new("perms", Some(LocalCache::new()), Some(remote))
    }

    fn cache_with_backend(backend: Arc<InMemoryRemoteBackend>) -> TieredCache {
        let remote = RemoteTier::new("perms", backend, RemoteTierConfig::default());
        TieredCache::new("perms", Some(LocalCache::new()), Some(remote))
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = TieredCache::in_memory("perms");
        cache.put("u1", Bytes::from("value")).await;

        assert_eq!(cache.get("u1").await, Some(Bytes::from("value")));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = TieredCache::in_memory("perms");
        assert!(cache.get("absent").await.is_none());

        let metrics = cache.metrics();
        assert_eq!(metrics.local_misses, 1);
        assert_eq!(metrics.remote_misses, 1);
    }

    #[tokio::test]
    async fn test_remote_hit_backfills_local() {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        backend
            .put("perms", "u1", Bytes::from("value"), Duration::ZERO)
            .await
            .unwrap();
        let cache = cache_with_backend(backend);

        assert_eq!(cache.get("u1").await, Some(Bytes::from("value")));
        assert_eq!(cache.local().unwrap().len(), 1);
        assert_eq!(cache.metrics().backfills, 1);

        // second lookup is served locally
        assert_eq!(cache.get("u1").await, Some(Bytes::from("value")));
        assert_eq!(cache.metrics().local_hits, 1);
    }

    #[tokio::test]
    async fn test_get_with_loads_on_double_miss() {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let cache = cache_with_backend(backend.clone());

        let value = cache
            .get_with("u1", || async { Ok(Bytes::from("loaded")) })
            .await
            .unwrap();

        assert_eq!(value, Bytes::from("loaded"));
        assert_eq!(cache.metrics().loads, 1);
        // both tiers were populated
        assert_eq!(
            backend.get("perms", "u1").await.unwrap(),
            Some(Bytes::from("loaded"))
        );
        assert_eq!(cache.local().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_with_skips_loader_on_hit() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let cache = TieredCache::in_memory("perms");
        cache.put("u1", Bytes::from("cached")).await;

        let loader_runs = AtomicU32::new(0);
        let value = cache
            .get_with("u1", || async {
                loader_runs.fetch_add(1, Ordering::SeqCst);
                Ok(Bytes::from("loaded"))
            })
            .await
            .unwrap();

        assert_eq!(value, Bytes::from("cached"));
        assert_eq!(loader_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_with_loader_failure() {
        let cache = TieredCache::in_memory("perms");

        let err = cache
            .get_with("u1", || async { Err(anyhow::anyhow!("role store down")) })
            .await
            .unwrap_err();

        assert_matches!(err, Error::Loader { .. });
        assert_eq!(cache.metrics().load_failures, 1);
        // the failure was not cached
        assert!(cache.get("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_evict_removes_from_both_tiers() {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let cache = cache_with_backend(backend.clone());
        cache.put("u1", Bytes::from("value")).await;

        cache.evict("u1").await.unwrap();

        assert!(cache.get("u1").await.is_none());
        assert_eq!(backend.get("perms", "u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evict_missing_key_is_ok() {
        let cache = TieredCache::in_memory("perms");
        assert!(cache.evict("absent").await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_empties_both_tiers() {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let cache = cache_with_backend(backend.clone());
        cache.put("u1", Bytes::from("a")).await;
        cache.put("u2", Bytes::from("b")).await;

        cache.clear().await.unwrap();

        assert!(cache.get("u1").await.is_none());
        assert_eq!(backend.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let cache = TieredCache::in_memory("perms");
        let perms = PermissionSet::new("u1", ["project:create"]);

        cache.put_json("u1", &perms).await.unwrap();
        let restored: Option<PermissionSet> = cache.get_json("u1").await.unwrap();

        assert_eq!(restored, Some(perms));
    }

    #[tokio::test]
    async fn test_degraded_get_is_a_miss() {
        let cache = degraded_cache();
        assert!(cache.get("u1").await.is_none());
        assert!(cache.metrics().degraded_ops >= 1);
    }

    #[tokio::test]
    async fn test_degraded_put_skips_local_write() {
        let cache = degraded_cache();
        cache.put("u1", Bytes::from("value")).await;

        // remote rejected the write, so the local tier must not hold it
        assert_eq!(cache.local().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_degraded_evict_still_clears_local() {
        let cache = degraded_cache();
        cache
            .local()
            .unwrap()
            .put("u1", CacheEntry::new(Bytes::from("stale")));

        let err = cache.evict("u1").await.unwrap_err();
        assert_matches!(err, Error::EvictionFailed { .. });
        assert_eq!(cache.local().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_local_only_region() {
        let cache = TieredCache::new("perms", Some(LocalCache::new()), None);
        cache.put("u1", Bytes::from("value")).await;

        assert_eq!(cache.get("u1").await, Some(Bytes::from("value")));
        cache.evict("u1").await.unwrap();
        assert!(cache.get("u1").await.is_none());
    }

    #[tokio::test]
    async fn test_remote_only_region() {
        let backend = Arc::new(InMemoryRemoteBackend::new());
        let remote = RemoteTier::new("perms", backend, RemoteTierConfig::default());
        let cache = TieredCache::new("perms", None, Some(remote));

        cache.put("u1", Bytes::from("value")).await;
        assert_eq!(cache.get("u1").await, Some(Bytes::from("value")));
        assert!(cache.local().is_none());
    }
}
