//! Cache Registry - Region Ownership
//!
//! The registry owns every cache region in the process. A region is
//! materialized on first access and lives for the registry's lifetime, so
//! repeated lookups of the same name return the same instance. The
//! registry is constructed once at startup and passed by reference; there
//! is no global state.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument};

use super::local::{LocalCache, LocalCacheConfig};
use super::remote::{RemoteBackend, RemoteTier, RemoteTierConfig};
use super::tiered::TieredCache;
use crate::error::{Error, Result};

/// Tier configuration for one region
#[derive(Debug, Clone)]
pub struct RegionProfile {
    /// Local tier settings; `None` disables the local tier
    pub local: Option<LocalCacheConfig>,
    /// Remote tier settings, applied when the registry has a backend
    pub remote: RemoteTierConfig,
}

impl Default for RegionProfile {
    fn default() -> Self {
        Self {
            local: Some(LocalCacheConfig::default()),
            remote: RemoteTierConfig::default(),
        }
    }
}

/// Registry configuration
pub struct RegistryConfig {
    /// Shared remote backend; `None` disables the remote tier everywhere
    pub backend: Option<Arc<dyn RemoteBackend>>,
    /// Profile applied to regions without an explicit entry
    pub default_profile: RegionProfile,
    /// Per-region profile overrides, keyed by region name
    pub profiles: HashMap<String, RegionProfile>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: None,
            default_profile: RegionProfile::default(),
            profiles: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("has_backend", &self.backend.is_some())
            .field("profiles", &self.profiles.len())
            .finish()
    }
}

/// Owner of all cache regions in the process
pub struct CacheRegistry {
    regions: DashMap<String, Arc<TieredCache>>,
    backend: Option<Arc<dyn RemoteBackend>>,
    default_profile: RegionProfile,
    profiles: HashMap<String, RegionProfile>,
}

impl CacheRegistry {
    /// Build a registry, rejecting configurations that would produce a
    /// region with no tier at all.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        if config.backend.is_none() {
            if config.default_profile.local.is_none() {
                return Err(Error::Config(
                    "default profile disables the local tier and no remote backend is configured"
                        .to_string(),
                ));
            }
            for (name, profile) in &config.profiles {
                if profile.local.is_none() {
                    return Err(Error::Config(format!(
                        "profile for region '{}' disables the local tier and no remote backend is configured",
                        name
                    )));
                }
            }
        }

        Ok(Self {
            regions: DashMap::new(),
            backend: config.backend,
            default_profile: config.default_profile,
            profiles: config.profiles,
        })
    }

    /// Registry backed by a fresh in-memory remote backend, for tests and
    /// single-node use
    pub fn in_memory() -> Self {
        Self {
            regions: DashMap::new(),
            backend: Some(Arc::new(super::remote::InMemoryRemoteBackend::new())),
            default_profile: RegionProfile::default(),
            profiles: HashMap::new(),
        }
    }

    /// Get a region, materializing it on first access.
    ///
    /// Concurrent first accesses of the same name construct exactly one
    /// region; every caller gets the same instance.
    #[instrument(skip(self))]
    pub fn region(&self, name: &str) -> Arc<TieredCache> {
        if let Some(existing) = self.regions.get(name) {
            return Arc::clone(&existing);
        }

        let created = self
            .regions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(self.build_region(name)));
        Arc::clone(&created)
    }

    /// Get a region only if it was already materialized
    pub fn peek(&self, name: &str) -> Option<Arc<TieredCache>> {
        self.regions.get(name).map(|region| Arc::clone(&region))
    }

    /// Names of all materialized regions
    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn build_region(&self, name: &str) -> TieredCache {
        let profile = self.profiles.get(name).unwrap_or(&self.default_profile);

        let local = profile.local.clone().map(LocalCache::with_config);
        let remote = self.backend.as_ref().map(|backend| {
            RemoteTier::new(name, Arc::clone(backend), profile.remote.clone())
        });

        info!(
            region = name,
            local = local.is_some(),
            remote = remote.is_some(),
            "cache region materialized"
        );
        TieredCache::new(name, local, remote)
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("regions", &self.regions.len())
            .field("has_backend", &self.backend.is_some())
            .finish()
    }
}
