//! Two-Tier Entitlement Cache
//!
//! Caching layer for authorization-sensitive reads, built from two tiers
//! per named region:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ Local Tier (per process)                    │
//! │ in-memory, bounded, short TTL               │
//! ├─────────────────────────────────────────────┤
//! │ Remote Tier (shared)                        │
//! │ authoritative, long TTL, survives restarts  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - The remote tier is authoritative; the local tier only ever holds
//!   values the remote tier has already seen
//! - A failing remote tier degrades reads to misses instead of failing them
//! - Regions are independent: their keys, TTLs, and metrics never mix

use std::time::Duration;

mod entry;
mod local;
mod metrics;
mod registry;
mod remote;
mod tiered;

#[cfg(test)]
mod proptest;

pub use entry::{CacheEntry, EntryMetadata};
pub use local::{LocalCache, LocalCacheConfig, LocalStats};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use registry::{CacheRegistry, RegionProfile, RegistryConfig};
pub use remote::{
    InMemoryRemoteBackend, RemoteBackend, RemoteBackendStats, RemoteTier, RemoteTierConfig,
    RemoteTierStats,
};
pub use tiered::TieredCache;

/// Canonical region name for per-user permission sets
pub const USER_PERMISSIONS: &str = "user_permissions";

/// Default local tier capacity in entries
pub const DEFAULT_LOCAL_CAPACITY: usize = 10_000;

/// Default local tier TTL. Kept short so processes without an event
/// transport still converge on authorization changes within a minute.
pub const DEFAULT_LOCAL_TTL: Duration = Duration::from_secs(60);

/// Default remote tier TTL
pub const DEFAULT_REMOTE_TTL: Duration = Duration::from_secs(3600);

/// Default budget for a single remote operation
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(2);
