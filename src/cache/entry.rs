//! Cache Entry Types
//!
//! An entry pairs an opaque serialized value with the metadata the local
//! tier needs for expiry and eviction decisions. Values are `Bytes` so
//! clones between tiers share the underlying buffer.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

// =============================================================================
// Entry Metadata
// =============================================================================

/// Metadata tracked per cached entry
#[derive(Debug)]
pub struct EntryMetadata {
    /// When the entry was created
    created: Instant,
    /// Per-entry TTL override; `None` falls back to the tier default
    ttl: Option<Duration>,
    /// Last access timestamp in epoch seconds, for eviction scoring
    last_access: AtomicU64,
    /// Number of accesses since creation
    access_count: AtomicU32,
}

impl EntryMetadata {
    fn now_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            ttl: None,
            last_access: AtomicU64::new(Self::now_epoch()),
            access_count: AtomicU32::new(0),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::new()
        }
    }

    /// Record an access, updating last-access time and count
    pub fn record_access(&self) -> u32 {
        self.last_access
            .store(Self::now_epoch(), Ordering::Relaxed);
        self.access_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn access_count(&self) -> u32 {
        self.access_count.load(Ordering::Relaxed)
    }

    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Relaxed)
    }

    pub fn ttl_override(&self) -> Option<Duration> {
        self.ttl
    }

    /// Check whether the entry has outlived its TTL. The override wins over
    /// the tier default; an effective TTL of zero disables expiry.
    pub fn is_expired(&self, default_ttl: Duration) -> bool {
        let effective = self.ttl.unwrap_or(default_ttl);
        !effective.is_zero() && self.created.elapsed() > effective
    }

    /// Eviction score: idle seconds divided by access frequency.
    /// Higher scores are evicted first.
    pub fn eviction_score(&self) -> f64 {
        let idle = Self::now_epoch().saturating_sub(self.last_access()) as f64;
        let frequency = self.access_count() as f64;
        idle / (frequency + 1.0)
    }
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EntryMetadata {
    fn clone(&self) -> Self {
        Self {
            created: self.created,
            ttl: self.ttl,
            last_access: AtomicU64::new(self.last_access()),
            access_count: AtomicU32::new(self.access_count()),
        }
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A cached value with its tracking metadata
#[derive(Clone)]
pub struct CacheEntry {
    /// Tracking metadata
    pub metadata: EntryMetadata,
    /// Opaque serialized value
    value: Bytes,
}

impl CacheEntry {
    pub fn new(value: Bytes) -> Self {
        Self {
            metadata: EntryMetadata::new(),
            value,
        }
    }

    pub fn with_ttl(value: Bytes, ttl: Duration) -> Self {
        Self {
            metadata: EntryMetadata::with_ttl(ttl),
            value,
        }
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn record_access(&self) -> u32 {
        self.metadata.record_access()
    }

    pub fn is_expired(&self, default_ttl: Duration) -> bool {
        self.metadata.is_expired(default_ttl)
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("len", &self.len())
            .field("access_count", &self.metadata.access_count())
            .field("ttl_override", &self.metadata.ttl_override())
            .finish()
    }
}
