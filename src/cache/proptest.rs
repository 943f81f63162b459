//! Property-Based Tests for the Local Tier
//!
//! Exercises the bounded-capacity and lookup contracts with generated
//! workloads instead of hand-picked cases.

#![cfg(test)]

use bytes::Bytes;
use proptest::prelude::*;
use std::time::Duration;

use super::entry::CacheEntry;
use super::local::{LocalCache, LocalCacheConfig};

fn bounded_cache(capacity: usize) -> LocalCache {
    LocalCache::with_config(LocalCacheConfig {
        capacity,
        ttl: Duration::ZERO,
        high_watermark: 0.90,
        low_watermark: 0.70,
        // a full batch can always drain back below the low watermark
        eviction_batch: capacity,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_capacity_is_never_exceeded(
        capacity in 4usize..64,
        inserts in 1usize..256,
    ) {
        let cache = bounded_cache(capacity);
        for i in 0..inserts {
            cache.put(format!("k{}", i), CacheEntry::new(Bytes::from_static(b"v")));
            prop_assert!(cache.len() <= capacity);
        }
    }

    #[test]
    fn prop_put_then_get_round_trips(
        key in "[a-z0-9:-]{1,32}",
        value in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let cache = LocalCache::new();
        cache.put(key.clone(), CacheEntry::new(Bytes::from(value.clone())));
        prop_assert_eq!(cache.get(&key), Some(Bytes::from(value)));
    }

    #[test]
    fn prop_removed_keys_miss(
        key in "[a-z0-9:-]{1,32}",
        value in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let cache = LocalCache::new();
        cache.put(key.clone(), CacheEntry::new(Bytes::from(value)));
        cache.remove(&key);
        prop_assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn prop_clear_reports_and_removes_everything(count in 0usize..64) {
        let cache = LocalCache::new();
        for i in 0..count {
            cache.put(format!("k{}", i), CacheEntry::new(Bytes::from_static(b"v")));
        }
        prop_assert_eq!(cache.clear(), count);
        prop_assert!(cache.is_empty());
    }
}
