#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cache Coherence (§4.7): a read-through response cache in front of the
//! Snapshot Service and Route Scorer.
//!
//! Keys are deterministic fingerprints of the query shape; entries carry
//! the grid version they were produced under, and a successful rebuild
//! or ingest bumps that version, so a stale entry is treated as a miss
//! rather than actively purged (§7: `Stale` is an internal signal, never
//! surfaced). TTL bounds staleness even if the version never advances.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use saferoute_scoring_models::{CategoryOverrides, TimeOfDay};

/// Default cache TTL (§4.7): 15 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// The query dimensions that distinguish one cached response from
/// another (§4.7). `spatial_key` is caller-supplied: a bbox's
/// canonical string form for snapshots, or a polyline hash for route
/// scoring.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKeyInput<'a> {
    pub operation: &'a str,
    pub spatial_key: &'a str,
    pub lookback_months: u8,
    pub time_of_day: Option<TimeOfDay>,
    pub category_overrides: &'a CategoryOverrides,
    pub current_month_yyyymm: &'a str,
}

/// Computes the deterministic cache key for one query (§4.7).
///
/// Hashes a canonical textual join of every dimension rather than a
/// structured serialization, so key derivation never depends on a
/// `serde` format's field ordering.
#[must_use]
pub fn fingerprint(input: &CacheKeyInput<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.operation.as_bytes());
    hasher.update(b"|");
    hasher.update(input.spatial_key.as_bytes());
    hasher.update(b"|");
    hasher.update(input.lookback_months.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(input.time_of_day.map_or("none", |t| t.as_ref()).as_bytes());
    hasher.update(b"|");
    for (category, weight) in input.category_overrides {
        hasher.update(category.as_ref().as_bytes());
        hasher.update(b"=");
        hasher.update(weight.to_string().as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"|");
    hasher.update(input.current_month_yyyymm.as_bytes());

    hex::encode(hasher.finalize())
}

struct CacheEntry<T> {
    value: T,
    version: i64,
    expires_at: Instant,
}

/// A read-through cache keyed by [`fingerprint`], holding one response
/// type `T`.
///
/// Shared across requests via `Arc` (or a process-wide static); internal
/// mutability is via `DashMap`, matching the concurrent-map pattern the
/// rest of the stack uses for in-process shared state.
pub struct ResponseCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl: Duration,
}

impl<T: Clone> ResponseCache<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    /// Returns the cached value for `key` if present, unexpired, and
    /// produced under `current_version`; otherwise a miss (§4.7,
    /// §7 `Stale`).
    #[must_use]
    pub fn get(&self, key: &str, current_version: i64) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            log::debug!("cache entry {key} expired");
            return None;
        }
        if entry.version < current_version {
            log::debug!("cache entry {key} stale: version {} < {current_version}", entry.version);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Inserts or replaces the cached value for `key`, stamped with the
    /// grid version it was produced under.
    pub fn put(&self, key: String, value: T, version: i64) {
        self.entries.insert(
            key,
            CacheEntry { value, version, expires_at: Instant::now() + self.ttl },
        );
    }

    /// Drops every entry. Used by admin operations that want a clean
    /// slate rather than waiting out TTL + version checks.
    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn key_input(overrides: &CategoryOverrides) -> CacheKeyInput<'_> {
        CacheKeyInput {
            operation: "snapshot",
            spatial_key: "-1.41,50.90,-1.39,50.92",
            lookback_months: 12,
            time_of_day: None,
            category_overrides: overrides,
            current_month_yyyymm: "202607",
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let overrides = BTreeMap::new();
        let a = fingerprint(&key_input(&overrides));
        let b = fingerprint(&key_input(&overrides));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_time_of_day() {
        let overrides = BTreeMap::new();
        let mut without_tod = key_input(&overrides);
        let mut with_tod = key_input(&overrides);
        with_tod.time_of_day = Some(TimeOfDay::Night);
        without_tod.time_of_day = None;
        assert_ne!(fingerprint(&without_tod), fingerprint(&with_tod));
    }

    #[test]
    fn get_is_a_miss_before_any_put() {
        let cache: ResponseCache<String> = ResponseCache::default();
        assert_eq!(cache.get("missing", 1), None);
    }

    #[test]
    fn get_returns_value_when_fresh_and_current() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("k".to_string(), "value".to_string(), 1);
        assert_eq!(cache.get("k", 1), Some("value".to_string()));
    }

    #[test]
    fn get_is_a_miss_when_version_advanced() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("k".to_string(), "value".to_string(), 1);
        assert_eq!(cache.get("k", 2), None);
    }

    #[test]
    fn get_is_a_miss_when_ttl_elapsed() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        cache.put("k".to_string(), "value".to_string(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k", 1), None);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("k".to_string(), "value".to_string(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
