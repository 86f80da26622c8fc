//! In-process response cache
//!
//! A TTL+capacity-bounded LRU shared by the metadata and enrichment
//! endpoints. Values are stored as JSON so the cache stays generic over
//! response types; every entry carries the model version it was computed
//! with and is rewritten to the current version on read.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};

use crate::service::clock::Clock;

// Cache key prefixes
const PREFIX_METADATA: &str = "cve:";
const PREFIX_ENRICH: &str = "enrich:";

/// Default entry lifetime: 24 hours.
pub const DEFAULT_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Default capacity in entries.
pub const DEFAULT_CAPACITY: usize = 2000;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: DateTime<Utc>,
    /// Monotonic recency stamp; the smallest stamp is the LRU victim.
    last_used: u64,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tick: u64,
}

/// TTL+capacity-bounded LRU keyed by CVE identifier.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                tick: 0,
            }),
            ttl: Duration::seconds(ttl_seconds),
            capacity,
            clock,
        }
    }

    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL_SECONDS, clock)
    }

    /// Get cached metadata by CVE ID.
    pub fn get_metadata<T: DeserializeOwned>(&self, cve: &str, model_version: &str) -> Option<T> {
        self.get_with_prefix(PREFIX_METADATA, cve, model_version)
    }

    /// Cache metadata by CVE ID.
    pub fn set_metadata<T: Serialize>(&self, cve: &str, data: &T) {
        self.set_with_prefix(PREFIX_METADATA, cve, data);
    }

    /// Get a cached enrichment response by CVE ID.
    pub fn get_enrichment<T: DeserializeOwned>(&self, cve: &str, model_version: &str) -> Option<T> {
        self.get_with_prefix(PREFIX_ENRICH, cve, model_version)
    }

    /// Cache an enrichment response by CVE ID.
    pub fn set_enrichment<T: Serialize>(&self, cve: &str, data: &T) {
        self.set_with_prefix(PREFIX_ENRICH, cve, data);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_with_prefix<T: DeserializeOwned>(
        &self,
        prefix: &str,
        key: &str,
        model_version: &str,
    ) -> Option<T> {
        let full_key = format!("{}{}", prefix, key);
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = matches!(
            inner.entries.get(&full_key),
            Some(entry) if entry.expires_at <= now
        );
        if expired {
            inner.entries.remove(&full_key);
            tracing::debug!(key = %full_key, "Cache entry expired");
            return None;
        }

        inner.tick += 1;
        let tick = inner.tick;
        let entry = inner.entries.get_mut(&full_key)?;
        entry.last_used = tick;

        // Entries written by an older model revision are rewritten with
        // the current tag before being served.
        if entry.value.get("modelVersion").and_then(|v| v.as_str()) != Some(model_version) {
            entry.value["modelVersion"] = serde_json::Value::String(model_version.to_string());
        }

        serde_json::from_value(entry.value.clone()).ok()
    }

    fn set_with_prefix<T: Serialize>(&self, prefix: &str, key: &str, data: &T) {
        let full_key = format!("{}{}", prefix, key);
        let value = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Failed to serialize cache value");
                return;
            }
        };

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        inner.entries.insert(
            full_key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
                last_used: tick,
            },
        );

        if inner.entries.len() > self.capacity {
            if let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(k, _)| k.clone())
            {
                inner.entries.remove(&victim);
                tracing::debug!(key = %victim, "Evicted least-recently-used cache entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::clock::FixedClock;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        answer: u32,
        model_version: String,
    }

    fn payload(version: &str) -> Payload {
        Payload {
            answer: 42,
            model_version: version.to_string(),
        }
    }

    fn fixed_clock(iso: &str) -> Arc<FixedClock> {
        Arc::new(FixedClock(iso.parse().unwrap()))
    }

    #[test]
    fn miss_then_hit() {
        let cache = ResponseCache::with_defaults(fixed_clock("2024-06-01T00:00:00Z"));
        assert_eq!(
            cache.get_enrichment::<Payload>("CVE-2024-0001", "v1"),
            None
        );

        cache.set_enrichment("CVE-2024-0001", &payload("v1"));
        assert_eq!(
            cache.get_enrichment::<Payload>("CVE-2024-0001", "v1"),
            Some(payload("v1"))
        );
    }

    #[test]
    fn metadata_and_enrichment_keys_do_not_collide() {
        let cache = ResponseCache::with_defaults(fixed_clock("2024-06-01T00:00:00Z"));
        cache.set_metadata("CVE-2024-0001", &payload("v1"));
        assert!(cache
            .get_enrichment::<Payload>("CVE-2024-0001", "v1")
            .is_none());
        assert!(cache
            .get_metadata::<Payload>("CVE-2024-0001", "v1")
            .is_some());
    }

    #[test]
    fn expired_entries_are_dropped_on_access() {
        let start: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
        let clock = Arc::new(crate::service::clock::FixedClock(start));
        let cache = ResponseCache::new(10, 60, clock);
        cache.set_enrichment("CVE-2024-0001", &payload("v1"));

        // Same instant: still fresh.
        assert!(cache
            .get_enrichment::<Payload>("CVE-2024-0001", "v1")
            .is_some());

        // Rebuild the cache around a later clock; the entry map carries over.
        let later = Arc::new(crate::service::clock::FixedClock(
            start + Duration::seconds(61),
        ));
        let expired_cache = ResponseCache {
            inner: Mutex::new(CacheInner {
                entries: cache.inner.lock().entries.clone(),
                tick: 0,
            }),
            ttl: Duration::seconds(60),
            capacity: 10,
            clock: later,
        };
        assert!(expired_cache
            .get_enrichment::<Payload>("CVE-2024-0001", "v1")
            .is_none());
        assert!(expired_cache.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let cache = ResponseCache::new(2, DEFAULT_TTL_SECONDS, fixed_clock("2024-06-01T00:00:00Z"));
        cache.set_enrichment("CVE-2024-0001", &payload("v1"));
        cache.set_enrichment("CVE-2024-0002", &payload("v1"));

        // Touch 0001 so 0002 becomes the LRU victim.
        assert!(cache
            .get_enrichment::<Payload>("CVE-2024-0001", "v1")
            .is_some());

        cache.set_enrichment("CVE-2024-0003", &payload("v1"));
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get_enrichment::<Payload>("CVE-2024-0001", "v1")
            .is_some());
        assert!(cache
            .get_enrichment::<Payload>("CVE-2024-0002", "v1")
            .is_none());
        assert!(cache
            .get_enrichment::<Payload>("CVE-2024-0003", "v1")
            .is_some());
    }

    #[test]
    fn stale_model_version_is_rewritten_on_read() {
        let cache = ResponseCache::with_defaults(fixed_clock("2024-06-01T00:00:00Z"));
        cache.set_enrichment("CVE-2024-0001", &payload("v1"));

        let got: Payload = cache.get_enrichment("CVE-2024-0001", "v2").unwrap();
        assert_eq!(got.model_version, "v2");

        // The rewrite is persistent, not just on the returned copy.
        let again: Payload = cache.get_enrichment("CVE-2024-0001", "v2").unwrap();
        assert_eq!(again.model_version, "v2");
    }
}
