//! KEV catalog store
//!
//! Process-wide index of the CISA Known Exploited Vulnerabilities catalog.
//! Bootstraps lazily from a compact cache file or the bundled fallback,
//! serves lock-free membership reads off an `Arc` snapshot, and refreshes
//! from the upstream feed with conditional requests. A failed refresh
//! always leaves the previous snapshot intact.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::kev::{KevEntry, KevFile};
use crate::service::clock::Clock;
use crate::upstream::{KevFeedClient, KevFeedResponse};

/// Immutable view of the KEV dataset.
///
/// Writers build a whole new snapshot and publish it behind one reference;
/// readers capture the reference once per operation and never observe a
/// partially-updated set.
#[derive(Debug, Default)]
pub struct KevSnapshot {
    set: HashSet<String>,
    meta: HashMap<String, KevEntry>,
    etag: Option<String>,
    last_modified: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl KevSnapshot {
    fn from_parts(
        entries: Vec<KevEntry>,
        etag: Option<String>,
        last_modified: Option<String>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut set = HashSet::with_capacity(entries.len());
        let mut meta = HashMap::with_capacity(entries.len());
        for entry in entries {
            set.insert(entry.cve_id.clone());
            meta.insert(entry.cve_id.clone(), entry);
        }
        Self {
            set,
            meta,
            etag,
            last_modified,
            updated_at,
        }
    }

    pub fn contains(&self, cve_id: &str) -> bool {
        self.set.contains(cve_id)
    }

    pub fn entry(&self, cve_id: &str) -> Option<&KevEntry> {
        self.meta.get(cve_id)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshOutcome {
    pub changed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Process-wide KEV catalog manager.
pub struct KevStore {
    snapshot: RwLock<Arc<KevSnapshot>>,
    /// Serializes bootstrap and refresh; membership reads never take it.
    refresh_lock: tokio::sync::Mutex<()>,
    bootstrapped: AtomicBool,
    cache_path: PathBuf,
    fallback_path: PathBuf,
    feed: KevFeedClient,
    clock: Arc<dyn Clock>,
}

impl KevStore {
    pub fn new(
        cache_path: impl Into<PathBuf>,
        fallback_path: impl Into<PathBuf>,
        feed: KevFeedClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(KevSnapshot::default())),
            refresh_lock: tokio::sync::Mutex::new(()),
            bootstrapped: AtomicBool::new(false),
            cache_path: cache_path.into(),
            fallback_path: fallback_path.into(),
            feed,
            clock,
        }
    }

    /// Current snapshot. Cheap; clones one `Arc`.
    pub fn snapshot(&self) -> Arc<KevSnapshot> {
        self.snapshot.read().clone()
    }

    /// Membership check against the current snapshot.
    pub fn contains(&self, cve_id: &str) -> bool {
        self.snapshot().contains(cve_id)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot().updated_at()
    }

    /// Bootstrap the store if it has not been initialized yet.
    ///
    /// Order: compact cache file, then bundled fallback (copied to the
    /// cache location), then an empty dataset.
    pub async fn ensure_ready(&self) {
        if self.bootstrapped.load(Ordering::Acquire) {
            return;
        }
        let _guard = self.refresh_lock.lock().await;
        self.bootstrap_locked().await;
    }

    /// Refresh from the upstream feed. Idempotent; shared by the scheduler
    /// and the manual trigger. Never fails: any error preserves the prior
    /// snapshot and reports `changed: false`.
    pub async fn refresh(&self) -> RefreshOutcome {
        let _guard = self.refresh_lock.lock().await;
        self.bootstrap_locked().await;

        let current = self.snapshot();
        let result = self
            .feed
            .fetch(current.etag.as_deref(), current.last_modified.as_deref())
            .await;

        match result {
            Ok(KevFeedResponse::NotModified) => {
                tracing::info!("KEV feed unchanged (304)");
                RefreshOutcome {
                    changed: false,
                    updated_at: current.updated_at,
                }
            }
            Ok(KevFeedResponse::Fetched {
                entries,
                etag,
                last_modified,
            }) => {
                let updated_at = self.clock.now();
                let file = KevFile {
                    etag: etag.clone(),
                    last_modified: last_modified.clone(),
                    updated_at,
                    items: entries.clone(),
                };

                if let Err(e) = self.persist(&file).await {
                    tracing::warn!(error = %e, "Failed to persist KEV snapshot, keeping previous dataset");
                    return RefreshOutcome {
                        changed: false,
                        updated_at: current.updated_at,
                    };
                }

                let next = Arc::new(KevSnapshot::from_parts(
                    entries,
                    etag,
                    last_modified,
                    Some(updated_at),
                ));
                let count = next.len();
                *self.snapshot.write() = next;

                tracing::info!(entries = count, "KEV catalog refreshed");
                RefreshOutcome {
                    changed: true,
                    updated_at: Some(updated_at),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "KEV refresh failed, keeping previous dataset");
                RefreshOutcome {
                    changed: false,
                    updated_at: current.updated_at,
                }
            }
        }
    }

    /// Must be called while holding `refresh_lock`.
    async fn bootstrap_locked(&self) {
        if self.bootstrapped.load(Ordering::Acquire) {
            return;
        }

        let snapshot = if let Some(file) = read_kev_file(&self.cache_path).await {
            tracing::info!(
                path = %self.cache_path.display(),
                entries = file.items.len(),
                "KEV catalog bootstrapped from cache file"
            );
            snapshot_from_file(file)
        } else if let Some(file) = read_kev_file(&self.fallback_path).await {
            // Seed the cache location so the next boot skips the fallback.
            if let Err(e) = tokio::fs::copy(&self.fallback_path, &self.cache_path).await {
                tracing::warn!(error = %e, "Failed to seed KEV cache file from fallback");
            }
            tracing::info!(
                path = %self.fallback_path.display(),
                entries = file.items.len(),
                "KEV catalog bootstrapped from bundled fallback"
            );
            snapshot_from_file(file)
        } else {
            tracing::warn!(reason = "bootstrap_missing", "No KEV cache or fallback file, starting empty");
            KevSnapshot::default()
        };

        *self.snapshot.write() = Arc::new(snapshot);
        self.bootstrapped.store(true, Ordering::Release);
    }

    async fn persist(&self, file: &KevFile) -> std::io::Result<()> {
        let json = serde_json::to_vec(file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Temp file + rename so a crash mid-write never corrupts the cache.
        let tmp = self.cache_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.cache_path).await?;
        Ok(())
    }
}

fn snapshot_from_file(file: KevFile) -> KevSnapshot {
    let mut seen = HashSet::new();
    let items: Vec<KevEntry> = file
        .items
        .into_iter()
        .map(KevEntry::trimmed)
        .filter(|entry| !entry.cve_id.is_empty() && seen.insert(entry.cve_id.clone()))
        .collect();

    KevSnapshot::from_parts(items, file.etag, file.last_modified, Some(file.updated_at))
}

async fn read_kev_file(path: &Path) -> Option<KevFile> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse KEV file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::clock::FixedClock;

    fn test_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock("2024-06-01T00:00:00Z".parse().unwrap()))
    }

    fn unreachable_feed() -> KevFeedClient {
        // Connection refused; exercises the error-preserves-state path.
        KevFeedClient::with_feed_url("http://127.0.0.1:1/kev.json")
    }

    fn compact_file(ids: &[&str]) -> KevFile {
        KevFile {
            etag: Some("\"etag-1\"".to_string()),
            last_modified: Some("Wed, 01 May 2024 00:00:00 GMT".to_string()),
            updated_at: "2024-05-01T00:00:00Z".parse().unwrap(),
            items: ids
                .iter()
                .map(|id| KevEntry {
                    cve_id: id.to_string(),
                    date_added: Some("2024-01-01".to_string()),
                    vendor_project: Some("Vendor".to_string()),
                    product: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn bootstraps_from_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("kev-cache.json");
        std::fs::write(
            &cache,
            serde_json::to_vec(&compact_file(&["CVE-2021-44228"])).unwrap(),
        )
        .unwrap();

        let store = KevStore::new(
            &cache,
            dir.path().join("kev-fallback.json"),
            unreachable_feed(),
            test_clock(),
        );
        store.ensure_ready().await;

        assert!(store.contains("CVE-2021-44228"));
        assert!(!store.contains("CVE-2024-0001"));
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(
            store.updated_at(),
            Some("2024-05-01T00:00:00Z".parse().unwrap())
        );
    }

    #[tokio::test]
    async fn bootstraps_from_fallback_and_seeds_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("kev-cache.json");
        let fallback = dir.path().join("kev-fallback.json");
        std::fs::write(
            &fallback,
            serde_json::to_vec(&compact_file(&["CVE-2023-1234"])).unwrap(),
        )
        .unwrap();

        let store = KevStore::new(&cache, &fallback, unreachable_feed(), test_clock());
        store.ensure_ready().await;

        assert!(store.contains("CVE-2023-1234"));
        assert!(cache.exists(), "fallback should be copied to the cache path");
    }

    #[tokio::test]
    async fn bootstraps_empty_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = KevStore::new(
            dir.path().join("kev-cache.json"),
            dir.path().join("kev-fallback.json"),
            unreachable_feed(),
            test_clock(),
        );
        store.ensure_ready().await;

        assert!(store.snapshot().is_empty());
        assert_eq!(store.updated_at(), None);
    }

    #[tokio::test]
    async fn failed_refresh_preserves_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("kev-cache.json");
        std::fs::write(
            &cache,
            serde_json::to_vec(&compact_file(&["CVE-2021-44228"])).unwrap(),
        )
        .unwrap();

        let store = KevStore::new(
            &cache,
            dir.path().join("kev-fallback.json"),
            unreachable_feed(),
            test_clock(),
        );
        store.ensure_ready().await;
        let before = store.snapshot();

        let outcome = store.refresh().await;
        assert!(!outcome.changed);
        assert_eq!(outcome.updated_at, before.updated_at());

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after), "snapshot must not be replaced");
        assert!(after.contains("CVE-2021-44228"));
    }

    #[tokio::test]
    async fn persisted_snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("kev-cache.json");
        let store = KevStore::new(
            &cache,
            dir.path().join("kev-fallback.json"),
            unreachable_feed(),
            test_clock(),
        );

        let file = compact_file(&["CVE-2021-44228", "CVE-2023-1234"]);
        store.persist(&file).await.unwrap();

        let reloaded = KevStore::new(
            &cache,
            dir.path().join("kev-fallback.json"),
            unreachable_feed(),
            test_clock(),
        );
        reloaded.ensure_ready().await;

        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("CVE-2021-44228"));
        assert!(snapshot.contains("CVE-2023-1234"));
        assert_eq!(
            snapshot.entry("CVE-2021-44228").unwrap().vendor_project.as_deref(),
            Some("Vendor")
        );
        assert_eq!(snapshot.updated_at(), Some(file.updated_at));
    }

    #[tokio::test]
    async fn every_member_has_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("kev-cache.json");
        std::fs::write(
            &cache,
            serde_json::to_vec(&compact_file(&["CVE-2021-44228", "CVE-2023-1234"])).unwrap(),
        )
        .unwrap();

        let store = KevStore::new(
            &cache,
            dir.path().join("kev-fallback.json"),
            unreachable_feed(),
            test_clock(),
        );
        store.ensure_ready().await;

        let snapshot = store.snapshot();
        for id in ["CVE-2021-44228", "CVE-2023-1234"] {
            assert!(snapshot.contains(id));
            assert!(snapshot.entry(id).is_some());
        }
    }
}
