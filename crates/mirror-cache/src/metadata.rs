//! In-memory metadata store backed by moka

use crate::key::CacheKey;
use crate::types::{CacheEntry, CacheStats};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Time-bounded key → [`CacheEntry`] table
///
/// Entries are hints for serving hits (content type) and never decide
/// freshness. Cloning shares the same table and counters.
#[derive(Clone)]
pub struct MetadataStore {
    entries: Cache<String, CacheEntry>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl MetadataStore {
    const MAX_ENTRIES: u64 = 10_000;

    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, Self::MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up metadata for `key`, counting the lookup as a hit or miss
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key.as_str()).await;
        if entry.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        entry
    }

    /// Record metadata for a persisted object, replacing any previous entry
    pub async fn insert(&self, entry: CacheEntry) {
        self.entries.insert(entry.key.clone(), entry).await;
    }

    pub async fn stats(&self) -> CacheStats {
        // entry_count lags behind until pending maintenance has run
        self.entries.run_pending_tasks().await;
        CacheStats {
            entries: self.entries.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(key: &CacheKey, content_type: &str) -> CacheEntry {
        CacheEntry {
            key: key.as_str().to_string(),
            content_type: content_type.to_string(),
            size: 4,
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MetadataStore::new(Duration::from_secs(3600));
        let key = CacheKey::from_request_path("/npm/a/b.css").unwrap();

        assert!(store.get(&key).await.is_none());
        store.insert(entry(&key, "text/css")).await;

        let found = store.get(&key).await.unwrap();
        assert_eq!(found.content_type, "text/css");
        assert_eq!(found.size, 4);
    }

    #[tokio::test]
    async fn test_later_insert_wins() {
        let store = MetadataStore::new(Duration::from_secs(3600));
        let key = CacheKey::from_request_path("/npm/a/b.js").unwrap();

        store.insert(entry(&key, "text/plain")).await;
        store.insert(entry(&key, "application/javascript")).await;

        let found = store.get(&key).await.unwrap();
        assert_eq!(found.content_type, "application/javascript");
        assert_eq!(store.stats().await.entries, 1);
    }

    #[tokio::test]
    async fn test_lookup_counters() {
        let store = MetadataStore::new(Duration::from_secs(3600));
        let key = CacheKey::from_request_path("/gh/user/repo/x.js").unwrap();

        store.get(&key).await;
        store.insert(entry(&key, "application/javascript")).await;
        store.get(&key).await;
        store.get(&key).await;

        let stats = store.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MetadataStore::new(Duration::from_millis(200));
        let key = CacheKey::from_request_path("/npm/a/b.css").unwrap();

        store.insert(entry(&key, "text/css")).await;
        assert!(store.get(&key).await.is_some());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(store.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MetadataStore::new(Duration::from_secs(3600));
        let other = store.clone();
        let key = CacheKey::from_request_path("/npm/a/b.css").unwrap();

        other.insert(entry(&key, "text/css")).await;
        assert!(store.get(&key).await.is_some());
        assert_eq!(other.stats().await.hits, 1);
    }
}
