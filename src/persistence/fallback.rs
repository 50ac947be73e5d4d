//! In-memory store used while the backend is unavailable.
//!
//! Entries keep their serialized bytes so reads go through the same
//! deserialization and corruption handling as the backend path. Expiry is
//! per entry through a moka [`Expiry`] policy.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One fallback entry
#[derive(Debug, Clone)]
pub struct FallbackEntry {
    pub value: Arc<Vec<u8>>,
    pub ttl: Option<Duration>,
    pub created_at: DateTime<Utc>,
}

struct EntryExpiry;

impl Expiry<String, FallbackEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &FallbackEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &FallbackEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Bounded map with per-key time to live
#[derive(Clone)]
pub struct ExpiringCache {
    cache: Cache<String, FallbackEntry>,
}

impl ExpiringCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache }
    }

    pub async fn insert(&self, key: String, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = FallbackEntry {
            value: Arc::new(value),
            ttl,
            created_at: Utc::now(),
        };
        self.cache.insert(key, entry).await;
    }

    pub async fn get(&self, key: &str) -> Option<FallbackEntry> {
        self.cache.get(key).await
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.cache.get(key).await.is_some()
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.cache.remove(key).await.is_some()
    }

    /// Keys starting with `prefix`; expired entries are skipped
    pub fn keys(&self, prefix: &str) -> Vec<String> {
        self.cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<(String, FallbackEntry)> {
        self.cache
            .iter()
            .map(|(key, entry)| (key.as_ref().clone(), entry))
            .collect()
    }

    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Drop expired entries now instead of lazily
    pub async fn purge_expired(&self) -> u64 {
        let before = self.cache.entry_count();
        self.cache.run_pending_tasks().await;
        before.saturating_sub(self.cache.entry_count())
    }

    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_remove() {
        let cache = ExpiringCache::new(100);
        cache.insert("agent:a1".to_string(), b"v".to_vec(), None).await;

        let entry = cache.get("agent:a1").await.unwrap();
        assert_eq!(entry.value.as_slice(), b"v");
        assert!(cache.remove("agent:a1").await);
        assert!(!cache.contains("agent:a1").await);
    }

    #[tokio::test]
    async fn test_per_key_ttl() {
        let cache = ExpiringCache::new(100);
        cache
            .insert("task:short".to_string(), b"s".to_vec(), Some(Duration::from_millis(100)))
            .await;
        cache.insert("task:long".to_string(), b"l".to_vec(), None).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get("task:short").await.is_none());
        assert!(cache.get("task:long").await.is_some());
        assert_eq!(cache.keys("task:"), vec!["task:long".to_string()]);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = ExpiringCache::new(100);
        cache.insert("a:1".to_string(), vec![1], None).await;
        cache.insert("a:2".to_string(), vec![2], None).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
