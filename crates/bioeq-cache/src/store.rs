//! One keyed namespace of TTL entries behind an async RwLock.
//!
//! Reads never delete; eviction happens only through `purge`.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::entry::{to_chrono, CacheEntry};

pub struct CacheStore<T> {
    name: &'static str,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
}

impl<T> CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: RwLock::new(HashMap::new()) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Payload if the entry is strictly younger than `max_age`.
    pub async fn get(&self, key: &str, max_age: Duration) -> Option<T> {
        let now = Utc::now();
        let entries = self.entries.read().await;
        let hit = entries
            .get(key)
            .filter(|e| e.is_fresh_at(max_age, now))
            .map(|e| e.payload.clone());
        debug!(namespace = self.name, key, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Payload regardless of age.
    pub async fn get_any(&self, key: &str) -> Option<T> {
        self.entries.read().await.get(key).map(|e| e.payload.clone())
    }

    /// Insert or overwrite; the last writer wins.
    pub async fn put(&self, key: &str, payload: T, ttl: Duration) {
        let entry = CacheEntry::new(key, payload, ttl);
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Remove every entry whose age is at least `older_than`; returns the count.
    pub async fn purge(&self, older_than: Duration) -> usize {
        let now = Utc::now();
        let limit = to_chrono(older_than);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.age_at(now) < limit);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(namespace = self.name, removed, "Purged cache entries");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All entries, ordered by key for stable snapshots.
    pub async fn snapshot(&self) -> Vec<CacheEntry<T>> {
        let mut all: Vec<CacheEntry<T>> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Replace contents with previously snapshotted entries.
    pub async fn restore(&self, snapshot: Vec<CacheEntry<T>>) {
        let mut entries = self.entries.write().await;
        entries.clear();
        entries.extend(snapshot.into_iter().map(|e| (e.key.clone(), e)));
    }

    #[cfg(test)]
    pub(crate) async fn insert_entry(&self, entry: CacheEntry<T>) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_put_then_get_within_max_age() {
        let store: CacheStore<String> = CacheStore::new("test");
        store.put("aspirin", "payload".into(), HOUR).await;
        assert_eq!(store.get("aspirin", HOUR).await.as_deref(), Some("payload"));
        assert_eq!(store.get("aspirin", Duration::ZERO).await, None);
        assert_eq!(store.get("missing", HOUR).await, None);
    }

    #[tokio::test]
    async fn test_reads_do_not_delete() {
        let store: CacheStore<u32> = CacheStore::new("test");
        store.put("k", 7, Duration::ZERO).await;
        assert_eq!(store.get("k", Duration::ZERO).await, None);
        assert_eq!(store.get_any("k").await, Some(7));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_overwrite_last_writer_wins() {
        let store: CacheStore<u32> = CacheStore::new("test");
        store.put("k", 1, HOUR).await;
        store.put("k", 2, HOUR).await;
        assert_eq!(store.get("k", HOUR).await, Some(2));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_purge_by_age() {
        let store: CacheStore<u32> = CacheStore::new("test");
        let old = Utc::now() - chrono::Duration::days(40);
        store.insert_entry(CacheEntry::created_at("old", 1, HOUR, old)).await;
        store.put("new", 2, HOUR).await;

        let removed = store.purge(Duration::from_secs(30 * 24 * 3600)).await;
        assert_eq!(removed, 1);
        assert_eq!(store.get_any("old").await, None);
        assert_eq!(store.get_any("new").await, Some(2));

        // Zero window removes everything.
        assert_eq!(store.purge(Duration::ZERO).await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_restore() {
        let a: CacheStore<u32> = CacheStore::new("a");
        a.put("x", 1, HOUR).await;
        a.put("y", 2, HOUR).await;
        let snap = a.snapshot().await;
        assert_eq!(snap.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);

        let b: CacheStore<u32> = CacheStore::new("b");
        b.restore(snap.clone()).await;
        assert_eq!(b.snapshot().await, snap);
    }
}
