//! Short-TTL cache of raw catalog responses.
//!
//! Get-or-fetch-and-store keyed by `chapter_{id}`, `images_{id}`,
//! `manga_{id}`, `feed_{id}_{query}` and `search_{query}`. Entries are only
//! evicted by expiry: a read that finds an expired entry removes it, and
//! every insert purges whatever else has expired.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct CachedResponse {
    body: Value,
    fetched_at: Instant,
}

impl CachedResponse {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// In-memory response cache shared by clones of a catalog client.
#[derive(Clone)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CachedResponse>>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Live body for `key`, if any. An expired entry is removed.
    pub async fn get(&self, key: &str) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(cached) if !cached.is_expired(self.ttl) => return Some(cached.body.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|cached| cached.is_expired(self.ttl)) {
            entries.remove(key);
        }
        None
    }

    /// Store `body` under `key`, purging expired entries first.
    pub async fn insert(&self, key: String, body: Value) {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        entries.retain(|_, cached| !cached.is_expired(ttl));
        entries.insert(key, CachedResponse { body, fetched_at: Instant::now() });
    }

    /// Drop expired entries.
    pub async fn purge_expired(&self) {
        let ttl = self.ttl;
        let mut entries = self.entries.write().await;
        entries.retain(|_, cached| !cached.is_expired(ttl));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache.insert("chapter_1".into(), json!({"ok": true})).await;
        assert_eq!(cache.get("chapter_1").await, Some(json!({"ok": true})));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get("chapter_1").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("chapter_1").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_reads_shrink_cache() {
        let cache = ResponseCache::new(Duration::from_secs(1));
        for n in 0..100 {
            cache.insert(format!("chapter_{n}"), json!(n)).await;
        }
        assert_eq!(cache.len().await, 100);

        tokio::time::advance(Duration::from_secs(5)).await;
        for n in 0..100 {
            assert!(cache.get(&format!("chapter_{n}")).await.is_none());
        }
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_purges_expired_entries() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        cache.insert("manga_a".into(), json!(1)).await;
        cache.insert("manga_b".into(), json!(2)).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.insert("manga_c".into(), json!(3)).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get("manga_c").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        cache.insert("manga_old".into(), json!(1)).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert("manga_new".into(), json!(2)).await;
        tokio::time::advance(Duration::from_secs(5)).await;

        cache.purge_expired().await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("manga_new").await.is_some());
    }
}
