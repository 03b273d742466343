//! TTL cache for successful GitHub response bodies

use bytes::Bytes;
use moka::future::Cache;
use std::time::Duration;

use crate::metrics::METRICS;

/// Response bodies keyed by `Accept` header and URL.
///
/// Entries may be stale for up to the TTL; callers only use the data as
/// advisory context.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Option<Cache<String, Bytes>>,
}

impl ResponseCache {
    /// Create a cache with TTL and max entry count
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            entries: Some(
                Cache::builder()
                    .max_capacity(max_entries)
                    .time_to_live(ttl)
                    .build(),
            ),
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self { entries: None }
    }

    fn key(accept: &str, url: &str) -> String {
        format!("{} {}", accept, url)
    }

    pub async fn get(&self, accept: &str, url: &str) -> Option<Bytes> {
        let entries = self.entries.as_ref()?;
        let hit = entries.get(&Self::key(accept, url)).await;
        METRICS.record_cache_lookup(hit.is_some());
        hit
    }

    pub async fn insert(&self, accept: &str, url: &str, body: Bytes) {
        if let Some(entries) = &self.entries {
            entries.insert(Self::key(accept, url), body).await;
        }
    }

    /// Approximate number of live entries
    pub fn len(&self) -> u64 {
        self.entries.as_ref().map_or(0, |c| c.entry_count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_store_and_get() {
        let cache = ResponseCache::new(Duration::from_secs(60), 100);
        cache
            .insert("application/json", "https://api/x", Bytes::from_static(b"{}"))
            .await;

        assert_eq!(
            cache.get("application/json", "https://api/x").await,
            Some(Bytes::from_static(b"{}"))
        );
        // same URL under a different media type is a different entry
        assert!(cache.get("application/vnd.github.v3.diff", "https://api/x").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_expiration() {
        let cache = ResponseCache::new(Duration::from_millis(100), 100);
        cache.insert("a", "u", Bytes::from_static(b"1")).await;
        assert!(cache.get("a", "u").await.is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.get("a", "u").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache() {
        let cache = ResponseCache::disabled();
        cache.insert("a", "u", Bytes::from_static(b"1")).await;
        assert!(cache.get("a", "u").await.is_none());
        assert!(cache.is_empty());
    }
}
