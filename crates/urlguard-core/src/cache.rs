//! Bounded TTL cache for merged lookup verdicts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::Verdict;

#[derive(Debug, Clone)]
struct CacheEntry {
    verdict: Verdict,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    /// Keys in write order; the front is the next eviction candidate.
    order: VecDeque<String>,
    ttl: Duration,
    max_entries: usize,
}

impl CacheInner {
    fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_entries,
        }
    }

    fn get(&self, key: &str) -> Option<Verdict> {
        self.map.get(key).and_then(|entry| {
            if Instant::now() < entry.expires_at {
                Some(entry.verdict.clone())
            } else {
                None
            }
        })
    }

    fn put(&mut self, key: String, verdict: Verdict) {
        self.prune_expired();

        if self.map.contains_key(&key) {
            // Overwrite counts as a fresh write for eviction ordering.
            self.order.retain(|existing| *existing != key);
        } else if self.max_entries > 0 && self.map.len() >= self.max_entries {
            self.evict_oldest();
        }

        let expires_at = Instant::now() + self.ttl;
        self.order.push_back(key.clone());
        self.map.insert(key, CacheEntry { verdict, expires_at });
    }

    fn evict_oldest(&mut self) {
        while let Some(key) = self.order.pop_front() {
            if self.map.remove(&key).is_some() {
                return;
            }
        }
    }

    fn prune_expired(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, entry| entry.expires_at > now);
        let map = &self.map;
        self.order.retain(|key| map.contains_key(key));
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn live_len(&self) -> usize {
        let now = Instant::now();
        self.map
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }
}

/// Thread-safe, bounded, time-expiring store for merged verdicts.
///
/// Caching is best-effort by contract: reads on a disabled cache miss,
/// writes on a disabled cache are dropped, and no caller ever observes a
/// cache failure as a lookup failure. Expiry is lazy (checked on read and
/// pruned on write); once `max_entries` live entries exist, the
/// oldest-written entry is evicted to make room.
#[derive(Debug, Clone)]
pub struct VerdictCache {
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl VerdictCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new(ttl, max_entries))),
        }
    }

    /// A cache that stores nothing. A zero TTL is the disabled sentinel:
    /// every entry written would already be expired.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub async fn is_disabled(&self) -> bool {
        let store = self.inner.read().await;
        store.ttl == Duration::ZERO
    }

    /// Cached verdict for the key, unless absent, expired, or disabled.
    pub async fn get(&self, key: &str) -> Option<Verdict> {
        let store = self.inner.read().await;
        if store.ttl == Duration::ZERO {
            return None;
        }
        store.get(key)
    }

    /// Insert or overwrite. No-op when disabled.
    pub async fn put(&self, key: impl Into<String>, verdict: Verdict) {
        let mut store = self.inner.write().await;
        if store.ttl == Duration::ZERO {
            return;
        }
        store.put(key.into(), verdict);
    }

    /// Empty the cache. Used for test isolation and operational reset.
    pub async fn clear(&self) {
        let mut store = self.inner.write().await;
        store.clear();
    }

    /// Current live (unexpired) entry count.
    pub async fn len(&self) -> usize {
        let store = self.inner.read().await;
        store.live_len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(flag: bool) -> Verdict {
        if flag {
            Verdict::malicious(
                "test",
                crate::ThreatType::Malware,
                crate::ThreatLevel::High,
                1.0,
            )
        } else {
            Verdict::safe("test")
        }
    }

    #[tokio::test]
    async fn basic_get_put_overwrite() {
        let cache = VerdictCache::new(Duration::from_secs(60), 16);

        assert!(cache.get("k1").await.is_none());

        cache.put("k1", verdict(false)).await;
        assert!(!cache.get("k1").await.expect("cached").is_malicious);

        cache.put("k1", verdict(true)).await;
        assert!(cache.get("k1").await.expect("cached").is_malicious);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_never_returned() {
        let cache = VerdictCache::new(Duration::from_millis(50), 16);

        cache.put("k1", verdict(true)).await;
        assert!(cache.get("k1").await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("k1").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn capacity_bound_evicts_oldest_write() {
        let cache = VerdictCache::new(Duration::from_secs(60), 3);

        for key in ["a", "b", "c", "d", "e"] {
            cache.put(key, verdict(false)).await;
        }

        assert_eq!(cache.len().await, 3);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("c").await.is_some());
        assert!(cache.get("e").await.is_some());
    }

    #[tokio::test]
    async fn overwrite_refreshes_eviction_order() {
        let cache = VerdictCache::new(Duration::from_secs(60), 2);

        cache.put("a", verdict(false)).await;
        cache.put("b", verdict(false)).await;
        cache.put("a", verdict(true)).await;
        cache.put("c", verdict(false)).await;

        // "b" was the oldest write once "a" was rewritten.
        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let cache = VerdictCache::disabled();
        assert!(cache.is_disabled().await);

        cache.put("k1", verdict(true)).await;
        assert!(cache.get("k1").await.is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn clear_empties_the_cache() {
        let cache = VerdictCache::new(Duration::from_secs(60), 16);
        cache.put("k1", verdict(false)).await;
        cache.put("k2", verdict(false)).await;

        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
