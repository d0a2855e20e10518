//! Bounded TTL cache over `lru`.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;

/// LRU cache whose entries also expire after a fixed time-to-live.
pub struct TtlCache<K: Hash + Eq, V: Clone> {
    entries: Mutex<LruCache<K, (V, Instant)>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns the cached value if present and not expired. Expired entries are evicted.
    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, inserted)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        self.entries.lock().await.put(key, (value, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let cache = TtlCache::new(capacity(4), Duration::from_secs(60));
        cache.insert("global", 1.5_f64).await;

        assert_eq!(cache.get(&"global").await, Some(1.5));
        assert_eq!(cache.get(&"other").await, None);
    }

    #[tokio::test]
    async fn test_expired_entries_miss() {
        let cache = TtlCache::new(capacity(4), Duration::ZERO);
        cache.insert("global", 2.0_f64).await;

        assert_eq!(cache.get(&"global").await, None);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let cache = TtlCache::new(capacity(2), Duration::from_secs(60));
        cache.insert(1, "a").await;
        cache.insert(2, "b").await;
        cache.get(&1).await;
        cache.insert(3, "c").await;

        assert_eq!(cache.get(&1).await, Some("a"));
        assert_eq!(cache.get(&2).await, None);
        assert_eq!(cache.get(&3).await, Some("c"));
    }
}
