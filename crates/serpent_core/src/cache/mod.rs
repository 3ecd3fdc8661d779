//! Bounded, time-limited async cache.
//!
//! # Responsibility
//! - Hold upstream lookups (key sets, access tokens) for a fixed TTL.
//! - Bound memory with an entry capacity and LRU eviction.
//!
//! # Invariants
//! - An entry is never served after its TTL elapses.
//! - Instances are owned by their consumer; nothing is process-global.

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// Capacity- and TTL-bounded map with LRU eviction.
#[derive(Clone)]
pub struct TtlCache<K, V> {
    inner: Cache<K, V>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { inner, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    /// Returns the entry for `key`, running `init` on a miss.
    ///
    /// Concurrent misses on one key await a single `init`. Errors are
    /// shared with every waiter and never cached.
    pub async fn try_get_with<F, E>(&self, key: K, init: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        self.inner.try_get_with(key, init).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate entry count after pending maintenance is applied.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::TtlCache;
    use std::time::Duration;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(50), 10);
        cache.insert("k".to_string(), 1_u32).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(1));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }

    #[tokio::test]
    async fn capacity_is_bounded() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        for key in 0..10_u32 {
            cache.insert(key, key).await;
        }
        assert!(cache.entry_count().await <= 2);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert(1_u32, "one").await;
        cache.invalidate(&1).await;
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test]
    async fn try_get_with_runs_init_once_and_skips_errors() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        let failed = cache
            .try_get_with(1_u32, async { Err::<&str, _>("down") })
            .await;
        assert_eq!(*failed.unwrap_err(), "down");

        let value = cache
            .try_get_with(1, async { Ok::<_, &str>("up") })
            .await
            .unwrap();
        assert_eq!(value, "up");
        let cached = cache
            .try_get_with(1, async { Ok::<_, &str>("again") })
            .await
            .unwrap();
        assert_eq!(cached, "up");
    }
}
