//! In-process key/value cache with per-entry expiry.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

struct Slot<V> {
    value: V,
    expires_at: Instant,
}

/// Shared TTL cache. Cloning yields another handle to the same entries.
///
/// Expired entries are dropped lazily on read, or in bulk by [`TtlCache::purge_expired`].
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<K, Slot<V>>>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        TtlCache {
            ttl: self.ttl,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(slot) if slot.expires_at > Instant::now() => return Some(slot.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // expired
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|slot| slot.expires_at <= Instant::now())
        {
            entries.remove(key);
        }
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        let slot = Slot {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(key, slot);
    }

    pub async fn invalidate(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, slot| slot.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_fresh_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert(1u32, "alice".to_string()).await;

        assert_eq!(cache.get(&1).await.as_deref(), Some("alice"));
        assert_eq!(cache.get(&2).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.insert("k", 7).await;

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get(&"k").await, Some(7));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&"k").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert(1u32, 10u32).await;

        assert!(cache.invalidate(&1).await);
        assert!(!cache.invalidate(&1).await);
        assert_eq!(cache.get(&1).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.insert(1u32, ()).await;
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.insert(2u32, ()).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&2).await, Some(()));
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let other = cache.clone();
        cache.insert("a", 1).await;
        assert_eq!(other.get(&"a").await, Some(1));
    }
}
