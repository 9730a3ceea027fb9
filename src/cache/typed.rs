//! Typed read-through cache over Moka.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use moka::sync::Cache;
use tracing::trace;

use super::CacheConfig;

/// Named cache shared by clones.
///
/// Values are loaded on a miss and dropped by [`TypedCache::invalidate`] on
/// writes. Two concurrent misses may both load; the later insert wins.
/// A load that overlaps an invalidation of its key is returned but not
/// cached.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    /// Bumped by every invalidation of the key
    generations: Arc<DashMap<K, u64>>,
    name: Arc<str>,
}

// moka's Cache is already a shared handle, so cloning needs no K/V bounds
impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            generations: Arc::clone(&self.generations),
            name: Arc::clone(&self.name),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner: builder.build(),
            generations: Arc::new(DashMap::new()),
            name: name.into(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Cached value for `key`, or the result of `load` which is then cached.
    /// Errors are returned as is and nothing is cached.
    pub async fn get_or_try_load<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.inner.get(&key) {
            return Ok(value);
        }
        trace!("{} cache miss", self.name);
        let seen = self.generation(&key);
        let value = load().await?;

        // The entry guard orders this check against a concurrent invalidate
        let current = self.generations.entry(key.clone()).or_insert(0);
        if *current == seen {
            self.inner.insert(key, value.clone());
        } else {
            trace!("{} load raced an invalidation, not cached", self.name);
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) {
        let mut generation = self.generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        self.inner.invalidate(key);
    }

    fn generation(&self, key: &K) -> u64 {
        self.generations.get(key).map_or(0, |g| *g)
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> TypedCache<i64, String> {
        TypedCache::new("test", CacheConfig::default())
    }

    #[test]
    fn test_invalidate_is_shared_between_clones() {
        let cache = cache();
        cache.insert(1, "one".to_string());
        assert_eq!(cache.get(&1).as_deref(), Some("one"));

        cache.clone().invalidate(&1);
        assert_eq!(cache.get(&1), None);
    }

    #[tokio::test]
    async fn test_loads_once_then_serves_cached() {
        let cache = cache();
        let first: Result<String, ()> = cache.get_or_try_load(7, || async { Ok("db".to_string()) }).await;
        assert_eq!(first.as_deref(), Ok("db"));

        let second: Result<String, ()> = cache
            .get_or_try_load(7, || async { Ok("again".to_string()) })
            .await;
        assert_eq!(second.as_deref(), Ok("db"));
    }

    #[tokio::test]
    async fn test_load_overlapping_invalidate_is_not_cached() {
        let cache: TypedCache<i64, bool> = TypedCache::new("test", CacheConfig::default());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let load = cache.get_or_try_load(1, || async move {
            rx.await.ok();
            Ok::<_, ()>(true)
        });
        let write = async {
            cache.invalidate(&1);
            tx.send(()).ok();
        };
        let (loaded, ()) = tokio::join!(load, write);

        assert_eq!(loaded, Ok(true));
        assert_eq!(cache.get(&1), None);

        let reloaded = cache.get_or_try_load(1, || async { Ok::<_, ()>(false) }).await;
        assert_eq!(reloaded, Ok(false));
        assert_eq!(cache.get(&1), Some(false));
    }

    #[tokio::test]
    async fn test_load_error_is_not_cached() {
        let cache = cache();
        let failed: Result<String, &str> = cache.get_or_try_load(3, || async { Err("down") }).await;
        assert_eq!(failed, Err("down"));
        assert_eq!(cache.get(&3), None);
    }
}
