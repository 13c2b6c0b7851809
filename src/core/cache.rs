use crate::utils::error::{CloudError, Result};
use moka::future::Cache;
use moka::Expiry;
use std::future::Future;
use std::hash::Hash;
use std::time::{Duration, Instant};

type ExpiryFn<V> = Box<dyn Fn(&V) -> Option<Duration> + Send + Sync>;

/// Caps each entry at the cache TTL or the value's own remaining lifetime,
/// whichever ends first.
struct CappedExpiry<V> {
    ttl: Duration,
    remaining: ExpiryFn<V>,
}

impl<K, V> Expiry<K, V> for CappedExpiry<V> {
    fn expire_after_create(&self, _key: &K, value: &V, _created_at: Instant) -> Option<Duration> {
        Some((self.remaining)(value).map_or(self.ttl, |remaining| remaining.min(self.ttl)))
    }
}

/// Async loading cache with a fixed TTL. Concurrent misses on one key run the
/// loader once and share its result.
pub struct LoadingCache<K, V> {
    ttl: Duration,
    cache: Cache<K, V>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Caps an entry's lifetime by a value-derived remaining lifetime, e.g. a token's expiry.
    pub fn with_expiry(self, remaining: impl Fn(&V) -> Option<Duration> + Send + Sync + 'static) -> Self {
        let expiry = CappedExpiry {
            ttl: self.ttl,
            remaining: Box::new(remaining),
        };
        Self {
            ttl: self.ttl,
            cache: Cache::builder().expire_after(expiry).build(),
        }
    }

    pub async fn get_or_load<F, Fut>(&self, key: &K, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        self.cache
            .try_get_with(key.clone(), loader())
            .await
            .map_err(CloudError::from_shared)
    }

    pub async fn invalidate(&self, key: &K) {
        self.cache.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loads_once_within_ttl() {
        let cache: LoadingCache<String, usize> = LoadingCache::new(Duration::from_secs(60));
        let loads = &AtomicUsize::new(0);
        let key = "k".to_string();
        for _ in 0..3 {
            let value = cache
                .get_or_load(&key, || async move {
                    Ok(loads.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await
                .unwrap();
            assert_eq!(value, 1);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_load() {
        let cache: Arc<LoadingCache<String, usize>> =
            Arc::new(LoadingCache::new(Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(&"shared".to_string(), || async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(loads.fetch_add(1, Ordering::SeqCst))
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 0);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_expiry_reload() {
        let cache: LoadingCache<u8, &'static str> = LoadingCache::new(Duration::from_millis(30));
        let loads = &AtomicUsize::new(0);
        let load = || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok("token")
        };

        cache.get_or_load(&1, load).await.unwrap();
        cache.invalidate(&1).await;
        cache.get_or_load(&1, load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.get_or_load(&1, load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_value_expiry_shortens_ttl() {
        let cache: LoadingCache<u8, u64> =
            LoadingCache::new(Duration::from_secs(3600)).with_expiry(|v| Some(Duration::from_millis(*v)));
        let loads = &AtomicUsize::new(0);
        let load = || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(20u64)
        };
        cache.get_or_load(&1, load).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.get_or_load(&1, load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache: LoadingCache<u8, u64> = LoadingCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_load(&1, || async {
                Err(CloudError::Unauthorized {
                    message: "bad token".into(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Unauthorized { .. }));
        assert_eq!(cache.get_or_load(&1, || async { Ok(7) }).await.unwrap(), 7);
    }
}
