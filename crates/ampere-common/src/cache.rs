//! Process-wide refreshing cache
//!
//! Holds values that must be fetched from an external source and kept fresh,
//! such as a storage credential token. The cache is created once at process
//! start, handed out behind an `Arc`, and torn down with [`RefreshingCache::shutdown`].

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Source of truth for cached values
#[async_trait]
pub trait ValueFetcher<K, V>: Send + Sync {
    async fn fetch(&self, key: &K) -> anyhow::Result<V>;
}

/// Cache with read-through `get` and an optional background refresh task
pub struct RefreshingCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<K, V>,
    fetcher: Arc<dyn ValueFetcher<K, V>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> RefreshingCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: Arc<dyn ValueFetcher<K, V>>, max_capacity: u64) -> Self {
        Self {
            cache: Cache::new(max_capacity),
            fetcher,
            refresh_task: Mutex::new(None),
        }
    }

    /// Return the cached value, fetching it on a miss.
    ///
    /// Concurrent misses for the same key share a single fetch.
    pub async fn get(&self, key: &K) -> anyhow::Result<V> {
        let fetcher = self.fetcher.clone();
        let owned_key = key.clone();
        self.cache
            .try_get_with(key.clone(), async move { fetcher.fetch(&owned_key).await })
            .await
            .map_err(|e| anyhow::anyhow!("failed to fetch cached value for {:?}: {}", key, e))
    }

    /// Re-fetch every known key. Failures keep the previous value.
    ///
    /// Returns the number of keys successfully refreshed.
    pub async fn refresh_all(&self) -> usize {
        self.cache.run_pending_tasks().await;
        let keys: Vec<K> = self.cache.iter().map(|(k, _)| (*k).clone()).collect();

        let mut refreshed = 0;
        for key in keys {
            match self.fetcher.fetch(&key).await {
                Ok(value) => {
                    self.cache.insert(key, value).await;
                    refreshed += 1;
                }
                Err(e) => {
                    warn!(key = ?key, error = %e, "Cache refresh failed, keeping previous value");
                }
            }
        }
        debug!(refreshed, "Cache refresh completed");
        refreshed
    }

    /// Spawn the background refresh loop. Calling it again replaces the loop.
    pub fn start_refresh(self: &Arc<Self>, interval: Duration) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.refresh_all().await;
            }
        });

        let mut task = self.refresh_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background refresh loop
    pub fn shutdown(&self) {
        let mut task = self.refresh_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }
}

impl<K, V> Drop for RefreshingCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct CountingFetcher {
        calls: AtomicU32,
        fail: AtomicBool,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ValueFetcher<String, String> for CountingFetcher {
        async fn fetch(&self, key: &String) -> anyhow::Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("token endpoint unavailable");
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("{}-{}", key, n))
        }
    }

    #[tokio::test]
    async fn test_get_fetches_once() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = RefreshingCache::new(fetcher.clone(), 16);

        assert_eq!(cache.get(&"db".to_string()).await.unwrap(), "db-1");
        assert_eq!(cache.get(&"db".to_string()).await.unwrap(), "db-1");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_all_replaces_values() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = RefreshingCache::new(fetcher.clone(), 16);

        cache.get(&"db".to_string()).await.unwrap();
        assert_eq!(cache.refresh_all().await, 1);
        assert_eq!(cache.get(&"db".to_string()).await.unwrap(), "db-2");
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_value() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = RefreshingCache::new(fetcher.clone(), 16);

        cache.get(&"db".to_string()).await.unwrap();
        fetcher.fail.store(true, Ordering::SeqCst);
        assert_eq!(cache.refresh_all().await, 0);
        assert_eq!(cache.get(&"db".to_string()).await.unwrap(), "db-1");
    }

    #[tokio::test]
    async fn test_get_propagates_fetch_error() {
        let fetcher = Arc::new(CountingFetcher::new());
        fetcher.fail.store(true, Ordering::SeqCst);
        let cache = RefreshingCache::new(fetcher, 16);

        let err = cache.get(&"db".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("token endpoint unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh() {
        let fetcher = Arc::new(CountingFetcher::new());
        let cache = Arc::new(RefreshingCache::new(fetcher.clone(), 16));
        cache.get(&"db".to_string()).await.unwrap();

        cache.start_refresh(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(fetcher.calls.load(Ordering::SeqCst) >= 2);
        cache.shutdown();
    }
}
