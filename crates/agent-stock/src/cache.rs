//! TTL cache for market data responses

use crate::config::StockConfig;
use cached::{Cached, TimedCache};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key for a market data request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized ticker symbol
    pub symbol: String,
    /// Which data set, e.g. `"info"` or `"history"`
    pub endpoint: &'static str,
    /// Request detail such as the history period; empty when unused
    pub detail: String,
}

impl CacheKey {
    pub fn new(symbol: impl Into<String>, endpoint: &'static str) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint,
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Shared, cloneable TTL cache of JSON tool results
#[derive(Clone)]
pub struct StockCache {
    cache: Arc<RwLock<TimedCache<CacheKey, Value>>>,
}

impl StockCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a live value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        // Expired entries are evicted on lookup, which needs write access.
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value, or run `fetcher` and cache its success
    ///
    /// Failures are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(value) = self.get(&key).await {
            debug!(symbol = %key.symbol, endpoint = key.endpoint, "Cache hit");
            return Ok(value);
        }

        debug!(symbol = %key.symbol, endpoint = key.endpoint, "Cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Caches split by how quickly their data goes stale
#[derive(Clone)]
pub struct CacheManager {
    /// Price history
    pub realtime: StockCache,
    /// Company summaries and analyst recommendations
    pub fundamental: StockCache,
}

impl CacheManager {
    pub fn new(realtime_ttl: Duration, fundamental_ttl: Duration) -> Self {
        Self {
            realtime: StockCache::new(realtime_ttl),
            fundamental: StockCache::new(fundamental_ttl),
        }
    }

    pub fn from_config(config: &StockConfig) -> Self {
        Self::new(config.cache_ttl_realtime, config.cache_ttl_fundamental)
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.realtime.clear().await;
        self.fundamental.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_detail_distinguishes_requests() {
        let month = CacheKey::new("AAPL", "history").with_detail("1mo");
        let year = CacheKey::new("AAPL", "history").with_detail("1y");
        assert_ne!(month, year);
        assert_eq!(CacheKey::new("AAPL", "info").detail, "");
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "info");
        let value = json!({"longName": "Apple Inc."});

        let mut call_count = 0;
        let result = cache
            .get_or_fetch(key.clone(), || {
                call_count += 1;
                async { Ok::<_, String>(value.clone()) }
            })
            .await
            .unwrap();
        assert_eq!(result, value);

        let result = cache
            .get_or_fetch(key, || {
                call_count += 1;
                async { Ok::<_, String>(json!(null)) }
            })
            .await
            .unwrap();
        assert_eq!(result, value);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = StockCache::new(Duration::from_secs(60));
        let key = CacheKey::new("NOPE", "info");

        let failed = cache
            .get_or_fetch(key.clone(), || async { Err::<Value, _>("boom") })
            .await;
        assert!(failed.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_manager_clear_all() {
        let manager = CacheManager::from_config(&StockConfig::default());
        let key = CacheKey::new("MSFT", "history").with_detail("5d");

        manager.realtime.insert(key.clone(), json!("| Date |")).await;
        manager.fundamental.insert(key, json!({})).await;
        assert_eq!(manager.realtime.len().await, 1);

        manager.clear_all().await;
        assert!(manager.realtime.is_empty().await);
        assert!(manager.fundamental.is_empty().await);
    }
}
