//! Read-through cache for the venue listing query.
//!
//! Listing keys embed a namespace generation:
//! `{namespace}:g{generation}:page={page}&limit={limit}&sections={0|1}`.
//! Invalidation increments `{namespace}:generation`, which makes every key of
//! older generations unreachable at once; the orphaned entries expire by TTL.
//!
//! The cache is an optimization only. Every backend call is bounded by a
//! timeout, and any failure is logged and reported to the caller as
//! [`CacheLookup::Unavailable`], never as an error.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::models::ListingQuery;

pub mod memory;

pub use memory::MemoryCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache backend unreachable")]
    Unreachable,
    #[error("unexpected cache value: {0}")]
    Corrupt(String),
}

/// Minimal key/value surface the listing cache needs.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;

    /// Atomically increments an integer key (missing keys count as 0).
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Serialized listing, to be returned verbatim.
    Hit(String),
    /// Nothing cached; store the fresh result under this key.
    Miss(String),
    /// Cache disabled or failing; go to the store and skip caching.
    Unavailable,
}

#[derive(Clone)]
pub struct ListingCache {
    backend: Option<Arc<dyn CacheBackend>>,
    namespace: String,
    ttl_seconds: u64,
    op_timeout: Duration,
}

impl ListingCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend: Some(backend),
            namespace: config.namespace.clone(),
            ttl_seconds: config.ttl_seconds,
            op_timeout: config.op_timeout(),
        }
    }

    /// A cache that never hits; every listing is read from the store.
    pub fn disabled(config: &CacheConfig) -> Self {
        Self {
            backend: None,
            namespace: config.namespace.clone(),
            ttl_seconds: config.ttl_seconds,
            op_timeout: config.op_timeout(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn generation_key(&self) -> String {
        format!("{}:generation", self.namespace)
    }

    pub fn listing_key(&self, generation: i64, query: &ListingQuery) -> String {
        format!(
            "{}:g{}:page={}&limit={}&sections={}",
            self.namespace,
            generation,
            query.page,
            query.limit,
            u8::from(query.include_sections)
        )
    }

    pub async fn lookup(&self, query: &ListingQuery) -> CacheLookup {
        let Some(backend) = &self.backend else {
            return CacheLookup::Unavailable;
        };

        let generation = match self.bounded(backend.get(&self.generation_key())).await {
            Ok(raw) => match parse_generation(raw) {
                Ok(generation) => generation,
                Err(e) => {
                    warn!("Listing cache bypassed: {}", e);
                    return CacheLookup::Unavailable;
                }
            },
            Err(e) => {
                warn!("Listing cache bypassed, generation read failed: {}", e);
                return CacheLookup::Unavailable;
            }
        };

        let key = self.listing_key(generation, query);
        match self.bounded(backend.get(&key)).await {
            Ok(Some(payload)) => {
                debug!("Listing cache hit {}", key);
                CacheLookup::Hit(payload)
            }
            Ok(None) => CacheLookup::Miss(key),
            Err(e) => {
                warn!("Listing cache bypassed, read of {} failed: {}", key, e);
                CacheLookup::Unavailable
            }
        }
    }

    pub async fn store(&self, key: &str, payload: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = self
            .bounded(backend.set_ex(key, payload, self.ttl_seconds))
            .await
        {
            warn!("Failed to cache listing {}: {}", key, e);
        }
    }

    /// Drops every listing key by moving to the next generation.
    /// Returns `false` when the cache could not be reached; entries written
    /// before the failure stay servable until their TTL runs out.
    pub async fn invalidate(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };
        match self.bounded(backend.incr(&self.generation_key())).await {
            Ok(generation) => {
                debug!("Listing cache moved to generation {}", generation);
                true
            }
            Err(e) => {
                warn!(
                    "Listing cache invalidation failed, stale listings possible for up to {}s: {}",
                    self.ttl_seconds, e
                );
                false
            }
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}

fn parse_generation(raw: Option<String>) -> Result<i64, CacheError> {
    match raw {
        None => Ok(0),
        Some(value) => value
            .parse::<i64>()
            .map_err(|_| CacheError::Corrupt(format!("generation `{value}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CacheConfig {
        CacheConfig {
            namespace: "venues:list".to_string(),
            ttl_seconds: 300,
            timeout_ms: 50,
        }
    }

    fn query(page: u32, limit: u32, include_sections: bool) -> ListingQuery {
        ListingQuery {
            page,
            limit,
            include_sections,
        }
    }

    #[test]
    fn keys_depend_only_on_parameters_and_generation() {
        let cache = ListingCache::disabled(&config());

        assert_eq!(
            cache.listing_key(3, &query(2, 20, true)),
            "venues:list:g3:page=2&limit=20&sections=1"
        );
        assert_eq!(
            cache.listing_key(3, &query(2, 20, true)),
            cache.listing_key(3, &query(2, 20, true))
        );
        assert_ne!(
            cache.listing_key(3, &query(2, 20, true)),
            cache.listing_key(3, &query(2, 20, false))
        );
        assert_ne!(
            cache.listing_key(3, &query(2, 20, true)),
            cache.listing_key(4, &query(2, 20, true))
        );
        assert_eq!(cache.generation_key(), "venues:list:generation");
    }

    #[tokio::test]
    async fn miss_then_hit_returns_stored_payload() {
        let cache = ListingCache::new(Arc::new(MemoryCache::new()), &config());
        let q = query(1, 20, false);

        let CacheLookup::Miss(key) = cache.lookup(&q).await else {
            panic!("expected a miss on an empty cache");
        };
        cache.store(&key, r#"{"venues":[]}"#).await;

        assert_eq!(
            cache.lookup(&q).await,
            CacheLookup::Hit(r#"{"venues":[]}"#.to_string())
        );
    }

    #[tokio::test]
    async fn invalidate_hides_every_existing_key() {
        let cache = ListingCache::new(Arc::new(MemoryCache::new()), &config());
        for q in [query(1, 20, false), query(2, 5, true)] {
            let CacheLookup::Miss(key) = cache.lookup(&q).await else {
                panic!("expected a miss");
            };
            cache.store(&key, "cached").await;
        }

        assert!(cache.invalidate().await);

        assert!(matches!(cache.lookup(&query(1, 20, false)).await, CacheLookup::Miss(_)));
        assert!(matches!(cache.lookup(&query(2, 5, true)).await, CacheLookup::Miss(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_reported_as_unavailable() {
        let backend = Arc::new(MemoryCache::new());
        backend.set_offline(true);
        let cache = ListingCache::new(backend, &config());

        assert_eq!(cache.lookup(&query(1, 20, false)).await, CacheLookup::Unavailable);
        assert!(!cache.invalidate().await);
        cache.store("any", "payload").await;
    }

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let cache = ListingCache::disabled(&config());
        assert!(!cache.is_enabled());
        assert_eq!(cache.lookup(&query(1, 20, false)).await, CacheLookup::Unavailable);
        assert!(!cache.invalidate().await);
    }

    #[tokio::test]
    async fn garbage_generation_bypasses_the_cache() {
        let backend = Arc::new(MemoryCache::new());
        backend.set_ex("venues:list:generation", "oops", 60).await.unwrap();
        let cache = ListingCache::new(backend, &config());

        assert_eq!(cache.lookup(&query(1, 20, false)).await, CacheLookup::Unavailable);
    }

    struct StalledBackend;

    #[async_trait]
    impl CacheBackend for StalledBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn incr(&self, _key: &str) -> Result<i64, CacheError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let cache = ListingCache::new(Arc::new(StalledBackend), &config());
        assert_eq!(cache.lookup(&query(1, 20, false)).await, CacheLookup::Unavailable);
        assert!(!cache.invalidate().await);
    }
}
