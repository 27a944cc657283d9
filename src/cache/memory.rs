use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{CacheBackend, CacheError};

/// Process-local backend with per-key expiry. Can be switched offline to
/// behave like an unreachable Redis.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
    offline: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .values()
            .filter(|(_, expires)| expires.map_or(true, |at| at > now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_online(&self) -> Result<(), CacheError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Unreachable);
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.ensure_online()?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let expired = matches!(entries.get(key), Some((_, Some(expires))) if *expires <= now);
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        self.ensure_online()?;
        let expires = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), Some(expires)));
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        self.ensure_online()?;
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let expired = matches!(entries.get(key), Some((_, Some(expires))) if *expires <= now);
        if expired {
            entries.remove(key);
        }
        let current = match entries.get(key) {
            Some((value, _)) => value
                .parse::<i64>()
                .map_err(|_| CacheError::Corrupt(format!("`{value}` is not an integer")))?,
            None => 0,
        };
        let next = current + 1;
        // INCR keeps the existing expiry; counters created here never expire
        let expires = entries.get(key).and_then(|(_, expires)| *expires);
        entries.insert(key.to_string(), (next.to_string(), expires));
        Ok(next)
    }
}
