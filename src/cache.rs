//! Cache Layer (C6): best-effort TTL cache with graceful degradation.
//!
//! Every operation degrades to a cache miss (or a silent no-op) rather than
//! propagating an error — a cache outage must never turn into a gateway
//! outage (§4.6).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Behavior every cache backend must provide. Implementations must never
/// return `Err` to callers for transient backend failures; they should
/// degrade to `Ok(None)` / `Ok(false)` / `Ok(())` instead, as the in-memory
/// implementation below does trivially.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String, ttl: Duration);
    async fn delete(&self, key: &str);
    /// Delete every key whose prefix matches `prefix` (used for coarse
    /// tenant-wide aggregate-cache invalidation, §4.4).
    async fn delete_matching(&self, prefix: &str);
    /// Whether the backend is currently reachable. A degraded backend is
    /// still safe to call — it just always misses.
    fn is_available(&self) -> bool {
        true
    }
}

/// Always-miss cache, used when no backend is configured.
#[derive(Debug, Default)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) {}

    async fn delete(&self, _key: &str) {}

    async fn delete_matching(&self, _prefix: &str) {}

    fn is_available(&self) -> bool {
        false
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local TTL cache. Suitable as the default backend for tests and
/// the demo binary; a deployment with multiple gateway processes would
/// swap this for a shared backend behind the same trait.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    async fn delete_matching(&self, prefix: &str) {
        self.entries.lock().retain(|k, _| !k.starts_with(prefix));
    }
}
