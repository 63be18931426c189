//! Rate Limiter (C2): in-memory sliding window over accepted attempts,
//! keyed by `(principal_name, action_type)` — intentionally not scoped by
//! tenant (§9 open question, preserved as observed).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::types::RateLimitSpec;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

/// Sliding window of accepted-attempt timestamps for one `(principal,
/// action)` key.
struct Window {
    timestamps_ms: Vec<i64>,
}

/// Tracks accepted attempts per key and enforces `max_requests` per
/// `window_seconds`. A key's slot is only consumed on allow — a burst of
/// rejections never exhausts the window (§4.3).
pub struct RateLimiter {
    windows: DashMap<String, Mutex<Window>>,
    capacity: usize,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Unbounded table, suitable for tests and benchmarks where the key
    /// space is small and known.
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Cap the key table at `capacity` entries (§6's `rate_limit_table_cap`
    /// knob). Once full, inserting a key not already present evicts an
    /// arbitrary existing one rather than growing further.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            windows: DashMap::new(),
            capacity,
        }
    }

    fn key(principal_name: &str, action_type: &str) -> String {
        format!("{principal_name}\u{0}{action_type}")
    }

    fn evict_if_at_capacity(&self, key: &str) {
        if self.windows.contains_key(key) || self.windows.len() < self.capacity {
            return;
        }
        if let Some(evict) = self.windows.iter().next().map(|e| e.key().clone()) {
            self.windows.remove(&evict);
        }
    }

    /// Check whether another attempt is allowed under `spec` for this key.
    /// When `Decision::Allow` is returned, the attempt has already been
    /// recorded — this method both checks and records in one atomic step
    /// per key, matching the original prune-then-check-then-record order.
    pub fn check_and_record(
        &self,
        principal_name: &str,
        action_type: &str,
        spec: &RateLimitSpec,
    ) -> Decision {
        let key = Self::key(principal_name, action_type);
        self.evict_if_at_capacity(&key);
        let entry = self
            .windows
            .entry(key)
            .or_insert_with(|| Mutex::new(Window { timestamps_ms: Vec::new() }));
        let mut window = entry.lock();

        let now = now_ms();
        let horizon = now - Duration::from_secs(spec.window_seconds).as_millis() as i64;
        window.timestamps_ms.retain(|&t| t > horizon);

        if window.timestamps_ms.len() as u64 >= spec.max_requests {
            return Decision::Reject {
                retry_after_seconds: Self::retry_after(&window.timestamps_ms, spec, now),
            };
        }

        window.timestamps_ms.push(now);
        Decision::Allow
    }

    /// Like [`Self::check_and_record`] but never records the attempt — used
    /// by simulation mode, which must report what would happen without
    /// mutating rate-limit state.
    pub fn peek(&self, principal_name: &str, action_type: &str, spec: &RateLimitSpec) -> Decision {
        let key = Self::key(principal_name, action_type);
        let Some(entry) = self.windows.get(&key) else {
            return Decision::Allow;
        };
        let mut window = entry.lock();
        let now = now_ms();
        let horizon = now - Duration::from_secs(spec.window_seconds).as_millis() as i64;
        window.timestamps_ms.retain(|&t| t > horizon);

        if window.timestamps_ms.len() as u64 >= spec.max_requests {
            Decision::Reject {
                retry_after_seconds: Self::retry_after(&window.timestamps_ms, spec, now),
            }
        } else {
            Decision::Allow
        }
    }

    fn retry_after(timestamps_ms: &[i64], spec: &RateLimitSpec, now: i64) -> u64 {
        let oldest = timestamps_ms.iter().min().copied().unwrap_or(now);
        let expires_at = oldest + Duration::from_secs(spec.window_seconds).as_millis() as i64;
        ((expires_at - now).max(0) / 1000) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject { retry_after_seconds: u64 },
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}
