//! Aggregate Accountant (C3): cumulative sum/count limits over a rolling
//! or calendar window, backed by the store and fronted by the cache.

use std::time::Duration;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};

use crate::cache::Cache;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::store::{AggregateQuery, Store};
use crate::types::{AggregateLimitSpec, Scope, Window};

/// Truncate `now` to the start of the window `w` covers (§4.4). Rolling
/// windows are never truncated — they slide with `now`.
pub fn window_start(w: &Window, now: DateTime<Utc>) -> DateTime<Utc> {
    match w {
        Window::Hourly => Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), now.hour(), 0, 0)
            .single()
            .expect("valid hour truncation"),
        Window::Daily => Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .expect("valid day truncation"),
        Window::Weekly => {
            let days_since_monday = now.weekday().num_days_from_monday() as i64;
            let monday = now.date_naive() - ChronoDuration::days(days_since_monday);
            Utc.with_ymd_and_hms(monday.year(), monday.month(), monday.day(), 0, 0, 0)
                .single()
                .expect("valid week truncation")
        }
        Window::RollingHours(n) => now - ChronoDuration::hours(*n as i64),
    }
}

/// Cache-key bucket id for a window: a calendar identifier stable across
/// requests landing in the same bucket, so concurrent callers converge on
/// one cache entry rather than each minting their own.
fn bucket_id(w: &Window, window_start: DateTime<Utc>) -> String {
    match w {
        Window::Daily => window_start.format("%Y%m%d").to_string(),
        Window::Hourly | Window::RollingHours(_) => window_start.format("%Y%m%d%H").to_string(),
        Window::Weekly => window_start.format("%Y%W").to_string(),
    }
}

/// Cache key: `agg:{tenant_id}:{scope_key}:{bucket}`. Two distinct
/// `aggregate_limit` specs sharing a tenant/scope/bucket collide in the
/// cache; that risk is accepted rather than widening the key with the
/// metric path.
fn cache_key(tenant_id: &str, scope_key: &str, bucket: &str) -> String {
    format!("agg:{tenant_id}:{scope_key}:{bucket}")
}

fn scope_key(scope: Scope, principal_name: &str, action_type: &str) -> String {
    match scope {
        Scope::Principal => principal_name.to_string(),
        Scope::Action => action_type.to_string(),
        Scope::Tenant => "*".to_string(),
    }
}

pub struct AggregateAccountant<'a> {
    pub store: &'a dyn Store,
    pub cache: &'a dyn Cache,
    pub config: &'a GateConfig,
}

impl<'a> AggregateAccountant<'a> {
    pub fn new(store: &'a dyn Store, cache: &'a dyn Cache, config: &'a GateConfig) -> Self {
        Self { store, cache, config }
    }

    /// TTL for a cached aggregate total. Rolling windows are never cached —
    /// their bucket never stabilizes since `now` is part of the key's
    /// meaning.
    fn cache_ttl(&self, w: &Window) -> Option<Duration> {
        match w {
            Window::Hourly => Some(self.config.cache_ttl_aggregate_hourly()),
            Window::Daily | Window::Weekly => Some(self.config.cache_ttl_aggregate_default()),
            Window::RollingHours(_) => None,
        }
    }

    /// Current cumulative total for `spec`, scoped per `spec.scope`, as of
    /// `now`. Cache-then-store; non-rolling windows are cached per
    /// [`cache_ttl`].
    /// `write_cache` gates populating a fresh cache entry after a store
    /// miss — simulation mode passes `false` so a what-if check leaves no
    /// trace in the cache.
    pub async fn current_total(
        &self,
        tenant_id: &str,
        principal_name: &str,
        action_type: &str,
        spec: &AggregateLimitSpec,
        now: DateTime<Utc>,
        write_cache: bool,
    ) -> Result<f64, GateError> {
        let start = window_start(&spec.window, now);
        let bucket = bucket_id(&spec.window, start);
        let scope_k = scope_key(spec.scope, principal_name, action_type);
        let key = cache_key(tenant_id, &scope_k, &bucket);

        if !spec.window.is_rolling() {
            if let Some(cached) = self.cache.get(&key).await {
                if let Ok(total) = cached.parse::<f64>() {
                    return Ok(total);
                }
            }
        }

        let total = self
            .store
            .aggregate_total(AggregateQuery {
                tenant_id,
                principal_name,
                action_type,
                param_path: &spec.param_path,
                measure: spec.measure,
                scope: spec.scope,
                window_start: start,
            })
            .await?;

        if write_cache {
            if let Some(ttl) = self.cache_ttl(&spec.window) {
                self.cache.set(&key, total.to_string(), ttl).await;
            }
        }

        Ok(total)
    }

    /// Invalidate every cached aggregate total for a tenant. Coarse
    /// (tenant-wide, not per-bucket) by design — simplicity over
    /// precision, since a stale cache entry self-heals within its TTL
    /// regardless (§9 open question, preserved as observed).
    pub async fn invalidate_tenant(&self, tenant_id: &str) {
        self.cache.delete_matching(&format!("agg:{tenant_id}:")).await;
    }
}
