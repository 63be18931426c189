//! Process-wide configuration, loaded from the environment via `envy`.

use std::time::Duration;

use serde::Deserialize;

fn default_fail_closed() -> bool {
    true
}

fn default_fail_closed_reason() -> String {
    "internal error: request could not be evaluated safely".to_string()
}

fn default_drain_deadline_seconds() -> u64 {
    30
}

fn default_regex_timeout_ms() -> u64 {
    1000
}

fn default_rate_limit_table_cap() -> usize {
    100_000
}

fn default_cache_ttl_aggregate_hourly_secs() -> u64 {
    60
}

fn default_cache_ttl_aggregate_default_secs() -> u64 {
    300
}

fn default_cache_ttl_policy_secs() -> u64 {
    60
}

fn default_cache_ttl_credential_secs() -> u64 {
    300
}

/// Gateway-wide configuration. Field names match the environment variables
/// `envy` binds them from (`GATE_FAIL_CLOSED`, `GATE_REGEX_TIMEOUT_MS`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_fail_closed")]
    pub fail_closed: bool,

    #[serde(default = "default_fail_closed_reason")]
    pub fail_closed_reason: String,

    #[serde(default = "default_drain_deadline_seconds")]
    pub drain_deadline_seconds: u64,

    #[serde(default = "default_regex_timeout_ms")]
    pub regex_timeout_ms: u64,

    /// Upper bound on the rate limiter's key table; once reached, inserting
    /// a new `(principal, action)` key evicts an existing one (§6).
    #[serde(default = "default_rate_limit_table_cap")]
    pub rate_limit_table_cap: usize,

    /// TTL for cached aggregate totals on `hourly` windows (§4.4).
    #[serde(default = "default_cache_ttl_aggregate_hourly_secs")]
    pub cache_ttl_aggregate_hourly_secs: u64,

    /// TTL for cached aggregate totals on `daily`/`weekly` windows (§4.4).
    #[serde(default = "default_cache_ttl_aggregate_default_secs")]
    pub cache_ttl_aggregate_default_secs: u64,

    /// TTL for the `policy:{tenant_id}` cache entry (§4.7).
    #[serde(default = "default_cache_ttl_policy_secs")]
    pub cache_ttl_policy_secs: u64,

    /// TTL for the `credential:{secret}` cache entry (§4.7).
    #[serde(default = "default_cache_ttl_credential_secs")]
    pub cache_ttl_credential_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            fail_closed: default_fail_closed(),
            fail_closed_reason: default_fail_closed_reason(),
            drain_deadline_seconds: default_drain_deadline_seconds(),
            regex_timeout_ms: default_regex_timeout_ms(),
            rate_limit_table_cap: default_rate_limit_table_cap(),
            cache_ttl_aggregate_hourly_secs: default_cache_ttl_aggregate_hourly_secs(),
            cache_ttl_aggregate_default_secs: default_cache_ttl_aggregate_default_secs(),
            cache_ttl_policy_secs: default_cache_ttl_policy_secs(),
            cache_ttl_credential_secs: default_cache_ttl_credential_secs(),
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables prefixed `GATE_`,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("GATE_").from_env()
    }

    /// Smallest viable configuration for unit tests: fail-open so a faulty
    /// test double doesn't mask assertions behind a synthetic reject, tight
    /// regex timeout so a runaway pattern fails fast.
    pub fn minimal() -> Self {
        Self {
            fail_closed: false,
            regex_timeout_ms: 50,
            ..Self::default()
        }
    }

    /// Permissive configuration for local development: fail-closed off,
    /// generous regex budget, short cache TTLs so iteration sees fresh
    /// results.
    pub fn permissive() -> Self {
        Self {
            fail_closed: false,
            regex_timeout_ms: 5000,
            cache_ttl_aggregate_hourly_secs: 5,
            cache_ttl_aggregate_default_secs: 5,
            cache_ttl_policy_secs: 5,
            cache_ttl_credential_secs: 5,
            ..Self::default()
        }
    }

    pub fn regex_timeout(&self) -> Duration {
        Duration::from_millis(self.regex_timeout_ms)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.drain_deadline_seconds)
    }

    pub fn cache_ttl_aggregate_hourly(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_aggregate_hourly_secs)
    }

    pub fn cache_ttl_aggregate_default(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_aggregate_default_secs)
    }

    pub fn cache_ttl_policy(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_policy_secs)
    }

    pub fn cache_ttl_credential(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_credential_secs)
    }
}
