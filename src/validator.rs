//! Validator (C5): the orchestrator tying credential resolution, policy
//! evaluation, persistence, and the fail-closed envelope together into one
//! public entry point (§4.8).

use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tracing::{info, warn};

use crate::aggregate::AggregateAccountant;
use crate::cache::Cache;
use crate::config::GateConfig;
use crate::credential::CredentialResolver;
use crate::error::GateError;
use crate::notify::NotificationSink;
use crate::policy_engine::PolicyEngine;
use crate::rate_limit::RateLimiter;
use crate::store::Store;
use crate::types::{AuditRecord, BlockedActionEvent, DefaultVerdict, Policy, Verdict};

fn policy_cache_key(tenant_id: &str) -> String {
    format!("policy:{tenant_id}")
}

/// The evaluation-time stand-in for a tenant with no active policy: no
/// rules, default verdict allow (§4.6 step 2).
fn empty_policy(tenant_id: &str) -> Policy {
    let now = Utc::now();
    Policy {
        tenant_id: tenant_id.to_string(),
        name: String::new(),
        version: String::new(),
        rules: Vec::new(),
        default_verdict: DefaultVerdict::Allow,
        active: true,
        created_at: now,
        updated_at: now,
    }
}

/// One proposed action to validate.
pub struct ActionRequest<'a> {
    pub credential: &'a str,
    pub principal_name: &'a str,
    pub action_type: &'a str,
    pub params: Value,
    /// What-if mode: compute the verdict but do not persist an audit
    /// record, mutate cache, consume rate-limit/aggregate state, or fire a
    /// notification.
    pub simulate: bool,
}

pub struct Validator<'a> {
    pub store: &'a dyn Store,
    pub cache: &'a dyn Cache,
    pub rate_limiter: &'a RateLimiter,
    pub notifier: &'a dyn NotificationSink,
    pub config: &'a GateConfig,
}

impl<'a> Validator<'a> {
    /// Evaluate one action request end-to-end. Authorization failures
    /// (`Unauthorized`, `TenantInactive`) are returned as `Err` unchanged —
    /// the fail-closed envelope never masks them, only unexpected faults.
    pub async fn validate(&self, request: ActionRequest<'_>) -> Result<Verdict, GateError> {
        let started = Instant::now();
        let result = self.validate_inner(&request, started).await;

        match result {
            Ok(verdict) => Ok(verdict),
            Err(err) if err.is_fail_closed_candidate() && self.config.fail_closed => {
                warn!(code = err.code(), "fail-closed: {err}");
                Ok(self.fail_closed_verdict(started))
            }
            Err(err) => Err(err),
        }
    }

    async fn validate_inner(
        &self,
        request: &ActionRequest<'_>,
        started: Instant,
    ) -> Result<Verdict, GateError> {
        let resolver = CredentialResolver::new(self.store, self.cache, self.config);
        let tenant = resolver.resolve(request.credential).await?;

        let (policy, policy_version) = self.load_active_policy(&tenant.tenant_id).await?;

        let accountant = AggregateAccountant::new(self.store, self.cache, self.config);
        let engine = PolicyEngine::new(self.rate_limiter, &accountant, self.config.regex_timeout());

        let now = Utc::now();
        let outcome = engine
            .evaluate(
                &policy,
                &tenant.tenant_id,
                request.principal_name,
                request.action_type,
                &request.params,
                now,
                request.simulate,
            )
            .await;

        let eval_duration_ms = started.elapsed().as_millis() as i64;
        let action_id = uuid::Uuid::new_v4().to_string();

        crate::metrics::record_decision(
            outcome.allowed,
            false,
            request.simulate,
            eval_duration_ms as u64,
        );

        if !request.simulate {
            let record = AuditRecord {
                action_id: action_id.clone(),
                tenant_id: tenant.tenant_id.clone(),
                principal_name: request.principal_name.to_string(),
                action_type: request.action_type.to_string(),
                params: request.params.clone(),
                allowed: outcome.allowed,
                reason: outcome.reason.clone(),
                policy_version: policy_version.clone(),
                eval_duration_ms,
                timestamp: now,
            };
            self.store.insert_audit_record(&record).await?;

            if outcome.allowed {
                accountant.invalidate_tenant(&tenant.tenant_id).await;
            }

            if !outcome.allowed && tenant.notify_enabled {
                self.notifier
                    .notify(BlockedActionEvent {
                        event: "action_blocked",
                        action_id: action_id.clone(),
                        tenant_id: tenant.tenant_id.clone(),
                        principal_name: request.principal_name.to_string(),
                        action_type: request.action_type.to_string(),
                        params: request.params.clone(),
                        reason: outcome.reason.clone().unwrap_or_default(),
                        timestamp: now,
                    })
                    .await;
            }
        }

        info!(
            tenant_id = %tenant.tenant_id,
            principal = request.principal_name,
            action = request.action_type,
            allowed = outcome.allowed,
            simulated = request.simulate,
            eval_duration_ms,
            "validated action"
        );

        Ok(Verdict {
            allowed: outcome.allowed,
            action_id: if request.simulate { None } else { Some(action_id) },
            reason: outcome.reason,
            policy_version,
            eval_duration_ms,
            simulated: request.simulate,
        })
    }

    /// Load the tenant's active policy through the `policy:{tenant_id}`
    /// cache (§4.7), falling back to the store on a miss. A tenant with no
    /// active policy is not a fault — it evaluates as an empty policy with
    /// default-allow and `policy_version = None` (§4.6 step 2).
    /// `GateError::PolicyCorrupt` is reserved for policy bytes that exist but
    /// fail to parse.
    async fn load_active_policy(&self, tenant_id: &str) -> Result<(Policy, Option<String>), GateError> {
        let key = policy_cache_key(tenant_id);

        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(policy) = serde_json::from_str::<Policy>(&cached) {
                let version = policy.version.clone();
                return Ok((policy, Some(version)));
            }
        }

        let policy = self.store.active_policy(tenant_id).await?;

        match policy {
            Some(policy) => {
                if let Ok(serialized) = serde_json::to_string(&policy) {
                    self.cache
                        .set(&key, serialized, self.config.cache_ttl_policy())
                        .await;
                }
                let version = policy.version.clone();
                Ok((policy, Some(version)))
            }
            None => Ok((empty_policy(tenant_id), None)),
        }
    }

    fn fail_closed_verdict(&self, started: Instant) -> Verdict {
        let suffix: u32 = rand::rng().random();
        let action_id = format!("fail-closed-{suffix:08x}");
        let eval_duration_ms = started.elapsed().as_millis() as i64;
        crate::metrics::record_decision(false, true, false, eval_duration_ms as u64);
        Verdict {
            allowed: false,
            action_id: Some(action_id),
            reason: Some(self.config.fail_closed_reason.clone()),
            policy_version: None,
            eval_duration_ms,
            simulated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::notify::NoopNotificationSink;
    use crate::store::memory::InMemoryStore;
    use crate::types::{DefaultVerdict, Policy, Rule, Tenant};
    use indexmap::IndexMap;
    use serde_json::json;

    fn seeded_store(active: bool) -> InMemoryStore {
        let store = InMemoryStore::new();
        store.seed_tenant(Tenant {
            tenant_id: "t1".into(),
            display_name: "Acme".into(),
            credential: "sekret".into(),
            active,
            notify_endpoint: None,
            notify_enabled: false,
        });
        store.seed_policy(Policy {
            tenant_id: "t1".into(),
            name: "default".into(),
            version: "v1".into(),
            rules: vec![Rule {
                action_type: "*".into(),
                constraints: IndexMap::new(),
                allowed_principals: vec![],
                blocked_principals: vec![],
                rate_limit: None,
                aggregate_limit: None,
            }],
            default_verdict: DefaultVerdict::Allow,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        store
    }

    #[tokio::test]
    async fn unknown_credential_is_an_authorization_error_not_fail_closed() {
        let store = seeded_store(true);
        let cache = InMemoryCache::new();
        let rate_limiter = RateLimiter::new();
        let notifier = NoopNotificationSink;
        let config = GateConfig::minimal();
        let validator = Validator {
            store: &store,
            cache: &cache,
            rate_limiter: &rate_limiter,
            notifier: &notifier,
            config: &config,
        };

        let err = validator
            .validate(ActionRequest {
                credential: "wrong",
                principal_name: "agent-a",
                action_type: "pay",
                params: json!({}),
                simulate: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Unauthorized));
    }

    #[tokio::test]
    async fn allowed_action_is_recorded_and_returns_action_id() {
        let store = seeded_store(true);
        let cache = InMemoryCache::new();
        let rate_limiter = RateLimiter::new();
        let notifier = NoopNotificationSink;
        let config = GateConfig::minimal();
        let validator = Validator {
            store: &store,
            cache: &cache,
            rate_limiter: &rate_limiter,
            notifier: &notifier,
            config: &config,
        };

        let verdict = validator
            .validate(ActionRequest {
                credential: "sekret",
                principal_name: "agent-a",
                action_type: "pay",
                params: json!({"amount": 10}),
                simulate: false,
            })
            .await
            .unwrap();
        assert!(verdict.allowed);
        assert!(verdict.action_id.is_some());
    }

    #[tokio::test]
    async fn simulate_mode_omits_action_id_and_does_not_persist() {
        let store = seeded_store(true);
        let cache = InMemoryCache::new();
        let rate_limiter = RateLimiter::new();
        let notifier = NoopNotificationSink;
        let config = GateConfig::minimal();
        let validator = Validator {
            store: &store,
            cache: &cache,
            rate_limiter: &rate_limiter,
            notifier: &notifier,
            config: &config,
        };

        let verdict = validator
            .validate(ActionRequest {
                credential: "sekret",
                principal_name: "agent-a",
                action_type: "pay",
                params: json!({"amount": 10}),
                simulate: true,
            })
            .await
            .unwrap();
        assert!(verdict.simulated);
        assert!(verdict.action_id.is_none());
    }

    #[tokio::test]
    async fn missing_active_policy_evaluates_as_empty_policy_with_default_allow() {
        let store = InMemoryStore::new();
        store.seed_tenant(Tenant {
            tenant_id: "t1".into(),
            display_name: "Acme".into(),
            credential: "sekret".into(),
            active: true,
            notify_endpoint: None,
            notify_enabled: false,
        });
        let cache = InMemoryCache::new();
        let rate_limiter = RateLimiter::new();
        let notifier = NoopNotificationSink;
        let mut config = GateConfig::minimal();
        config.fail_closed = true;
        let validator = Validator {
            store: &store,
            cache: &cache,
            rate_limiter: &rate_limiter,
            notifier: &notifier,
            config: &config,
        };

        let verdict = validator
            .validate(ActionRequest {
                credential: "sekret",
                principal_name: "agent-a",
                action_type: "pay",
                params: json!({}),
                simulate: false,
            })
            .await
            .unwrap();
        assert!(verdict.allowed);
        assert!(verdict.policy_version.is_none());
        assert!(verdict.action_id.is_some());
        assert!(!verdict.action_id.unwrap().starts_with("fail-closed-"));
    }

    // Store-fault fail-closed coverage (a genuine `Store::active_policy`
    // error, as opposed to a tenant with no active policy at all) lives in
    // `tests/fail_closed.rs` alongside the rest of the fail-closed envelope
    // golden scenarios.

    #[tokio::test]
    async fn tenant_inactive_is_not_masked_by_fail_closed() {
        let store = seeded_store(false);
        let cache = InMemoryCache::new();
        let rate_limiter = RateLimiter::new();
        let notifier = NoopNotificationSink;
        let mut config = GateConfig::minimal();
        config.fail_closed = true;
        let validator = Validator {
            store: &store,
            cache: &cache,
            rate_limiter: &rate_limiter,
            notifier: &notifier,
            config: &config,
        };

        let err = validator
            .validate(ActionRequest {
                credential: "sekret",
                principal_name: "agent-a",
                action_type: "pay",
                params: json!({}),
                simulate: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::TenantInactive { .. }));
    }
}
