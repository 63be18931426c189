//! Golden scenario: a $1000/day cumulative spend limit scoped per
//! principal, exercising the boundary (== max_value allowed) and
//! per-principal isolation.

use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use policy_gate::cache::InMemoryCache;
use policy_gate::config::GateConfig;
use policy_gate::notify::NoopNotificationSink;
use policy_gate::rate_limit::RateLimiter;
use policy_gate::store::memory::InMemoryStore;
use policy_gate::{
    ActionRequest, AggregateLimitSpec, DefaultVerdict, Measure, Policy, Rule, Scope, Tenant, Validator,
    Window,
};
use serde_json::json;

fn daily_limit_policy() -> Policy {
    Policy {
        tenant_id: "t1".to_string(),
        name: "spend-cap".to_string(),
        version: "v1".to_string(),
        rules: vec![Rule {
            action_type: "pay".to_string(),
            constraints: IndexMap::new(),
            allowed_principals: vec![],
            blocked_principals: vec![],
            rate_limit: None,
            aggregate_limit: Some(AggregateLimitSpec {
                max_value: 1000.0,
                window: Window::Daily,
                param_path: "params.amount".to_string(),
                measure: Measure::Sum,
                scope: Scope::Principal,
            }),
        }],
        default_verdict: DefaultVerdict::Block,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn harness() -> (InMemoryStore, InMemoryCache, RateLimiter, NoopNotificationSink, GateConfig) {
    let store = InMemoryStore::new();
    store.seed_tenant(Tenant {
        tenant_id: "t1".to_string(),
        display_name: "t1".to_string(),
        credential: "cred".to_string(),
        active: true,
        notify_endpoint: None,
        notify_enabled: false,
    });
    store.seed_policy(daily_limit_policy());
    (
        store,
        InMemoryCache::new(),
        RateLimiter::new(),
        NoopNotificationSink,
        GateConfig::minimal(),
    )
}

#[tokio::test]
async fn spend_exactly_at_the_cap_is_allowed() {
    let (store, cache, rate_limiter, notifier, config) = harness();
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let first = validator
        .validate(ActionRequest {
            credential: "cred",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 600}),
            simulate: false,
        })
        .await
        .unwrap();
    assert!(first.allowed);

    let second = validator
        .validate(ActionRequest {
            credential: "cred",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 400}),
            simulate: false,
        })
        .await
        .unwrap();
    assert!(second.allowed, "total of exactly 1000 must be allowed");
}

#[tokio::test]
async fn spend_one_cent_over_the_cap_is_rejected() {
    let (store, cache, rate_limiter, notifier, config) = harness();
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    validator
        .validate(ActionRequest {
            credential: "cred",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 600}),
            simulate: false,
        })
        .await
        .unwrap();

    let second = validator
        .validate(ActionRequest {
            credential: "cred",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 400.01}),
            simulate: false,
        })
        .await
        .unwrap();
    assert!(!second.allowed);
}

#[tokio::test]
async fn spend_is_isolated_per_principal() {
    let (store, cache, rate_limiter, notifier, config) = harness();
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let a = validator
        .validate(ActionRequest {
            credential: "cred",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 900}),
            simulate: false,
        })
        .await
        .unwrap();
    assert!(a.allowed);

    // agent-b's spend is tracked independently of agent-a's.
    let b = validator
        .validate(ActionRequest {
            credential: "cred",
            principal_name: "agent-b",
            action_type: "pay",
            params: json!({"amount": 900}),
            simulate: false,
        })
        .await
        .unwrap();
    assert!(b.allowed);
}

#[test]
fn window_truncation_matches_calendar_boundaries() {
    let now = Utc.with_ymd_and_hms(2026, 7, 26, 23, 59, 0).single().unwrap();
    let start = policy_gate::aggregate::window_start(&Window::Daily, now);
    assert_eq!(start, Utc.with_ymd_and_hms(2026, 7, 26, 0, 0, 0).single().unwrap());
}
