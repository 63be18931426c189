//! End-to-end coverage of a representative finance policy: a `pay` action
//! constrained by amount and vendor, open to every other action type via
//! the wildcard rule.

use chrono::Utc;
use indexmap::IndexMap;
use policy_gate::cache::InMemoryCache;
use policy_gate::notify::NoopNotificationSink;
use policy_gate::rate_limit::RateLimiter;
use policy_gate::store::memory::InMemoryStore;
use policy_gate::config::GateConfig;
use policy_gate::{ActionRequest, ConstraintSpec, DefaultVerdict, Policy, Rule, Tenant, Validator};
use serde_json::json;

fn finance_policy() -> Policy {
    let mut pay_constraints = IndexMap::new();
    pay_constraints.insert(
        "params.amount".to_string(),
        ConstraintSpec {
            max: Some(5000.0),
            ..Default::default()
        },
    );
    pay_constraints.insert(
        "params.vendor".to_string(),
        ConstraintSpec {
            in_values: Some(vec![json!("acme-supplies"), json!("globex")]),
            ..Default::default()
        },
    );

    let pay_rule = Rule {
        action_type: "pay".to_string(),
        constraints: pay_constraints,
        allowed_principals: vec![],
        blocked_principals: vec![],
        rate_limit: None,
        aggregate_limit: None,
    };

    let wildcard_rule = Rule {
        action_type: "*".to_string(),
        constraints: IndexMap::new(),
        allowed_principals: vec![],
        blocked_principals: vec![],
        rate_limit: None,
        aggregate_limit: None,
    };

    Policy {
        tenant_id: "finance-co".to_string(),
        name: "finance-default".to_string(),
        version: "v1".to_string(),
        rules: vec![pay_rule, wildcard_rule],
        default_verdict: DefaultVerdict::Block,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn seed(active: bool) -> (InMemoryStore, InMemoryCache, RateLimiter, NoopNotificationSink, GateConfig) {
    let store = InMemoryStore::new();
    store.seed_tenant(Tenant {
        tenant_id: "finance-co".to_string(),
        display_name: "Finance Co".to_string(),
        credential: "finance-secret".to_string(),
        active,
        notify_endpoint: None,
        notify_enabled: false,
    });
    store.seed_policy(finance_policy());
    (
        store,
        InMemoryCache::new(),
        RateLimiter::new(),
        NoopNotificationSink,
        GateConfig::minimal(),
    )
}

#[tokio::test]
async fn golden_pay_within_limits_is_allowed() {
    let (store, cache, rate_limiter, notifier, config) = seed(true);
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let verdict = validator
        .validate(ActionRequest {
            credential: "finance-secret",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 2500, "vendor": "acme-supplies"}),
            simulate: false,
        })
        .await
        .unwrap();

    assert!(verdict.allowed);
    assert!(verdict.action_id.is_some());
    assert_eq!(verdict.policy_version.as_deref(), Some("v1"));
}

#[tokio::test]
async fn golden_pay_over_amount_is_rejected_with_reason() {
    let (store, cache, rate_limiter, notifier, config) = seed(true);
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let verdict = validator
        .validate(ActionRequest {
            credential: "finance-secret",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 9000, "vendor": "acme-supplies"}),
            simulate: false,
        })
        .await
        .unwrap();

    assert!(!verdict.allowed);
    assert_eq!(
        verdict.reason.as_deref(),
        Some("params.amount value 9000 exceeds maximum 5000")
    );
}

#[tokio::test]
async fn golden_pay_with_unapproved_vendor_is_rejected() {
    let (store, cache, rate_limiter, notifier, config) = seed(true);
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let verdict = validator
        .validate(ActionRequest {
            credential: "finance-secret",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 100, "vendor": "shady-llc"}),
            simulate: false,
        })
        .await
        .unwrap();

    assert!(!verdict.allowed);
}

#[tokio::test]
async fn golden_non_pay_action_falls_through_to_wildcard() {
    let (store, cache, rate_limiter, notifier, config) = seed(true);
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let verdict = validator
        .validate(ActionRequest {
            credential: "finance-secret",
            principal_name: "agent-a",
            action_type: "send_email",
            params: json!({}),
            simulate: false,
        })
        .await
        .unwrap();

    assert!(verdict.allowed);
}

#[tokio::test]
async fn golden_verdict_json_shape_is_stable() {
    let (store, cache, rate_limiter, notifier, config) = seed(true);
    let validator = Validator {
        store: &store,
        cache: &cache,
        rate_limiter: &rate_limiter,
        notifier: &notifier,
        config: &config,
    };

    let verdict = validator
        .validate(ActionRequest {
            credential: "finance-secret",
            principal_name: "agent-a",
            action_type: "pay",
            params: json!({"amount": 100, "vendor": "acme-supplies"}),
            simulate: false,
        })
        .await
        .unwrap();

    let value = serde_json::to_value(&verdict).unwrap();
    for field in ["allowed", "action_id", "reason", "policy_version", "eval_duration_ms", "simulated"] {
        assert!(value.get(field).is_some(), "missing field {field}");
    }
}
