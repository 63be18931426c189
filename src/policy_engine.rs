//! Policy Engine (C4): selects the rule for an action and evaluates it
//! sequentially with short-circuit on the first failing check (§4.3-4.5).
//!
//! Rule lists are defenses-in-depth, not a priority list to pick a winner
//! from: once one check in the selected rule rejects, evaluation stops and
//! nothing can overturn that rejection.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::aggregate::AggregateAccountant;
use crate::constraints::{self, ConstraintOutcome};
use crate::path;
use crate::rate_limit::{Decision as RateDecision, RateLimiter};
use crate::types::{DefaultVerdict, Measure, Policy, Rule};

#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl EvalOutcome {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Pick the rule that governs `action_type`: an exact match takes
/// precedence over a `*` wildcard regardless of declaration order between
/// them, but ties within each group resolve to the first declared.
fn select_rule<'p>(policy: &'p Policy, action_type: &str) -> Option<&'p Rule> {
    policy
        .rules
        .iter()
        .find(|r| !r.is_wildcard() && r.action_type == action_type)
        .or_else(|| policy.rules.iter().find(|r| r.is_wildcard()))
}

pub struct PolicyEngine<'a> {
    pub rate_limiter: &'a RateLimiter,
    pub accountant: &'a AggregateAccountant<'a>,
    pub regex_timeout: std::time::Duration,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(
        rate_limiter: &'a RateLimiter,
        accountant: &'a AggregateAccountant<'a>,
        regex_timeout: std::time::Duration,
    ) -> Self {
        Self {
            rate_limiter,
            accountant,
            regex_timeout,
        }
    }

    /// Evaluate `policy` for one proposed action. `simulate` suppresses the
    /// rate limiter's and aggregate accountant's side effects (recording an
    /// attempt, writing a fresh cache entry) while still reporting what
    /// would have happened.
    pub async fn evaluate(
        &self,
        policy: &Policy,
        tenant_id: &str,
        principal_name: &str,
        action_type: &str,
        params: &Value,
        now: DateTime<Utc>,
        simulate: bool,
    ) -> EvalOutcome {
        let Some(rule) = select_rule(policy, action_type) else {
            return match policy.default_verdict {
                DefaultVerdict::Allow => EvalOutcome::allow(),
                DefaultVerdict::Block => EvalOutcome::reject(format!(
                    "action '{action_type}' not allowed by policy (no matching rules)"
                )),
            };
        };

        // Empty `allowed_principals` means no restriction, not deny-all —
        // preserved as observed even though it reads oddly next to
        // `blocked_principals`' opposite convention.
        if !rule.allowed_principals.is_empty() && !rule.allowed_principals.contains(&principal_name.to_string())
        {
            return EvalOutcome::reject(format!("Agent '{principal_name}' not in allowed agents list"));
        }

        if rule.blocked_principals.contains(&principal_name.to_string()) {
            return EvalOutcome::reject(format!("Agent '{principal_name}' in blocked agents list"));
        }

        // rate_limit runs before constraints (§4.5 step 3) — its accept-and-
        // record side effect must happen even if a later constraint rejects.
        if let Some(rl_spec) = &rule.rate_limit {
            let decision = if simulate {
                self.rate_limiter.peek(principal_name, action_type, rl_spec)
            } else {
                self.rate_limiter.check_and_record(principal_name, action_type, rl_spec)
            };
            if let RateDecision::Reject { retry_after_seconds: _ } = decision {
                return EvalOutcome::reject(format!(
                    "Rate limit exceeded: {} per {}s",
                    rl_spec.max_requests, rl_spec.window_seconds
                ));
            }
        }

        for (path_key, spec) in &rule.constraints {
            match constraints::evaluate(path_key, spec, params, self.regex_timeout) {
                ConstraintOutcome::Allow => {}
                ConstraintOutcome::Reject(reason) => return EvalOutcome::reject(reason),
            }
        }

        if let Some(agg_spec) = &rule.aggregate_limit {
            let current = match self
                .accountant
                .current_total(tenant_id, principal_name, action_type, agg_spec, now, !simulate)
                .await
            {
                Ok(total) => total,
                Err(_) => return EvalOutcome::reject("aggregate limit could not be evaluated"),
            };

            let candidate = match agg_spec.measure {
                Measure::Count => 1.0,
                Measure::Sum => match path::resolve(&agg_spec.param_path, params).map(path::to_number) {
                    Some(Ok(n)) => n,
                    _ => {
                        return EvalOutcome::reject(format!(
                            "parameter '{}' required for aggregate limit is missing or non-numeric",
                            agg_spec.param_path
                        ));
                    }
                },
            };

            if current + candidate > agg_spec.max_value {
                return EvalOutcome::reject(format!(
                    "Aggregate limit exceeded: {:.2} > {:.2} (window={}, scope={})",
                    current + candidate,
                    agg_spec.max_value,
                    agg_spec.window,
                    agg_spec.scope.as_wire_str()
                ));
            }
        }

        EvalOutcome::allow()
    }
}
