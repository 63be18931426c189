//! Core domain types: tenants, policies, rules, constraints, audit records.
//!
//! Wire-format field names follow §6 of the design (`allowed_agents`,
//! `blocked_agents`, scope strings `agent`/`action`/`project`) for
//! backward compatibility with persisted policy documents, while the
//! in-memory field names use the domain vocabulary (`principal`, `tenant`).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tenant: the customer-facing isolation unit owning a policy, a
/// credential, and an audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub display_name: String,
    /// Secret token, unique across the system. Never returned after
    /// creation beyond the initial response — callers of this crate must
    /// not log it.
    pub credential: String,
    pub active: bool,
    pub notify_endpoint: Option<String>,
    pub notify_enabled: bool,
}

/// Verdict produced by activating/deactivating a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultVerdict {
    Allow,
    Block,
}

/// A versioned policy document. Exactly one policy per tenant is `active`
/// at any moment (§3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub tenant_id: String,
    pub name: String,
    /// Free-form version string, opaque to the engine.
    pub version: String,
    pub rules: Vec<Rule>,
    #[serde(rename = "default")]
    pub default_verdict: DefaultVerdict,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single policy rule scoped to one action type (or the `*` wildcard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub action_type: String,
    #[serde(default)]
    pub constraints: IndexMap<String, ConstraintSpec>,
    #[serde(default, alias = "allowed_agents")]
    pub allowed_principals: Vec<String>,
    #[serde(default, alias = "blocked_agents")]
    pub blocked_principals: Vec<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,
    #[serde(default)]
    pub aggregate_limit: Option<AggregateLimitSpec>,
}

impl Rule {
    pub fn is_wildcard(&self) -> bool {
        self.action_type == "*"
    }
}

/// A single constraint object keyed under a parameter path. Multiple keys
/// on the same object are ANDed; the fixed evaluation order is
/// `max, min, in, not_in, pattern, not_pattern, equals` (§4.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub max: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "in")]
    pub in_values: Option<Vec<Value>>,
    pub not_in: Option<Vec<Value>>,
    pub pattern: Option<String>,
    pub not_pattern: Option<String>,
    pub equals: Option<Value>,
    /// Overrides the default `not_pattern` rejection message.
    pub reason: Option<String>,
}

impl ConstraintSpec {
    /// True if this constraint carries any key whose absent-value semantics
    /// is "reject" (i.e. all keys except `not_pattern`).
    pub fn requires_present_value(&self) -> bool {
        self.max.is_some()
            || self.min.is_some()
            || self.in_values.is_some()
            || self.not_in.is_some()
            || self.pattern.is_some()
            || self.equals.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSpec {
    pub max_requests: u64,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Sum,
    Count,
}

/// Aggregation scope: which key dimensions a cumulative limit sums over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Principal,
    Action,
    Tenant,
}

impl Scope {
    /// Parse the wire-format scope string. Accepts both the legacy
    /// `agent`/`project` spellings used in persisted policy documents and
    /// the domain spellings `principal`/`tenant` for forward compatibility.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "agent" | "principal" => Some(Scope::Principal),
            "action" => Some(Scope::Action),
            "project" | "tenant" => Some(Scope::Tenant),
            _ => None,
        }
    }

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Scope::Principal => "agent",
            Scope::Action => "action",
            Scope::Tenant => "project",
        }
    }
}

impl Serialize for Scope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Scope::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown scope '{raw}'")))
    }
}

/// A calendar- or clock-defined span over which a cumulative measure is
/// computed (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hourly,
    Daily,
    Weekly,
    RollingHours(u32),
}

impl Window {
    pub fn is_rolling(&self) -> bool {
        matches!(self, Window::RollingHours(_))
    }
}

impl std::str::FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Window::Hourly),
            "daily" => Ok(Window::Daily),
            "weekly" => Ok(Window::Weekly),
            other => {
                if let Some(n) = other.strip_prefix("rolling_hours:") {
                    n.parse::<u32>()
                        .map(Window::RollingHours)
                        .map_err(|_| format!("invalid rolling_hours value in '{other}'"))
                } else {
                    Err(format!("unknown window '{other}'"))
                }
            }
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Window::Hourly => write!(f, "hourly"),
            Window::Daily => write!(f, "daily"),
            Window::Weekly => write!(f, "weekly"),
            Window::RollingHours(n) => write!(f, "rolling_hours:{n}"),
        }
    }
}

impl Serialize for Window {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Window {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateLimitSpec {
    pub max_value: f64,
    pub window: Window,
    pub param_path: String,
    pub measure: Measure,
    pub scope: Scope,
}

/// An immutable record of one non-simulated validation decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action_id: String,
    pub tenant_id: String,
    pub principal_name: String,
    pub action_type: String,
    pub params: Value,
    pub allowed: bool,
    pub reason: Option<String>,
    pub policy_version: Option<String>,
    pub eval_duration_ms: i64,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one call to [`crate::validator::Validator::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    pub action_id: Option<String>,
    pub reason: Option<String>,
    pub policy_version: Option<String>,
    pub eval_duration_ms: i64,
    pub simulated: bool,
}

/// Describes a blocked action for the façade's notifier. The core's
/// contract is only to build this payload — delivery is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedActionEvent {
    pub event: &'static str,
    pub action_id: String,
    pub tenant_id: String,
    pub principal_name: String,
    pub action_type: String,
    pub params: Value,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
