//! Action-authorization gateway core: decides whether an AI agent's
//! proposed tool call is allowed, given a tenant's active policy, rate
//! limits, and cumulative usage limits.
//!
//! This crate is the decision subsystem only — no HTTP surface, no CRUD
//! for tenants/policies, no notification delivery. See `bin/server.rs`
//! for a minimal demo façade.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod constraints;
pub mod credential;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod path;
pub mod policy_engine;
pub mod rate_limit;
pub mod shutdown;
pub mod store;
pub mod types;
pub mod validator;

pub use error::GateError;
pub use types::{
    AggregateLimitSpec, AuditRecord, BlockedActionEvent, ConstraintSpec, DefaultVerdict, Measure,
    Policy, RateLimitSpec, Rule, Scope, Tenant, Verdict, Window,
};
pub use validator::{ActionRequest, Validator};
