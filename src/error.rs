//! Error taxonomy for the gateway core.
//!
//! Per the error handling design, a policy decision — allow or reject — is
//! never represented here; those are [`crate::types::Verdict`] values.
//! `GateError` covers only the other two outcome kinds: authorization
//! failures (must not be masked by the fail-closed envelope) and
//! unexpected faults (may be converted into a fail-closed reject).

use thiserror::Error;

/// Errors surfaced by the gateway core.
#[derive(Debug, Error)]
pub enum GateError {
    /// Credential did not resolve to an active tenant.
    #[error("credential did not resolve to an active tenant")]
    Unauthorized,

    /// Credential resolved, but the tenant is deactivated.
    #[error("tenant '{tenant_id}' is deactivated")]
    TenantInactive { tenant_id: String },

    /// The persistence store is unreachable or returned an error.
    #[error("store error: {0}")]
    Store(String),

    /// The active policy's persisted bytes failed to parse.
    #[error("policy for tenant '{tenant_id}' is corrupt: {detail}")]
    PolicyCorrupt { tenant_id: String, detail: String },

    /// A regex constraint exceeded its configured evaluation budget.
    #[error("regex evaluation timeout")]
    RegexTimeout,
}

impl GateError {
    /// Stable machine-readable code, analogous to the original firewall's
    /// `ErrorCode` catalog — useful for a façade to map onto status codes
    /// without string-matching `Display` output.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::Unauthorized => "invalid_credential",
            GateError::TenantInactive { .. } => "tenant_inactive",
            GateError::Store(_) => "store_unavailable",
            GateError::PolicyCorrupt { .. } => "policy_corrupt",
            GateError::RegexTimeout => "regex_timeout",
        }
    }

    /// True for the "unexpected fault" outcome kind (§7.4) that the
    /// fail-closed envelope is permitted to convert into a synthetic
    /// reject. Authorization failures are never fail-closed candidates.
    pub fn is_fail_closed_candidate(&self) -> bool {
        matches!(
            self,
            GateError::Store(_) | GateError::PolicyCorrupt { .. } | GateError::RegexTimeout
        )
    }
}
