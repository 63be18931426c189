//! Persistence boundary: tenants, policies, and the audit log. The async
//! `Store` trait lets the gateway core stay storage-agnostic; an in-memory
//! implementation backs tests and the demo binary, and an `sqlx`-backed
//! implementation (behind the `sql` feature) is the intended production
//! backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GateError;
use crate::types::{AuditRecord, Measure, Policy, Scope, Tenant};

/// Parameters for summing or counting historical audit records toward a
/// cumulative (aggregate) limit (§4.4).
#[derive(Debug, Clone)]
pub struct AggregateQuery<'a> {
    pub tenant_id: &'a str,
    pub principal_name: &'a str,
    pub action_type: &'a str,
    pub param_path: &'a str,
    pub measure: Measure,
    pub scope: Scope,
    pub window_start: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn tenant_by_credential(&self, credential: &str) -> Result<Option<Tenant>, GateError>;
    async fn tenant_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, GateError>;
    async fn active_policy(&self, tenant_id: &str) -> Result<Option<Policy>, GateError>;
    async fn upsert_policy(&self, policy: &Policy) -> Result<(), GateError>;
    async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), GateError>;
    /// Compute the current total for a cumulative limit over historical,
    /// non-simulated, allowed audit records within `query.window_start..now`.
    async fn aggregate_total(&self, query: AggregateQuery<'_>) -> Result<f64, GateError>;
}

pub mod memory {
    use super::*;
    use crate::path;
    use parking_lot::RwLock;

    /// Reference `Store` implementation backed by process memory. Used by
    /// tests and the demo binary; not durable across restarts.
    #[derive(Default)]
    pub struct InMemoryStore {
        tenants: RwLock<Vec<Tenant>>,
        policies: RwLock<Vec<Policy>>,
        audit_log: RwLock<Vec<AuditRecord>>,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_tenant(&self, tenant: Tenant) {
            self.tenants.write().push(tenant);
        }

        pub fn seed_policy(&self, policy: Policy) {
            self.policies.write().push(policy);
        }
    }

    #[async_trait]
    impl Store for InMemoryStore {
        async fn tenant_by_credential(&self, credential: &str) -> Result<Option<Tenant>, GateError> {
            Ok(self
                .tenants
                .read()
                .iter()
                .find(|t| t.credential == credential)
                .cloned())
        }

        async fn tenant_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, GateError> {
            Ok(self
                .tenants
                .read()
                .iter()
                .find(|t| t.tenant_id == tenant_id)
                .cloned())
        }

        async fn active_policy(&self, tenant_id: &str) -> Result<Option<Policy>, GateError> {
            Ok(self
                .policies
                .read()
                .iter()
                .find(|p| p.tenant_id == tenant_id && p.active)
                .cloned())
        }

        async fn upsert_policy(&self, policy: &Policy) -> Result<(), GateError> {
            let mut policies = self.policies.write();
            if policy.active {
                for existing in policies.iter_mut() {
                    if existing.tenant_id == policy.tenant_id {
                        existing.active = false;
                    }
                }
            }
            if let Some(existing) = policies
                .iter_mut()
                .find(|p| p.tenant_id == policy.tenant_id && p.version == policy.version)
            {
                *existing = policy.clone();
            } else {
                policies.push(policy.clone());
            }
            Ok(())
        }

        async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), GateError> {
            self.audit_log.write().push(record.clone());
            Ok(())
        }

        async fn aggregate_total(&self, query: AggregateQuery<'_>) -> Result<f64, GateError> {
            let log = self.audit_log.read();
            let mut total = 0.0;
            for record in log.iter() {
                if !record.allowed || record.tenant_id != query.tenant_id {
                    continue;
                }
                if record.timestamp < query.window_start {
                    continue;
                }
                match query.scope {
                    Scope::Principal if record.principal_name != query.principal_name => continue,
                    Scope::Action if record.action_type != query.action_type => continue,
                    _ => {}
                }
                match query.measure {
                    Measure::Count => total += 1.0,
                    Measure::Sum => {
                        if let Some(value) = path::resolve(query.param_path, &record.params) {
                            if let Ok(n) = path::to_number(value) {
                                total += n;
                            }
                        }
                    }
                }
            }
            Ok(total)
        }
    }
}

#[cfg(feature = "sql")]
pub mod sql {
    use super::*;
    use sqlx::any::AnyPoolOptions;
    use sqlx::{AnyPool, Row};

    /// `sqlx`-backed store, generic across any driver `sqlx::any` supports
    /// (Postgres, SQLite). Uses runtime-checked queries rather than the
    /// `query!` macro since there is no live database at compile time.
    pub struct SqlStore {
        pool: AnyPool,
    }

    impl SqlStore {
        pub async fn connect(database_url: &str) -> Result<Self, GateError> {
            sqlx::any::install_default_drivers();
            let pool = AnyPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|e| GateError::Store(e.to_string()))?;
            Ok(Self { pool })
        }
    }

    #[async_trait]
    impl Store for SqlStore {
        async fn tenant_by_credential(&self, credential: &str) -> Result<Option<Tenant>, GateError> {
            let row = sqlx::query(
                "SELECT tenant_id, display_name, credential, active, notify_endpoint, notify_enabled \
                 FROM tenants WHERE credential = $1",
            )
            .bind(credential)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;

            Ok(row.map(|r| Tenant {
                tenant_id: r.get("tenant_id"),
                display_name: r.get("display_name"),
                credential: r.get("credential"),
                active: r.get("active"),
                notify_endpoint: r.get("notify_endpoint"),
                notify_enabled: r.get("notify_enabled"),
            }))
        }

        async fn tenant_by_id(&self, tenant_id: &str) -> Result<Option<Tenant>, GateError> {
            let row = sqlx::query(
                "SELECT tenant_id, display_name, credential, active, notify_endpoint, notify_enabled \
                 FROM tenants WHERE tenant_id = $1",
            )
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;

            Ok(row.map(|r| Tenant {
                tenant_id: r.get("tenant_id"),
                display_name: r.get("display_name"),
                credential: r.get("credential"),
                active: r.get("active"),
                notify_endpoint: r.get("notify_endpoint"),
                notify_enabled: r.get("notify_enabled"),
            }))
        }

        async fn active_policy(&self, tenant_id: &str) -> Result<Option<Policy>, GateError> {
            let row = sqlx::query(
                "SELECT tenant_id, name, version, rules_json, default_verdict, active, \
                 created_at, updated_at FROM policies WHERE tenant_id = $1 AND active = true",
            )
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;

            let Some(row) = row else { return Ok(None) };
            let rules_json: String = row.get("rules_json");
            let rules = serde_json::from_str(&rules_json).map_err(|e| GateError::PolicyCorrupt {
                tenant_id: tenant_id.to_string(),
                detail: e.to_string(),
            })?;
            let default_verdict_str: String = row.get("default_verdict");
            let default_verdict =
                serde_json::from_value(serde_json::Value::String(default_verdict_str)).map_err(
                    |e| GateError::PolicyCorrupt {
                        tenant_id: tenant_id.to_string(),
                        detail: e.to_string(),
                    },
                )?;

            Ok(Some(Policy {
                tenant_id: row.get("tenant_id"),
                name: row.get("name"),
                version: row.get("version"),
                rules,
                default_verdict,
                active: row.get("active"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            }))
        }

        async fn upsert_policy(&self, policy: &Policy) -> Result<(), GateError> {
            if policy.active {
                sqlx::query("UPDATE policies SET active = false WHERE tenant_id = $1")
                    .bind(&policy.tenant_id)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| GateError::Store(e.to_string()))?;
            }
            let rules_json = serde_json::to_string(&policy.rules)
                .map_err(|e| GateError::Store(e.to_string()))?;
            sqlx::query(
                "INSERT INTO policies (tenant_id, name, version, rules_json, default_verdict, \
                 active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (tenant_id, version) DO UPDATE SET rules_json = excluded.rules_json, \
                 active = excluded.active, updated_at = excluded.updated_at",
            )
            .bind(&policy.tenant_id)
            .bind(&policy.name)
            .bind(&policy.version)
            .bind(rules_json)
            .bind(serde_json::to_value(policy.default_verdict).unwrap().as_str().unwrap())
            .bind(policy.active)
            .bind(policy.created_at)
            .bind(policy.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;
            Ok(())
        }

        async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), GateError> {
            sqlx::query(
                "INSERT INTO audit_log (action_id, tenant_id, principal_name, action_type, \
                 params_json, allowed, reason, policy_version, eval_duration_ms, timestamp) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(&record.action_id)
            .bind(&record.tenant_id)
            .bind(&record.principal_name)
            .bind(&record.action_type)
            .bind(record.params.to_string())
            .bind(record.allowed)
            .bind(&record.reason)
            .bind(&record.policy_version)
            .bind(record.eval_duration_ms)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;
            Ok(())
        }

        async fn aggregate_total(&self, query: AggregateQuery<'_>) -> Result<f64, GateError> {
            let rows = sqlx::query(
                "SELECT params_json FROM audit_log WHERE tenant_id = $1 AND allowed = true \
                 AND timestamp >= $2 AND ($3 = 'tenant' OR ($3 = 'agent' AND principal_name = $4) \
                 OR ($3 = 'action' AND action_type = $5))",
            )
            .bind(query.tenant_id)
            .bind(query.window_start)
            .bind(query.scope.as_wire_str())
            .bind(query.principal_name)
            .bind(query.action_type)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;

            let mut total = 0.0;
            for row in rows {
                match query.measure {
                    Measure::Count => total += 1.0,
                    Measure::Sum => {
                        let params_json: String = row.get("params_json");
                        if let Ok(params) = serde_json::from_str::<serde_json::Value>(&params_json) {
                            if let Some(value) = crate::path::resolve(query.param_path, &params) {
                                if let Ok(n) = crate::path::to_number(value) {
                                    total += n;
                                }
                            }
                        }
                    }
                }
            }
            Ok(total)
        }
    }
}
