//! Credential Resolver (C7): maps a caller-supplied credential to an
//! active tenant, cache-then-store (§4.7).

use crate::cache::Cache;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::store::Store;
use crate::types::Tenant;

/// Cache key per §4.7's exact schema: `credential:{secret}`.
fn cache_key(credential: &str) -> String {
    format!("credential:{credential}")
}

pub struct CredentialResolver<'a> {
    store: &'a dyn Store,
    cache: &'a dyn Cache,
    config: &'a GateConfig,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(store: &'a dyn Store, cache: &'a dyn Cache, config: &'a GateConfig) -> Self {
        Self { store, cache, config }
    }

    /// Resolve `credential` to its tenant. Returns `Unauthorized` if the
    /// credential does not resolve at all, or `TenantInactive` if it
    /// resolves to a tenant that has since been deactivated — callers must
    /// not treat these the same way the fail-closed envelope treats faults,
    /// since both are authorization failures, not unexpected errors.
    pub async fn resolve(&self, credential: &str) -> Result<Tenant, GateError> {
        let key = cache_key(credential);

        if let Some(cached) = self.cache.get(&key).await {
            if let Ok(tenant) = serde_json::from_str::<Tenant>(&cached) {
                return authorize(tenant);
            }
        }

        let tenant = self
            .store
            .tenant_by_credential(credential)
            .await?
            .ok_or(GateError::Unauthorized)?;

        if let Ok(serialized) = serde_json::to_string(&tenant) {
            self.cache.set(&key, serialized, self.config.cache_ttl_credential()).await;
        }

        authorize(tenant)
    }

    /// Drop any cached entry for `credential`. Must be called whenever a
    /// tenant's `active` flag or credential value changes, since the cache
    /// otherwise keeps authorizing a deactivated tenant until its TTL
    /// expires.
    pub async fn invalidate(&self, credential: &str) {
        self.cache.delete(&cache_key(credential)).await;
    }
}

fn authorize(tenant: Tenant) -> Result<Tenant, GateError> {
    if !tenant.active {
        return Err(GateError::TenantInactive {
            tenant_id: tenant.tenant_id,
        });
    }
    Ok(tenant)
}
