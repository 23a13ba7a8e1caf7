//! Per-tenant limit storage with a short-lived read cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

use pockity_core::{Namespace, Quota, TenantRef};
use pockity_state::{KeyKind, StateKey, StateStore};

use crate::error::GatewayError;

const LIMITS_ID: &str = "quota";

#[derive(Debug, Clone, Copy)]
struct CachedLimits {
    quota: Quota,
    cached_at: Instant,
}

/// Resolves a tenant's effective [`Quota`]: explicit limits if stored,
/// otherwise the configured default.
///
/// Resolved values are cached for `cache_ttl` so other instances' writes are
/// eventually seen; [`store`](Self::store) invalidates the local entry.
pub struct TenantLimits {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    default_quota: Quota,
    cache_ttl: Duration,
    cache: RwLock<HashMap<TenantRef, CachedLimits>>,
}

impl TenantLimits {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: Namespace,
        default_quota: Quota,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            state,
            namespace,
            default_quota,
            cache_ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_quota(&self) -> Quota {
        self.default_quota
    }

    fn key(&self, tenant: &TenantRef) -> StateKey {
        StateKey::for_tenant(self.namespace.clone(), tenant, KeyKind::Limits, LIMITS_ID)
    }

    /// Explicit limits stored for `tenant`, bypassing the cache.
    pub async fn stored(&self, tenant: &TenantRef) -> Result<Option<Quota>, GatewayError> {
        match self.state.get(&self.key(tenant)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Effective limits for `tenant`.
    pub async fn resolve(&self, tenant: &TenantRef) -> Result<Quota, GatewayError> {
        if !self.cache_ttl.is_zero() {
            let cached = self.cache.read().get(tenant).copied();
            if let Some(c) = cached
                && c.cached_at.elapsed() < self.cache_ttl
            {
                return Ok(c.quota);
            }
        }

        let quota = self.stored(tenant).await?.unwrap_or(self.default_quota);
        if !self.cache_ttl.is_zero() {
            self.cache.write().insert(
                tenant.clone(),
                CachedLimits {
                    quota,
                    cached_at: Instant::now(),
                },
            );
        }
        Ok(quota)
    }

    /// Persist explicit limits for `tenant`.
    pub async fn store(&self, tenant: &TenantRef, quota: Quota) -> Result<(), GatewayError> {
        quota.validate()?;
        let raw = serde_json::to_string(&quota)?;
        self.state.set(&self.key(tenant), &raw, None).await?;
        self.invalidate(tenant);
        debug!(
            tenant = %tenant,
            max_bytes = quota.max_bytes,
            max_objects = quota.max_objects,
            "limits stored"
        );
        Ok(())
    }

    pub fn invalidate(&self, tenant: &TenantRef) {
        self.cache.write().remove(tenant);
    }
}
