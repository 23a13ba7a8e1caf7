use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use pockity_core::{Namespace, TenantRef};
use pockity_state::{DistributedLock, LockGuard};

use crate::error::GatewayError;

/// Per-tenant lock serializing work that moves the usage ledger.
///
/// Uploads and deletes hold it across the store write and the ledger update,
/// and repairs hold it while they read, list and overwrite. Without a
/// configured lock the gate is open and [`TenantGate::enter`] returns `None`.
#[derive(Clone)]
pub struct TenantGate {
    lock: Option<Arc<dyn DistributedLock>>,
    namespace: Namespace,
    ttl: Duration,
    timeout: Duration,
}

impl TenantGate {
    pub fn new(
        lock: Option<Arc<dyn DistributedLock>>,
        namespace: Namespace,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            lock,
            namespace,
            ttl,
            timeout,
        }
    }

    pub fn is_locking(&self) -> bool {
        self.lock.is_some()
    }

    fn lock_name(&self, tenant: &TenantRef) -> String {
        format!("{}:usage:{tenant}", self.namespace)
    }

    pub async fn enter(
        &self,
        tenant: &TenantRef,
    ) -> Result<Option<Box<dyn LockGuard>>, GatewayError> {
        let Some(lock) = &self.lock else {
            return Ok(None);
        };
        let guard = lock
            .acquire(&self.lock_name(tenant), self.ttl, self.timeout)
            .await
            .map_err(|e| GatewayError::Lock(e.to_string()))?;
        Ok(Some(guard))
    }

    /// Like [`enter`](Self::enter), but fails when no lock is configured.
    pub async fn enter_required(
        &self,
        tenant: &TenantRef,
    ) -> Result<Box<dyn LockGuard>, GatewayError> {
        self.enter(tenant).await?.ok_or_else(|| {
            GatewayError::Configuration("strict admission requires a distributed lock".into())
        })
    }

    pub async fn leave(tenant: &TenantRef, guard: Option<Box<dyn LockGuard>>) {
        if let Some(guard) = guard
            && let Err(e) = guard.release().await
        {
            warn!(error = %e, tenant = %tenant, "failed to release tenant lock");
        }
    }
}
