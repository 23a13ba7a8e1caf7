use std::sync::Arc;
use std::time::Duration;

use pockity_audit::AuditStore;
use pockity_blob::{ObjectGateway, ObjectStore};
use pockity_core::Quota;
use pockity_state::{DistributedLock, StateStore};

use crate::approval::ApprovalWorkflow;
use crate::audit_helpers::AuditEmitter;
use crate::config::{AdmissionMode, GatewayConfig};
use crate::credentials::CredentialRegistry;
use crate::error::GatewayError;
use crate::gate::TenantGate;
use crate::gateway::Gateway;
use crate::ledger::UsageLedger;
use crate::limits::TenantLimits;
use crate::metrics::GatewayMetrics;
use crate::policy::QuotaPolicy;
use crate::reconcile::Reconciler;
use crate::storage::StorageService;

/// Builder for constructing a [`Gateway`] instance.
pub struct GatewayBuilder {
    config: GatewayConfig,
    state: Option<Arc<dyn StateStore>>,
    lock: Option<Arc<dyn DistributedLock>>,
    object_store: Option<Arc<dyn ObjectStore>>,
    url_ttl: Option<Duration>,
    audit: Option<Arc<dyn AuditStore>>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            state: None,
            lock: None,
            object_store: None,
            url_ttl: None,
            audit: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the state store backend (required).
    #[must_use]
    pub fn state(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state = Some(store);
        self
    }

    /// Set the distributed lock.
    ///
    /// Required for strict admission. In best-effort mode it still
    /// serializes store writes with ledger repairs.
    #[must_use]
    pub fn lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Set the object store backend (required).
    #[must_use]
    pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(store);
        self
    }

    /// Lifetime of signed URLs handed to callers.
    #[must_use]
    pub fn url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn audit(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(store);
        self
    }

    /// Share an existing metrics registry instead of creating one.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn default_quota(mut self, quota: Quota) -> Self {
        self.config.default_quota = quota;
        self
    }

    #[must_use]
    pub fn admission(mut self, mode: AdmissionMode) -> Self {
        self.config.admission = mode;
        self
    }

    /// Consume the builder and wire up the gateway components.
    ///
    /// Returns [`GatewayError::Configuration`] when a required backend is
    /// missing or the configuration is inconsistent.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let state = self
            .state
            .ok_or_else(|| GatewayError::Configuration("state store is required".into()))?;
        let object_store = self
            .object_store
            .ok_or_else(|| GatewayError::Configuration("object store is required".into()))?;
        if self.config.admission == AdmissionMode::Strict && self.lock.is_none() {
            return Err(GatewayError::Configuration(
                "strict admission requires a distributed lock".into(),
            ));
        }
        self.config
            .default_quota
            .validate()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        let config = self.config;
        let ns = config.namespace.clone();
        let gate = TenantGate::new(
            self.lock,
            ns.clone(),
            config.admission_lock_ttl,
            config.admission_lock_timeout,
        );
        let metrics = self.metrics.unwrap_or_default();
        let audit = AuditEmitter::new(self.audit, ns.clone(), config.audit_ttl_seconds);

        let mut objects = ObjectGateway::new(object_store);
        if let Some(ttl) = self.url_ttl {
            objects = objects.with_url_ttl(ttl);
        }

        let limits = Arc::new(TenantLimits::new(
            Arc::clone(&state),
            ns.clone(),
            config.default_quota,
            config.limits_cache_ttl,
        ));
        let ledger = Arc::new(UsageLedger::new(
            Arc::clone(&state),
            ns.clone(),
            Arc::clone(&limits),
            audit.clone(),
        ));
        let policy = Arc::new(QuotaPolicy::new(
            limits,
            Arc::clone(&ledger),
            audit.clone(),
        ));
        let credentials = Arc::new(CredentialRegistry::new(
            Arc::clone(&state),
            ns.clone(),
            Arc::clone(&metrics),
            audit.clone(),
        ));
        let approvals = Arc::new(ApprovalWorkflow::new(
            Arc::clone(&state),
            ns,
            Arc::clone(&policy),
            Arc::clone(&credentials),
            Arc::clone(&metrics),
            audit.clone(),
        ));
        let storage = Arc::new(StorageService::new(
            &config,
            objects.clone(),
            Arc::clone(&ledger),
            Arc::clone(&policy),
            gate.clone(),
            Arc::clone(&metrics),
            audit.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&ledger),
            objects,
            gate,
            Arc::clone(&metrics),
            audit.clone(),
        ));

        Ok(Gateway {
            config,
            ledger,
            policy,
            storage,
            approvals,
            credentials,
            reconciler,
            metrics,
            audit,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
