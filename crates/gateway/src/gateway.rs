use std::sync::Arc;

use tracing::info;

use crate::approval::ApprovalWorkflow;
use crate::audit_helpers::AuditEmitter;
use crate::config::GatewayConfig;
use crate::credentials::CredentialRegistry;
use crate::ledger::UsageLedger;
use crate::metrics::GatewayMetrics;
use crate::policy::QuotaPolicy;
use crate::reconcile::Reconciler;
use crate::storage::StorageService;

/// The assembled storage gateway.
///
/// Built with [`GatewayBuilder`](crate::GatewayBuilder). Components share one
/// state store, object store, metrics registry and audit emitter.
pub struct Gateway {
    pub(crate) config: GatewayConfig,
    pub(crate) ledger: Arc<UsageLedger>,
    pub(crate) policy: Arc<QuotaPolicy>,
    pub(crate) storage: Arc<StorageService>,
    pub(crate) approvals: Arc<ApprovalWorkflow>,
    pub(crate) credentials: Arc<CredentialRegistry>,
    pub(crate) reconciler: Arc<Reconciler>,
    pub(crate) metrics: Arc<GatewayMetrics>,
    pub(crate) audit: AuditEmitter,
}

impl Gateway {
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<StorageService> {
        &self.storage
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn policy(&self) -> &Arc<QuotaPolicy> {
        &self.policy
    }

    pub fn approvals(&self) -> &Arc<ApprovalWorkflow> {
        &self.approvals
    }

    pub fn credentials(&self) -> &Arc<CredentialRegistry> {
        &self.credentials
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit.is_enabled()
    }

    /// Gracefully shut down the gateway, waiting for pending audit writes.
    ///
    /// Call this during server shutdown to avoid losing audit records.
    pub async fn shutdown(&self) {
        self.audit.shutdown().await;
        info!("gateway shutdown complete");
    }
}
