use std::sync::Arc;

use tracing::{info, instrument, warn};

use pockity_audit::AuditEvent;
use pockity_blob::ObjectGateway;
use pockity_core::{ReconcileReport, TenantRef};

use crate::audit_helpers::AuditEmitter;
use crate::error::GatewayError;
use crate::gate::TenantGate;
use crate::ledger::UsageLedger;
use crate::metrics::GatewayMetrics;

/// Compares ledger counters with the objects actually stored and repairs
/// drift left behind by failed ledger updates.
///
/// A repair holds the tenant gate from the ledger read to the overwrite, so
/// no upload or delete can land between the listing and the new counters.
/// Without a lock there is no such guarantee and repairs are skipped.
pub struct Reconciler {
    ledger: Arc<UsageLedger>,
    objects: ObjectGateway,
    gate: TenantGate,
    metrics: Arc<GatewayMetrics>,
    audit: AuditEmitter,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<UsageLedger>,
        objects: ObjectGateway,
        gate: TenantGate,
        metrics: Arc<GatewayMetrics>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            ledger,
            objects,
            gate,
            metrics,
            audit,
        }
    }

    /// Reconcile one tenant. With `repair` set, drifted counters are
    /// overwritten with the listing totals.
    #[instrument(name = "reconcile.tenant", skip_all, fields(tenant = %tenant, repair = repair))]
    pub async fn reconcile_tenant(
        &self,
        tenant: &TenantRef,
        repair: bool,
    ) -> Result<ReconcileReport, GatewayError> {
        self.metrics.increment_reconcile_runs();
        if repair && !self.gate.is_locking() {
            warn!(tenant = %tenant, "no tenant lock configured, reporting drift without repair");
        }
        let repair = repair && self.gate.is_locking();
        let guard = if repair {
            self.gate.enter(tenant).await?
        } else {
            None
        };
        let result = self.compare(tenant, repair).await;
        TenantGate::leave(tenant, guard).await;
        let report = result?;

        if report.has_drift() {
            self.audit.emit(
                self.audit
                    .event(tenant, AuditEvent::LedgerReconciled)
                    .with_details(serde_json::to_value(&report)?),
            );
        }
        Ok(report)
    }

    async fn compare(
        &self,
        tenant: &TenantRef,
        repair: bool,
    ) -> Result<ReconcileReport, GatewayError> {
        let usage = self.ledger.get_usage(tenant).await?;
        let listing = self.objects.list(tenant).await?;

        let mut report = ReconcileReport {
            tenant: tenant.clone(),
            ledger_bytes: usage.bytes_used,
            ledger_objects: usage.object_count,
            actual_bytes: listing.iter().map(|o| o.size_bytes).sum(),
            actual_objects: listing.len() as u64,
            repaired: false,
        };
        if !report.has_drift() {
            return Ok(report);
        }

        self.metrics.increment_drift_detected();
        warn!(
            tenant = %tenant,
            ledger_bytes = report.ledger_bytes,
            actual_bytes = report.actual_bytes,
            ledger_objects = report.ledger_objects,
            actual_objects = report.actual_objects,
            "usage ledger drift detected"
        );

        if repair {
            self.ledger
                .overwrite(tenant, report.actual_bytes, report.actual_objects)
                .await?;
            report.repaired = true;
            self.metrics.increment_drift_repaired();
            info!(tenant = %tenant, "usage ledger repaired");
        }
        Ok(report)
    }

    /// Reconcile every tenant with a ledger record. Per-tenant failures are
    /// logged and skipped.
    pub async fn sweep(&self, repair: bool) -> Result<Vec<ReconcileReport>, GatewayError> {
        let tenants = self.ledger.tenants().await?;
        let mut reports = Vec::with_capacity(tenants.len());
        for tenant in &tenants {
            match self.reconcile_tenant(tenant, repair).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, tenant = %tenant, "reconciliation failed"),
            }
        }
        let drifted = reports.iter().filter(|r| r.has_drift()).count();
        info!(tenants = tenants.len(), drifted, "reconciliation sweep finished");
        Ok(reports)
    }
}
