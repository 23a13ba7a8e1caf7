use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters tracking storage and workflow outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Objects stored successfully.
    pub uploads: AtomicU64,
    /// Bytes accepted across all successful uploads.
    pub upload_bytes: AtomicU64,
    /// Uploads refused because the quota would be exceeded.
    pub upload_rejections: AtomicU64,
    /// Objects deleted.
    pub deletes: AtomicU64,
    /// Deletes that failed in the object store.
    pub delete_failures: AtomicU64,
    /// Ledger updates that failed after the object store changed.
    pub ledger_failures: AtomicU64,
    /// Objects removed again after a failed ledger update.
    pub compensations: AtomicU64,
    /// Approval requests submitted.
    pub approvals_submitted: AtomicU64,
    /// Approval requests approved.
    pub approvals_approved: AtomicU64,
    /// Approval requests rejected.
    pub approvals_rejected: AtomicU64,
    /// API keys provisioned.
    pub credentials_issued: AtomicU64,
    /// Tenants reconciled against their listing.
    pub reconcile_runs: AtomicU64,
    /// Reconciliations that found the ledger out of step.
    pub drift_detected: AtomicU64,
    /// Ledgers overwritten by the reconciler.
    pub drift_repaired: AtomicU64,
}

impl GatewayMetrics {
    pub fn increment_uploads(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upload_rejections(&self) {
        self.upload_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_delete_failures(&self) {
        self.delete_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ledger_failures(&self) {
        self.ledger_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_compensations(&self) {
        self.compensations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approvals_submitted(&self) {
        self.approvals_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approvals_approved(&self) {
        self.approvals_approved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_approvals_rejected(&self) {
        self.approvals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_credentials_issued(&self) {
        self.credentials_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconcile_runs(&self) {
        self.reconcile_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_drift_detected(&self) {
        self.drift_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_drift_repaired(&self) {
        self.drift_repaired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_upload_bytes(&self, bytes: u64) {
        self.upload_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads: self.uploads.load(Ordering::Relaxed),
            upload_bytes: self.upload_bytes.load(Ordering::Relaxed),
            upload_rejections: self.upload_rejections.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
            ledger_failures: self.ledger_failures.load(Ordering::Relaxed),
            compensations: self.compensations.load(Ordering::Relaxed),
            approvals_submitted: self.approvals_submitted.load(Ordering::Relaxed),
            approvals_approved: self.approvals_approved.load(Ordering::Relaxed),
            approvals_rejected: self.approvals_rejected.load(Ordering::Relaxed),
            credentials_issued: self.credentials_issued.load(Ordering::Relaxed),
            reconcile_runs: self.reconcile_runs.load(Ordering::Relaxed),
            drift_detected: self.drift_detected.load(Ordering::Relaxed),
            drift_repaired: self.drift_repaired.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of [`GatewayMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uploads: u64,
    pub upload_bytes: u64,
    pub upload_rejections: u64,
    pub deletes: u64,
    pub delete_failures: u64,
    pub ledger_failures: u64,
    pub compensations: u64,
    pub approvals_submitted: u64,
    pub approvals_approved: u64,
    pub approvals_rejected: u64,
    pub credentials_issued: u64,
    pub reconcile_runs: u64,
    pub drift_detected: u64,
    pub drift_repaired: u64,
}
