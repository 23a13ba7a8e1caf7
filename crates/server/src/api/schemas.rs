use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use pockity_core::{ApprovalRequest, ProvisionedCredential};
use pockity_gateway::{ApprovalOutcome, MetricsSnapshot};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "not found: object user-alice/report.pdf")]
    pub error: String,
}

/// Body returned when an upload does not fit the tenant's quota.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapacityErrorResponse {
    pub error: String,
    pub quota_exceeded: bool,
    pub max_bytes: u64,
    pub max_objects: u64,
    pub file_size: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub metrics: MetricsResponse,
}

/// Gateway counters since startup.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
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

impl From<MetricsSnapshot> for MetricsResponse {
    fn from(snap: MetricsSnapshot) -> Self {
        Self {
            uploads: snap.uploads,
            upload_bytes: snap.upload_bytes,
            upload_rejections: snap.upload_rejections,
            deletes: snap.deletes,
            delete_failures: snap.delete_failures,
            ledger_failures: snap.ledger_failures,
            compensations: snap.compensations,
            approvals_submitted: snap.approvals_submitted,
            approvals_approved: snap.approvals_approved,
            approvals_rejected: snap.approvals_rejected,
            credentials_issued: snap.credentials_issued,
            reconcile_runs: snap.reconcile_runs,
            drift_detected: snap.drift_detected,
            drift_repaired: snap.drift_repaired,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    /// Names to delete, relative to the caller's namespace.
    #[schema(example = json!(["a.txt", "reports/q1.pdf"]))]
    pub file_names: Vec<String>,
}

/// Optional reviewer note for approve/reject.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ReviewRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ReconcileParams {
    /// Overwrite drifted counters (default: false, report only).
    #[serde(default)]
    pub repair: bool,
}

/// Result of approving a request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecisionResponse {
    pub request: ApprovalRequest,
    /// Issued credential for `CREATE` requests. The secret is shown once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<ProvisionedCredential>,
}

impl From<ApprovalOutcome> for ApprovalDecisionResponse {
    fn from(outcome: ApprovalOutcome) -> Self {
        Self {
            request: outcome.request,
            credential: outcome.credential,
        }
    }
}

/// Signature query of a memory-backend download URL.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SignedUrlParams {
    pub expires: i64,
    pub signature: String,
}
