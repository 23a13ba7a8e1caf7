#![allow(clippy::needless_for_each)]

use pockity_audit::{AuditEvent, AuditPage, AuditRecord};
use pockity_core::{
    ApiKeyRecord, ApprovalKind, ApprovalRequest, ApprovalStatus, BulkDeleteItem,
    BulkDeleteReport, DeletedObject, NewApprovalRequest, ObjectEntry, ObjectListing,
    ProvisionedCredential, ReconcileReport, Role, TenantRef, UploadReceipt, UsageReport,
};

use super::schemas::{
    ApprovalDecisionResponse, BulkDeleteRequest, CapacityErrorResponse, ErrorResponse,
    HealthResponse, MetricsResponse, ReviewRequest,
};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Pockity API",
        version = "0.1.0",
        description = "Multi-tenant object storage with per-tenant quotas and admin-reviewed API keys.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Health", description = "Service health and metrics"),
        (name = "Objects", description = "Upload, list and delete the caller's objects"),
        (name = "Usage", description = "Usage, limits and issued API keys"),
        (name = "Requests", description = "API key and limit-increase requests"),
        (name = "Admin", description = "Request review, reconciliation and audit"),
    ),
    paths(
        super::health::health,
        super::health::metrics,
        super::objects::upload,
        super::objects::list,
        super::objects::head,
        super::objects::delete,
        super::objects::bulk_delete,
        super::usage::usage,
        super::usage::list_keys,
        super::requests::submit,
        super::requests::get,
        super::admin::list_requests,
        super::admin::approve,
        super::admin::reject,
        super::admin::tenant_usage,
        super::admin::reconcile,
        super::admin::query_audit,
    ),
    components(schemas(
        ErrorResponse,
        CapacityErrorResponse,
        HealthResponse,
        MetricsResponse,
        BulkDeleteRequest,
        ReviewRequest,
        ApprovalDecisionResponse,
        TenantRef,
        Role,
        UploadReceipt,
        ObjectEntry,
        ObjectListing,
        DeletedObject,
        BulkDeleteItem,
        BulkDeleteReport,
        UsageReport,
        ReconcileReport,
        ApprovalKind,
        ApprovalStatus,
        ApprovalRequest,
        NewApprovalRequest,
        ApiKeyRecord,
        ProvisionedCredential,
        AuditEvent,
        AuditRecord,
        AuditPage,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use utoipa::OpenApi;

    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/health",
            "/v1/objects",
            "/v1/objects/{file_name}",
            "/v1/objects/bulk-delete",
            "/v1/usage",
            "/v1/keys",
            "/v1/requests",
            "/v1/requests/{id}",
            "/v1/admin/requests",
            "/v1/admin/requests/{id}/approve",
            "/v1/admin/tenants/{tenant}/reconcile",
            "/v1/admin/audit",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}
