//! Admin-only endpoints: request review, cross-tenant usage, reconciliation
//! and the audit trail.

use axum::Json;
use axum::extract::{Path, Query, State};

use pockity_audit::{AuditPage, AuditQuery};
use pockity_core::{
    ApprovalFilter, ApprovalRequest, Caller, ReconcileReport, RequestId, TenantRef, UsageReport,
};

use super::AppState;
use super::schemas::{ApprovalDecisionResponse, ErrorResponse, ReconcileParams, ReviewRequest};
use crate::auth::require_admin;
use crate::error::ServerError;

fn parse_tenant(raw: &str) -> Result<TenantRef, ServerError> {
    raw.parse()
        .map_err(|e| ServerError::BadRequest(format!("invalid tenant {raw}: {e}")))
}

/// `GET /v1/admin/requests` -- filter by `status` and `tenant`.
#[utoipa::path(
    get,
    path = "/v1/admin/requests",
    tag = "Admin",
    summary = "List approval requests",
    params(
        ("status" = Option<String>, Query, description = "PENDING, APPROVED or REJECTED"),
        ("tenant" = Option<String>, Query, description = "Tenant, e.g. `user-alice`"),
    ),
    responses(
        (status = 200, description = "Matching requests, newest first", body = Vec<ApprovalRequest>),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
    )
)]
pub async fn list_requests(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Query(filter): Query<ApprovalFilter>,
) -> Result<Json<Vec<ApprovalRequest>>, ServerError> {
    require_admin(&caller)?;
    Ok(Json(state.gateway.approvals().list(&filter).await?))
}

/// `POST /v1/admin/requests/{id}/approve`
#[utoipa::path(
    post,
    path = "/v1/admin/requests/{id}/approve",
    tag = "Admin",
    summary = "Approve a request",
    params(("id" = String, Path, description = "Request id")),
    request_body(content = ReviewRequest, description = "Optional reviewer note"),
    responses(
        (status = 200, description = "Approved; CREATE requests include the new credential", body = ApprovalDecisionResponse),
        (status = 404, description = "No such request", body = ErrorResponse),
        (status = 409, description = "Already decided", body = ErrorResponse),
    )
)]
pub async fn approve(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<ApprovalDecisionResponse>, ServerError> {
    require_admin(&caller)?;
    let review = body.map(|Json(r)| r).unwrap_or_default();
    let outcome = state
        .gateway
        .approvals()
        .approve(&RequestId::new(id), &caller.actor(), review.note)
        .await?;
    Ok(Json(outcome.into()))
}

/// `POST /v1/admin/requests/{id}/reject`
#[utoipa::path(
    post,
    path = "/v1/admin/requests/{id}/reject",
    tag = "Admin",
    summary = "Reject a request",
    params(("id" = String, Path, description = "Request id")),
    request_body(content = ReviewRequest, description = "Optional reviewer note"),
    responses(
        (status = 200, description = "Rejected", body = ApprovalRequest),
        (status = 404, description = "No such request", body = ErrorResponse),
        (status = 409, description = "Already decided", body = ErrorResponse),
    )
)]
pub async fn reject(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(id): Path<String>,
    body: Option<Json<ReviewRequest>>,
) -> Result<Json<ApprovalRequest>, ServerError> {
    require_admin(&caller)?;
    let review = body.map(|Json(r)| r).unwrap_or_default();
    let request = state
        .gateway
        .approvals()
        .reject(&RequestId::new(id), &caller.actor(), review.note)
        .await?;
    Ok(Json(request))
}

/// `GET /v1/admin/tenants/{tenant}/usage`
#[utoipa::path(
    get,
    path = "/v1/admin/tenants/{tenant}/usage",
    tag = "Admin",
    summary = "Usage of any tenant",
    params(("tenant" = String, Path, description = "Tenant, e.g. `key-3f2a`")),
    responses(
        (status = 200, description = "Usage and limits", body = UsageReport),
        (status = 400, description = "Malformed tenant", body = ErrorResponse),
    )
)]
pub async fn tenant_usage(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(tenant): Path<String>,
) -> Result<Json<UsageReport>, ServerError> {
    require_admin(&caller)?;
    let tenant = parse_tenant(&tenant)?;
    Ok(Json(state.gateway.storage().usage(&tenant).await?))
}

/// `POST /v1/admin/tenants/{tenant}/reconcile?repair=true`
#[utoipa::path(
    post,
    path = "/v1/admin/tenants/{tenant}/reconcile",
    tag = "Admin",
    summary = "Reconcile a tenant's ledger",
    description = "Compares the usage counters with the object listing. With `repair=true` drifted counters are overwritten.",
    params(
        ("tenant" = String, Path, description = "Tenant"),
        ReconcileParams,
    ),
    responses(
        (status = 200, description = "Comparison result", body = ReconcileReport),
    )
)]
pub async fn reconcile(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(tenant): Path<String>,
    Query(params): Query<ReconcileParams>,
) -> Result<Json<ReconcileReport>, ServerError> {
    require_admin(&caller)?;
    let tenant = parse_tenant(&tenant)?;
    Ok(Json(
        state
            .gateway
            .reconciler()
            .reconcile_tenant(&tenant, params.repair)
            .await?,
    ))
}

/// `GET /v1/admin/audit` -- audit records of this deployment's namespace.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    summary = "Query the audit trail",
    params(AuditQuery),
    responses(
        (status = 200, description = "Matching records, newest first", body = AuditPage),
        (status = 404, description = "Audit is disabled", body = ErrorResponse),
    )
)]
pub async fn query_audit(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Query(mut query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, ServerError> {
    require_admin(&caller)?;
    let store = state
        .audit
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("audit is not enabled".into()))?;
    query.namespace = Some(state.gateway.config().namespace.to_string());
    Ok(Json(store.query(&query).await?))
}
