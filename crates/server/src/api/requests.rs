use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use pockity_core::{ApprovalRequest, Caller, NewApprovalRequest, RequestId};

use super::AppState;
use super::schemas::ErrorResponse;
use crate::error::ServerError;

/// `POST /v1/requests` -- ask an admin for a new API key or higher limits.
#[utoipa::path(
    post,
    path = "/v1/requests",
    tag = "Requests",
    summary = "Submit an approval request",
    request_body = NewApprovalRequest,
    responses(
        (status = 201, description = "Request pending review", body = ApprovalRequest),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Target not owned by caller", body = ErrorResponse),
        (status = 409, description = "A request is already pending", body = ErrorResponse),
    )
)]
pub async fn submit(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Json(new): Json<NewApprovalRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let request = state.gateway.approvals().submit(&caller.tenant, new).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /v1/requests/{id}` -- one of the caller's own requests.
///
/// Requests the caller neither submitted nor is the subject of are reported
/// as missing.
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    tag = "Requests",
    summary = "Get an approval request",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "The request", body = ApprovalRequest),
        (status = 404, description = "No such request", body = ErrorResponse),
    )
)]
pub async fn get(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalRequest>, ServerError> {
    let id = RequestId::new(id);
    let request = state.gateway.approvals().get(&id).await?;
    if caller.role.is_admin()
        || request.submitted_by == caller.tenant
        || request.tenant == caller.tenant
    {
        Ok(Json(request))
    } else {
        Err(ServerError::NotFound(format!("approval request {id}")))
    }
}
