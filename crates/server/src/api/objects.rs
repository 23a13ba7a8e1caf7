//! Object endpoints. Every path is relative to the caller's own namespace.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;

use pockity_core::{
    BulkDeleteReport, Caller, DeletedObject, ObjectEntry, ObjectListing, UploadReceipt,
};

use super::AppState;
use super::schemas::{BulkDeleteRequest, CapacityErrorResponse, ErrorResponse};
use crate::error::ServerError;

/// `PUT /v1/objects/{file_name}` -- store the request body as `file_name`.
#[utoipa::path(
    put,
    path = "/v1/objects/{file_name}",
    tag = "Objects",
    summary = "Upload an object",
    description = "Stores the raw request body. An existing object with the same name is replaced and only the size difference counts against the quota.",
    params(("file_name" = String, Path, description = "Object name, may contain `/`")),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Stored", body = UploadReceipt),
        (status = 400, description = "Invalid name, content type or size", body = ErrorResponse),
        (status = 413, description = "Quota exceeded", body = CapacityErrorResponse),
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(file_name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let receipt = state
        .gateway
        .storage()
        .upload(&caller.tenant, &file_name, body, content_type)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /v1/objects` -- every object the caller owns.
#[utoipa::path(
    get,
    path = "/v1/objects",
    tag = "Objects",
    summary = "List objects",
    responses(
        (status = 200, description = "Objects with signed URLs", body = ObjectListing),
    )
)]
pub async fn list(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
) -> Result<Json<ObjectListing>, ServerError> {
    Ok(Json(state.gateway.storage().list(&caller.tenant).await?))
}

/// `GET /v1/objects/{file_name}` -- metadata and a signed URL.
#[utoipa::path(
    get,
    path = "/v1/objects/{file_name}",
    tag = "Objects",
    summary = "Describe an object",
    params(("file_name" = String, Path, description = "Object name")),
    responses(
        (status = 200, description = "Object metadata", body = ObjectEntry),
        (status = 404, description = "No such object", body = ErrorResponse),
    )
)]
pub async fn head(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(file_name): Path<String>,
) -> Result<Json<ObjectEntry>, ServerError> {
    Ok(Json(
        state
            .gateway
            .storage()
            .head(&caller.tenant, &file_name)
            .await?,
    ))
}

/// `DELETE /v1/objects/{file_name}`
#[utoipa::path(
    delete,
    path = "/v1/objects/{file_name}",
    tag = "Objects",
    summary = "Delete an object",
    params(("file_name" = String, Path, description = "Object name")),
    responses(
        (status = 200, description = "Deleted", body = DeletedObject),
        (status = 404, description = "No such object", body = ErrorResponse),
    )
)]
pub async fn delete(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Path(file_name): Path<String>,
) -> Result<Json<DeletedObject>, ServerError> {
    Ok(Json(
        state
            .gateway
            .storage()
            .delete(&caller.tenant, &file_name)
            .await?,
    ))
}

/// `POST /v1/objects/bulk-delete` -- per-item results, never fails as a whole.
#[utoipa::path(
    post,
    path = "/v1/objects/bulk-delete",
    tag = "Objects",
    summary = "Delete several objects",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Per-object results", body = BulkDeleteReport),
        (status = 400, description = "Empty request", body = ErrorResponse),
    )
)]
pub async fn bulk_delete(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteReport>, ServerError> {
    if req.file_names.is_empty() {
        return Err(ServerError::BadRequest("fileNames must not be empty".into()));
    }
    Ok(Json(
        state
            .gateway
            .storage()
            .bulk_delete(&caller.tenant, &req.file_names)
            .await,
    ))
}
