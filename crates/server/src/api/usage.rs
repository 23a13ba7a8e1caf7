use axum::Json;
use axum::extract::State;

use pockity_core::{ApiKeyRecord, Caller, UsageReport};

use super::AppState;
use super::schemas::ErrorResponse;
use crate::error::ServerError;

/// `GET /v1/usage` -- the caller's usage joined with its limits.
#[utoipa::path(
    get,
    path = "/v1/usage",
    tag = "Usage",
    summary = "Current usage",
    responses(
        (status = 200, description = "Usage and limits", body = UsageReport),
    )
)]
pub async fn usage(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
) -> Result<Json<UsageReport>, ServerError> {
    Ok(Json(state.gateway.storage().usage(&caller.tenant).await?))
}

/// `GET /v1/keys` -- API keys issued to the calling user.
#[utoipa::path(
    get,
    path = "/v1/keys",
    tag = "Usage",
    summary = "List API keys",
    responses(
        (status = 200, description = "Issued keys, without secrets", body = Vec<ApiKeyRecord>),
        (status = 403, description = "Called with an API key", body = ErrorResponse),
    )
)]
pub async fn list_keys(
    State(state): State<AppState>,
    axum::Extension(caller): axum::Extension<Caller>,
) -> Result<Json<Vec<ApiKeyRecord>>, ServerError> {
    let owner = caller
        .tenant
        .as_user()
        .ok_or_else(|| ServerError::Forbidden("API keys cannot list keys".into()))?;
    Ok(Json(state.gateway.credentials().list_for_owner(owner).await?))
}
