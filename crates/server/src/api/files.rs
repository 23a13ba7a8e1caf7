//! Serves signed download URLs minted by the in-memory object store.

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use pockity_blob::ObjectStore;

use super::AppState;
use super::schemas::SignedUrlParams;
use crate::error::ServerError;

/// `GET /files/{key}?expires=..&signature=..`
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<SignedUrlParams>,
) -> Result<Response, ServerError> {
    let files = state
        .files
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("file serving is not enabled".into()))?;

    if !files.verify(&key, params.expires, &params.signature, chrono::Utc::now()) {
        return Err(ServerError::Forbidden("invalid or expired signature".into()));
    }
    let data = files
        .get(&key)
        .ok_or_else(|| ServerError::NotFound(format!("object {key}")))?;
    let content_type = files
        .head(&key)
        .await
        .ok()
        .and_then(|object| object.content_type)
        .unwrap_or_else(|| pockity_core::DEFAULT_CONTENT_TYPE.to_owned());

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], data).into_response())
}
