use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use pockity_gateway::GatewayError;

/// Errors surfaced by the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<pockity_audit::AuditError> for ServerError {
    fn from(err: pockity_audit::AuditError) -> Self {
        Self::Gateway(GatewayError::Internal(format!("audit: {err}")))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match &self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Gateway(e) => match e {
                GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
                GatewayError::Conflict(_) => StatusCode::CONFLICT,
                GatewayError::CapacityExceeded(capacity) => {
                    let mut body = serde_json::to_value(capacity)
                        .unwrap_or_else(|_| serde_json::json!({}));
                    body["error"] = serde_json::Value::String(message);
                    return (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(body)).into_response();
                }
                GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
                GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
                GatewayError::Storage(_)
                | GatewayError::State(_)
                | GatewayError::Lock(_)
                | GatewayError::Configuration(_)
                | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }
        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use pockity_gateway::CapacityExceeded;

    use super::*;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn gateway_errors_map_to_status() {
        let cases = [
            (GatewayError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (GatewayError::Conflict("x".into()), StatusCode::CONFLICT),
            (GatewayError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (GatewayError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (GatewayError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (GatewayError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, body) = body_of(ServerError::Gateway(err)).await;
            assert_eq!(status, expected);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn capacity_body_carries_limits() {
        let err = GatewayError::CapacityExceeded(CapacityExceeded {
            quota_exceeded: true,
            max_bytes: 100,
            max_objects: 5,
            file_size: 120,
        });
        let (status, body) = body_of(ServerError::Gateway(err)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["quotaExceeded"], true);
        assert_eq!(body["maxBytes"], 100);
        assert_eq!(body["maxObjects"], 5);
        assert_eq!(body["fileSize"], 120);
        assert!(body["error"].as_str().unwrap().contains("storage limit"));
    }
}
