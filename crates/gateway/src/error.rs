use serde::{Deserialize, Serialize};
use thiserror::Error;

use pockity_blob::BlobError;
use pockity_core::CoreError;
use pockity_state::StateError;

/// Details returned to the caller when an upload would exceed the quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityExceeded {
    pub quota_exceeded: bool,
    pub max_bytes: u64,
    pub max_objects: u64,
    pub file_size: u64,
}

/// Errors surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation conflicts with existing state (pending request, decided review).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(
        "storage limit exceeded: {} byte upload does not fit within {} bytes / {} objects",
        .0.file_size, .0.max_bytes, .0.max_objects
    )]
    CapacityExceeded(CapacityExceeded),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// The object store failed.
    #[error("object storage error: {0}")]
    Storage(String),

    /// The persistence layer failed.
    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("lock acquisition failed: {0}")]
    Lock(String),

    /// The gateway was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BlobError> for GatewayError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(key) => Self::NotFound(format!("object {key}")),
            BlobError::InvalidKey(_) | BlobError::InvalidContentType(_) => {
                Self::Validation(err.to_string())
            }
            BlobError::NotOwned { .. } => Self::Forbidden(err.to_string()),
            BlobError::Storage(msg) => Self::Storage(msg),
        }
    }
}

impl From<CoreError> for GatewayError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("corrupt stored record: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_errors_map_by_kind() {
        assert!(matches!(
            GatewayError::from(BlobError::NotFound("k".into())),
            GatewayError::NotFound(_)
        ));
        assert!(matches!(
            GatewayError::from(BlobError::InvalidKey("..".into())),
            GatewayError::Validation(_)
        ));
        assert!(matches!(
            GatewayError::from(BlobError::NotOwned {
                key: "user-b/x".into(),
                tenant: "user-a".into()
            }),
            GatewayError::Forbidden(_)
        ));
        assert!(matches!(
            GatewayError::from(BlobError::Storage("down".into())),
            GatewayError::Storage(_)
        ));
    }

    #[test]
    fn capacity_body_is_camel_case() {
        let body = serde_json::to_value(CapacityExceeded {
            quota_exceeded: true,
            max_bytes: 10,
            max_objects: 2,
            file_size: 11,
        })
        .unwrap();
        assert_eq!(body["quotaExceeded"], true);
        assert_eq!(body["maxBytes"], 10);
        assert_eq!(body["maxObjects"], 2);
        assert_eq!(body["fileSize"], 11);
    }
}
