use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type applied when the uploader does not supply one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata of an object held in the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    /// Tenant-prefixed key (`{tenant}/{file_name}`).
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    /// `None` when the backend does not report it (e.g. bucket listings).
    pub content_type: Option<String>,
}

/// Returned to the caller after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_name: String,
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
}

/// One entry of a tenant listing, with a shareable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    pub file_name: String,
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

/// Every object under a tenant prefix, with aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ObjectListing {
    pub objects: Vec<ObjectEntry>,
    pub count: u64,
    pub total_size: u64,
}

impl ObjectListing {
    #[must_use]
    pub fn new(objects: Vec<ObjectEntry>) -> Self {
        let total_size = objects.iter().map(|o| o.size_bytes).sum();
        Self {
            count: objects.len() as u64,
            total_size,
            objects,
        }
    }
}

/// An object removed by a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DeletedObject {
    pub file_name: String,
    pub key: String,
    pub size_bytes: u64,
}

/// Per-item outcome of a bulk delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteItem {
    pub file_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkDeleteItem {
    #[must_use]
    pub fn deleted(deleted: DeletedObject) -> Self {
        Self {
            file_name: deleted.file_name,
            success: true,
            size_bytes: Some(deleted.size_bytes),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            success: false,
            size_bytes: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of a bulk delete. Failures never abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub results: Vec<BulkDeleteItem>,
    pub succeeded: u64,
    pub failed: u64,
    pub total_size_deleted: u64,
}

impl From<Vec<BulkDeleteItem>> for BulkDeleteReport {
    fn from(results: Vec<BulkDeleteItem>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count() as u64;
        let total_size_deleted = results.iter().filter_map(|r| r.size_bytes).sum();
        Self {
            failed: results.len() as u64 - succeeded,
            succeeded,
            total_size_deleted,
            results,
        }
    }
}
