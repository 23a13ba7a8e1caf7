use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use pockity_core::StoredObject;

use crate::error::BlobError;

/// Bucket-level primitives an object storage backend must provide.
///
/// Keys are opaque to the backend; tenant namespacing is applied by
/// [`ObjectGateway`](crate::ObjectGateway) before any call reaches here.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` at `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, BlobError>;

    /// Fetch metadata for `key`. Returns [`BlobError::NotFound`] if absent.
    async fn head(&self, key: &str) -> Result<StoredObject, BlobError>;

    /// Delete `key`. Deleting a missing key succeeds, as it does on S3.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// List every object whose key starts with `prefix`, fully materialized.
    ///
    /// `content_type` may be `None` when the backend's listing omits it.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, BlobError>;

    /// Produce a time-limited download URL for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;
}
