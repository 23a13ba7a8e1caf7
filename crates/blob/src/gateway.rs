use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use pockity_core::{DEFAULT_CONTENT_TYPE, StoredObject, TenantRef};

use crate::error::BlobError;
use crate::namespace::{ensure_owned, object_key, validate_content_type};
use crate::store::ObjectStore;

/// Default lifetime of signed URLs.
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// Result of a successful [`ObjectGateway::put`].
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub key: String,
    pub url: String,
    pub object: StoredObject,
}

/// Tenant-aware front of an [`ObjectStore`].
///
/// Every key passing through the gateway is either built from a tenant and
/// file name or checked against the tenant prefix before the backend sees
/// it, so one tenant can never address another tenant's objects.
#[derive(Clone)]
pub struct ObjectGateway {
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

impl ObjectGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            url_ttl: DEFAULT_URL_TTL,
        }
    }

    #[must_use]
    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    /// Build the key for `file_name` under `tenant`.
    pub fn key_for(&self, tenant: &TenantRef, file_name: &str) -> Result<String, BlobError> {
        object_key(tenant, file_name)
    }

    /// Store `data` under the tenant's prefix, overwriting silently.
    pub async fn put(
        &self,
        tenant: &TenantRef,
        file_name: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<PutOutcome, BlobError> {
        let key = object_key(tenant, file_name)?;
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        validate_content_type(content_type)?;

        let object = self.store.put(&key, content_type, data).await?;
        let url = self.store.presign(&key, self.url_ttl).await?;
        debug!(key = %key, size = object.size_bytes, "object stored");
        Ok(PutOutcome { key, url, object })
    }

    /// Delete the tenant's `file_name`. [`BlobError::NotFound`] if absent.
    pub async fn delete(&self, tenant: &TenantRef, file_name: &str) -> Result<(), BlobError> {
        let key = object_key(tenant, file_name)?;
        self.store.head(&key).await?;
        self.delete_key(tenant, &key).await
    }

    /// Delete an explicit key after checking it belongs to `tenant`.
    ///
    /// Does not check that the object exists.
    pub async fn delete_key(&self, tenant: &TenantRef, key: &str) -> Result<(), BlobError> {
        ensure_owned(tenant, key)?;
        self.store.delete(key).await?;
        debug!(key = %key, "object deleted");
        Ok(())
    }

    /// Metadata of an object by full key.
    pub async fn head(&self, key: &str) -> Result<StoredObject, BlobError> {
        self.store.head(key).await
    }

    /// Metadata of the tenant's `file_name`.
    pub async fn head_file(
        &self,
        tenant: &TenantRef,
        file_name: &str,
    ) -> Result<StoredObject, BlobError> {
        let key = object_key(tenant, file_name)?;
        self.store.head(&key).await
    }

    /// Every object under the tenant prefix.
    pub async fn list(&self, tenant: &TenantRef) -> Result<Vec<StoredObject>, BlobError> {
        self.store.list(&tenant.storage_prefix()).await
    }

    /// Signed URL for an existing key.
    pub async fn url(&self, key: &str) -> Result<String, BlobError> {
        self.store.presign(key, self.url_ttl).await
    }
}
