use std::sync::Arc;

use pockity_blob::{MemoryObjectStore, ObjectStore};

use crate::config::ObjectStoreConfig;
use crate::error::ServerError;

/// The configured object store. `files` is set for the memory backend, whose
/// signed URLs are served by this process.
pub struct ObjectStoreHandle {
    pub store: Arc<dyn ObjectStore>,
    pub files: Option<Arc<MemoryObjectStore>>,
}

/// Build the object store named by `[object_store] backend`.
#[allow(clippy::unused_async)]
pub async fn create_object_store(
    config: &ObjectStoreConfig,
) -> Result<ObjectStoreHandle, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            let secret = config
                .signing_secret
                .clone()
                .unwrap_or_else(|| format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4()));
            let memory = Arc::new(MemoryObjectStore::new(&config.base_url, secret));
            Ok(ObjectStoreHandle {
                store: Arc::clone(&memory) as Arc<dyn ObjectStore>,
                files: Some(memory),
            })
        }
        #[cfg(feature = "s3")]
        "s3" => create_s3(config).await,
        other => Err(ServerError::Config(format!(
            "unsupported object store backend: {other} (is the feature enabled?)"
        ))),
    }
}

#[cfg(feature = "s3")]
async fn create_s3(config: &ObjectStoreConfig) -> Result<ObjectStoreHandle, ServerError> {
    use pockity_aws::{S3Config, S3ObjectStore};

    let bucket = config.bucket.as_deref().ok_or_else(|| {
        ServerError::Config("s3 backend requires 'bucket' in [object_store]".into())
    })?;
    let mut s3_config =
        S3Config::new(&config.region, bucket).with_force_path_style(config.force_path_style);
    if let Some(prefix) = &config.prefix {
        s3_config = s3_config.with_prefix(prefix);
    }
    if let Some(endpoint) = &config.endpoint_url {
        s3_config = s3_config.with_endpoint_url(endpoint);
    }
    if let Some(role_arn) = &config.role_arn {
        s3_config = s3_config.with_role_arn(role_arn);
    }

    let store = S3ObjectStore::new(s3_config)
        .await
        .map_err(|e| ServerError::Config(format!("s3 object store: {e}")))?;
    Ok(ObjectStoreHandle {
        store: Arc::new(store),
        files: None,
    })
}
