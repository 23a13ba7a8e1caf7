use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use pockity_blob::{BlobError, ObjectStore};
use pockity_core::StoredObject;

use crate::auth::build_sdk_config;
use crate::config::AwsConnection;
use crate::error::{AwsError, classify_sdk_error};

/// Configuration for the S3 object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(flatten)]
    pub aws: AwsConnection,

    /// Bucket holding every tenant's objects.
    pub bucket: String,

    /// Key prefix applied to every object (e.g. `"pockity/"`).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Use path-style addressing, required by most S3-compatible servers.
    #[serde(default)]
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            aws: AwsConnection::new(region),
            bucket: bucket.into(),
            prefix: None,
            force_path_style: false,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.aws.endpoint_url = Some(endpoint_url.into());
        self
    }

    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.aws.role_arn = Some(role_arn.into());
        self
    }

    #[must_use]
    pub fn with_force_path_style(mut self, enabled: bool) -> Self {
        self.force_path_style = enabled;
        self
    }

    fn bucket_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_owned(),
        }
    }

    fn strip_prefix<'a>(&self, bucket_key: &'a str) -> &'a str {
        self.prefix
            .as_deref()
            .and_then(|p| bucket_key.strip_prefix(p))
            .unwrap_or(bucket_key)
    }
}

/// [`ObjectStore`] backed by a single S3 bucket.
pub struct S3ObjectStore {
    config: S3Config,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3ObjectStore {
    /// Build an S3 client from the environment and the given configuration.
    pub async fn new(config: S3Config) -> Result<Self, AwsError> {
        if config.bucket.is_empty() {
            return Err(AwsError::Configuration("S3 bucket name is empty".into()));
        }
        let sdk_config = build_sdk_config(&config.aws).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);
        Ok(Self { config, client })
    }

    /// Wrap a pre-built client.
    pub fn with_client(config: S3Config, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }
}

fn sdk_failure<E, R>(op: &str, err: &SdkError<E, R>) -> BlobError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = match err.as_service_error() {
        Some(service) => format!(
            "{}: {}",
            service.code().unwrap_or("Unknown"),
            service.message().unwrap_or_default()
        ),
        None => err.to_string(),
    };
    error!(operation = op, error = %message, "S3 request failed");
    classify_sdk_error(&message).into()
}

fn to_chrono(ts: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_else(Utc::now)
}

fn to_size(len: Option<i64>) -> u64 {
    len.and_then(|n| u64::try_from(n).ok()).unwrap_or(0)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, data), fields(bucket = %self.config.bucket, size = data.len()))]
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, BlobError> {
        let size_bytes = data.len() as u64;
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(self.config.bucket_key(key))
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| sdk_failure("put_object", &e))?;

        debug!(key = %key, "S3 object uploaded");
        Ok(StoredObject {
            key: key.to_owned(),
            size_bytes,
            last_modified: Utc::now(),
            content_type: Some(content_type.to_owned()),
        })
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn head(&self, key: &str) -> Result<StoredObject, BlobError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(self.config.bucket_key(key))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(HeadObjectError::is_not_found) {
                    BlobError::NotFound(key.to_owned())
                } else {
                    sdk_failure("head_object", &e)
                }
            })?;

        Ok(StoredObject {
            key: key.to_owned(),
            size_bytes: to_size(output.content_length()),
            last_modified: to_chrono(output.last_modified()),
            content_type: output.content_type().map(str::to_owned),
        })
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(self.config.bucket_key(key))
            .send()
            .await
            .map_err(|e| sdk_failure("delete_object", &e))?;
        debug!(key = %key, "S3 object deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, BlobError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(self.config.bucket_key(prefix))
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| sdk_failure("list_objects_v2", &e))?;

            for object in page.contents() {
                let Some(bucket_key) = object.key() else {
                    continue;
                };
                objects.push(StoredObject {
                    key: self.config.strip_prefix(bucket_key).to_owned(),
                    size_bytes: to_size(object.size()),
                    last_modified: to_chrono(object.last_modified()),
                    content_type: None,
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_owned());
                }
                _ => break,
            }
        }

        debug!(prefix = %prefix, count = objects.len(), "S3 listing complete");
        Ok(objects)
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| BlobError::Storage(format!("invalid presign ttl: {e}")))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(self.config.bucket_key(key))
            .presigned(presigning)
            .await
            .map_err(|e| sdk_failure("presign_get_object", &e))?;
        Ok(request.uri().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_applied_and_stripped() {
        let config = S3Config::new("us-east-1", "bucket").with_prefix("pockity/");
        assert_eq!(config.bucket_key("user-a/x.txt"), "pockity/user-a/x.txt");
        assert_eq!(config.strip_prefix("pockity/user-a/x.txt"), "user-a/x.txt");

        let bare = S3Config::new("us-east-1", "bucket");
        assert_eq!(bare.bucket_key("user-a/x.txt"), "user-a/x.txt");
        assert_eq!(bare.strip_prefix("user-a/x.txt"), "user-a/x.txt");
    }

    #[test]
    fn config_builder_chain() {
        let config = S3Config::new("eu-west-1", "data")
            .with_endpoint_url("http://localhost:9000")
            .with_role_arn("arn:aws:iam::123456789012:role/pockity")
            .with_force_path_style(true);
        assert_eq!(config.bucket, "data");
        assert!(config.aws.role_arn.is_some());
        assert!(config.force_path_style);
        assert_eq!(
            config.aws.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn config_deserializes_flattened() {
        let config: S3Config = serde_json::from_str(
            r#"{"region":"us-west-2","bucket":"b"}"#,
        )
        .unwrap();
        assert_eq!(config.aws.region, "us-west-2");
        assert!(config.prefix.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    fn timestamp_conversion() {
        let ts = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        assert_eq!(to_chrono(Some(&ts)).timestamp(), 1_700_000_000);
        assert_eq!(to_size(Some(-1)), 0);
        assert_eq!(to_size(Some(42)), 42);
    }

    #[tokio::test]
    async fn empty_bucket_is_rejected() {
        let err = S3ObjectStore::new(S3Config::new("us-east-1", "")).await.unwrap_err();
        assert!(matches!(err, AwsError::Configuration(_)));
    }
}
