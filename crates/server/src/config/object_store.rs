use serde::Deserialize;

/// Where tenant objects live.
///
/// ```toml
/// [object_store]
/// backend = "s3"
/// bucket = "pockity-objects"
/// region = "eu-west-1"
/// endpoint_url = "http://localhost:9000"
/// force_path_style = true
/// ```
#[derive(Debug, Deserialize)]
pub struct ObjectStoreConfig {
    /// `"memory"` or `"s3"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Bucket name (`s3`).
    pub bucket: Option<String>,
    /// AWS region (`s3`).
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint override for S3-compatible servers.
    pub endpoint_url: Option<String>,
    /// IAM role to assume for bucket access (`s3`).
    pub role_arn: Option<String>,
    /// Deployment-wide key prefix (`s3`).
    pub prefix: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Lifetime of signed URLs handed to callers.
    #[serde(default = "default_url_ttl")]
    pub url_ttl_seconds: u64,
    /// Public base of signed download URLs (`memory`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// HMAC secret for signed download URLs (`memory`). A random secret is
    /// generated when unset, so URLs do not survive restarts.
    pub signing_secret: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: None,
            region: default_region(),
            endpoint_url: None,
            role_arn: None,
            prefix: None,
            force_path_style: false,
            url_ttl_seconds: default_url_ttl(),
            base_url: default_base_url(),
            signing_secret: None,
        }
    }
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_region() -> String {
    "us-east-1".to_owned()
}

fn default_url_ttl() -> u64 {
    3600
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/files".to_owned()
}
