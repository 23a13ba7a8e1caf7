use std::fmt;

use serde::{Deserialize, Serialize};

/// Where and as whom the SDK connects.
///
/// Mirrors the `region`, `endpoint_url` and `role_arn` keys of the server's
/// `[object_store]` table. An `endpoint_url` points the client at an
/// S3-compatible server such as `MinIO`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsConnection {
    pub region: String,

    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Role assumed through STS before any request is made.
    #[serde(default)]
    pub role_arn: Option<String>,
}

impl AwsConnection {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint_url: None,
            role_arn: None,
        }
    }
}

// Role ARNs carry the account number.
impl fmt::Debug for AwsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConnection")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("role_arn", &self.role_arn.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
