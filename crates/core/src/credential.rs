use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantRef;
use crate::types::{ApiKeyId, RequestId, UserId};

/// A stored API key. The secret is never persisted; only its hash is kept, as
/// the lookup index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub owner: UserId,
    pub name: String,
    /// Object-store prefix owned by this key.
    pub prefix: String,
    pub request_id: RequestId,
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    #[must_use]
    pub fn tenant(&self) -> TenantRef {
        TenantRef::ApiKey(self.id.clone())
    }
}

/// Handed back once when a key is issued.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedCredential {
    pub key_id: ApiKeyId,
    /// Plaintext secret; not retrievable again.
    pub secret: String,
    pub prefix: String,
}

impl std::fmt::Debug for ProvisionedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionedCredential")
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secret() {
        let cred = ProvisionedCredential {
            key_id: ApiKeyId::new("k1"),
            secret: "pk_supersecret".into(),
            prefix: "key-k1/".into(),
        };
        let debug = format!("{cred:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn record_tenant_is_the_key() {
        let record = ApiKeyRecord {
            id: ApiKeyId::new("k1"),
            owner: UserId::new("alice"),
            name: "ci".into(),
            prefix: "key-k1/".into(),
            request_id: RequestId::new("r1"),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["prefix"], "key-k1/");
        assert_eq!(record.tenant(), TenantRef::api_key("k1"));
    }
}
