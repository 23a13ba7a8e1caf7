//! API key issuance and lookup.
//!
//! A key record lives under [`KeyKind::ApiKey`] keyed by its id; a second
//! entry under [`KeyKind::ApiKeyHash`] maps the SHA-256 of the secret to the
//! id. The plaintext secret is only returned from [`CredentialRegistry::issue`].
//!
//! [`KeyKind::ApiKeyRequest`] binds each approval request to the one key it
//! produces, claimed with `check_and_set`. Issuing again for the same request
//! re-keys that key instead of creating another.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use pockity_audit::AuditEvent;
use pockity_core::{
    ApiKeyId, ApiKeyRecord, Namespace, ProvisionedCredential, RequestId, TenantRef, UserId,
};
use pockity_state::key::GLOBAL_SCOPE;
use pockity_state::{KeyKind, StateKey, StateStore};

use crate::audit_helpers::AuditEmitter;
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;

/// Marker at the start of every issued secret.
pub const SECRET_PREFIX: &str = "pk_";

/// Longest accepted key name.
pub const MAX_KEY_NAME_LEN: usize = 100;

/// SHA-256 of `secret`, hex encoded.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn generate_secret() -> String {
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    let mut raw = Vec::with_capacity(32);
    raw.extend_from_slice(a.as_bytes());
    raw.extend_from_slice(b.as_bytes());
    format!("{SECRET_PREFIX}{}", hex::encode(raw))
}

pub struct CredentialRegistry {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    metrics: Arc<GatewayMetrics>,
    audit: AuditEmitter,
}

impl CredentialRegistry {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: Namespace,
        metrics: Arc<GatewayMetrics>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            state,
            namespace,
            metrics,
            audit,
        }
    }

    fn record_key(&self, id: &str) -> StateKey {
        StateKey::global(self.namespace.clone(), KeyKind::ApiKey, id)
    }

    fn hash_key(&self, hash: &str) -> StateKey {
        StateKey::global(self.namespace.clone(), KeyKind::ApiKeyHash, hash)
    }

    fn request_key(&self, request_id: &RequestId) -> StateKey {
        StateKey::global(
            self.namespace.clone(),
            KeyKind::ApiKeyRequest,
            request_id.as_str(),
        )
    }

    /// The key id bound to `request_id`, binding a fresh one if none is.
    /// The flag is `true` when the binding already existed.
    async fn bind_request(&self, request_id: &RequestId) -> Result<(ApiKeyId, bool), GatewayError> {
        let key = self.request_key(request_id);
        let candidate = ApiKeyId::generate();
        if self.state.check_and_set(&key, candidate.as_str(), None).await? {
            return Ok((candidate, false));
        }
        let bound = self.state.get(&key).await?.ok_or_else(|| {
            GatewayError::Internal(format!("key binding for request {request_id} disappeared"))
        })?;
        Ok((ApiKeyId::new(bound), true))
    }

    /// Remove hash entries for `id` other than `keep`.
    async fn revoke_other_secrets(&self, id: &ApiKeyId, keep: &str) -> Result<(), GatewayError> {
        let entries = self
            .state
            .scan_keys(self.namespace.as_str(), GLOBAL_SCOPE, KeyKind::ApiKeyHash, None)
            .await?;
        for (canonical, owner) in entries {
            if owner != id.as_str() {
                continue;
            }
            let Some((_, _, _, hash)) = StateKey::split_canonical(&canonical) else {
                continue;
            };
            if hash != keep {
                self.state.delete(&self.hash_key(hash)).await?;
            }
        }
        Ok(())
    }

    /// Create the key for `request_id`, owned by `owner`, and return its
    /// one-time secret.
    ///
    /// Calling this again for the same request returns the same key with a
    /// new secret and revokes the previous one, so a retried approval never
    /// mints a second key.
    #[instrument(name = "credentials.issue", skip_all, fields(owner = %owner, request_id = %request_id))]
    pub async fn issue(
        &self,
        owner: &UserId,
        name: &str,
        request_id: &RequestId,
    ) -> Result<(ApiKeyRecord, ProvisionedCredential), GatewayError> {
        let name = name.trim();
        if name.chars().count() > MAX_KEY_NAME_LEN {
            return Err(GatewayError::Validation(format!(
                "key name exceeds {MAX_KEY_NAME_LEN} characters"
            )));
        }

        let (id, rebound) = self.bind_request(request_id).await?;
        let previous = if rebound { self.get(&id).await? } else { None };
        if let Some(previous) = &previous
            && previous.owner != *owner
        {
            return Err(GatewayError::Internal(format!(
                "request {request_id} is bound to a key owned by {}",
                previous.owner
            )));
        }

        let tenant = TenantRef::ApiKey(id.clone());
        let secret = generate_secret();
        let record = previous.unwrap_or_else(|| ApiKeyRecord {
            id: id.clone(),
            owner: owner.clone(),
            name: if name.is_empty() {
                format!("key-{}", id.as_str().chars().take(8).collect::<String>())
            } else {
                name.to_owned()
            },
            prefix: tenant.storage_prefix(),
            request_id: request_id.clone(),
            created_at: Utc::now(),
        });

        let hash = hash_secret(&secret);
        let hash_key = self.hash_key(&hash);
        if !self.state.check_and_set(&hash_key, id.as_str(), None).await? {
            return Err(GatewayError::Internal("secret hash collision".into()));
        }
        let raw = serde_json::to_string(&record)?;
        if let Err(e) = self.state.set(&self.record_key(id.as_str()), &raw, None).await {
            if let Err(cleanup) = self.state.delete(&hash_key).await {
                warn!(error = %cleanup, key_id = %id, "failed to remove unused secret hash");
            }
            return Err(e.into());
        }
        if rebound {
            self.revoke_other_secrets(&id, &hash).await?;
            info!(key_id = %id, owner = %owner, "API key re-issued");
        } else {
            self.metrics.increment_credentials_issued();
            info!(key_id = %id, owner = %owner, "API key issued");
        }

        self.audit.emit(
            self.audit
                .event(&tenant, AuditEvent::CredentialIssued)
                .with_actor(owner.as_str())
                .with_details(serde_json::json!({
                    "requestId": request_id,
                    "name": record.name,
                    "reissued": rebound,
                })),
        );

        let credential = ProvisionedCredential {
            key_id: id,
            secret,
            prefix: record.prefix.clone(),
        };
        Ok((record, credential))
    }

    /// Resolve a presented secret to its key record.
    pub async fn authenticate(&self, secret: &str) -> Result<Option<ApiKeyRecord>, GatewayError> {
        if !secret.starts_with(SECRET_PREFIX) {
            return Ok(None);
        }
        let Some(id) = self.state.get(&self.hash_key(&hash_secret(secret))).await? else {
            return Ok(None);
        };
        self.get(&ApiKeyId::new(id)).await
    }

    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, GatewayError> {
        match self.state.get(&self.record_key(id.as_str())).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Keys owned by `owner`, oldest first.
    pub async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<ApiKeyRecord>, GatewayError> {
        let entries = self
            .state
            .scan_keys(self.namespace.as_str(), GLOBAL_SCOPE, KeyKind::ApiKey, None)
            .await?;
        let mut records = Vec::new();
        for (_, raw) in entries {
            let record: ApiKeyRecord = serde_json::from_str(&raw)?;
            if record.owner == *owner {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use pockity_state_memory::MemoryStateStore;

    use super::*;

    fn registry() -> CredentialRegistry {
        let ns = Namespace::new("ns");
        CredentialRegistry::new(
            Arc::new(MemoryStateStore::new()),
            ns.clone(),
            Arc::new(GatewayMetrics::default()),
            AuditEmitter::disabled(ns),
        )
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn secrets_are_prefixed_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert!(a.starts_with(SECRET_PREFIX));
        assert_eq!(a.len(), SECRET_PREFIX.len() + 64);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn issue_then_authenticate() {
        let registry = registry();
        let owner = UserId::new("alice");
        let (record, credential) = registry
            .issue(&owner, "ci", &RequestId::new("r1"))
            .await
            .unwrap();
        assert_eq!(record.prefix, format!("key-{}/", record.id));
        assert_eq!(credential.prefix, record.prefix);
        assert_eq!(record.name, "ci");

        let found = registry.authenticate(&credential.secret).await.unwrap();
        assert_eq!(found, Some(record.clone()));
        assert!(registry.authenticate("pk_wrong").await.unwrap().is_none());
        assert!(registry.authenticate("not-a-key").await.unwrap().is_none());
        assert_eq!(registry.get(&record.id).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn list_is_per_owner() {
        let registry = registry();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        registry.issue(&alice, "one", &RequestId::new("r1")).await.unwrap();
        registry.issue(&bob, "two", &RequestId::new("r2")).await.unwrap();
        registry.issue(&alice, "", &RequestId::new("r3")).await.unwrap();

        let keys = registry.list_for_owner(&alice).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.owner == alice));
        assert!(keys.iter().any(|k| k.name.starts_with("key-")));
    }

    #[tokio::test]
    async fn reissuing_for_a_request_rekeys_the_same_key() {
        let registry = registry();
        let owner = UserId::new("alice");
        let request = RequestId::new("r1");
        let (first, old) = registry.issue(&owner, "ci", &request).await.unwrap();
        let (second, new) = registry.issue(&owner, "renamed", &request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(new.key_id, old.key_id);
        assert_ne!(new.secret, old.secret);
        assert!(registry.authenticate(&old.secret).await.unwrap().is_none());
        assert_eq!(
            registry.authenticate(&new.secret).await.unwrap(),
            Some(second)
        );
        assert_eq!(registry.list_for_owner(&owner).await.unwrap().len(), 1);
        assert_eq!(registry.metrics.snapshot().credentials_issued, 1);

        // A request bound to alice's key cannot hand it to someone else.
        let err = registry
            .issue(&UserId::new("mallory"), "", &request)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Internal(_)));
    }

    #[tokio::test]
    async fn long_names_are_rejected() {
        let registry = registry();
        let err = registry
            .issue(&UserId::new("a"), &"n".repeat(MAX_KEY_NAME_LEN + 1), &RequestId::new("r"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
