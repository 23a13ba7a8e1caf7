use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use sha2::Sha256;

use pockity_core::StoredObject;

use crate::error::BlobError;
use crate::store::ObjectStore;

type HmacSha256 = Hmac<Sha256>;

/// Characters escaped in URL path segments. `/` stays literal so the key's
/// segments map onto the path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

#[derive(Debug, Clone)]
struct Entry {
    data: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

impl Entry {
    fn describe(&self, key: &str) -> StoredObject {
        StoredObject {
            key: key.to_owned(),
            size_bytes: self.data.len() as u64,
            last_modified: self.last_modified,
            content_type: Some(self.content_type.clone()),
        }
    }
}

/// In-process object store backed by a [`DashMap`].
///
/// Presigned URLs take the form
/// `{base_url}/{key}?expires={unix}&signature={hex}` where the key is
/// percent-encoded and the signature is an HMAC-SHA256 of the raw
/// `{key}:{expires}` under the configured secret.
pub struct MemoryObjectStore {
    objects: DashMap<String, Entry>,
    base_url: String,
    secret: Vec<u8>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        Self {
            objects: DashMap::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Number of stored objects across all tenants.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Raw content of an object, if present.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|e| e.data.clone())
    }

    /// Check a signature produced by [`ObjectStore::presign`].
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(format!("{key}:{expires}").as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn sign(&self, key: &str, expires: i64) -> Result<String, BlobError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| BlobError::Storage(format!("invalid signing key: {e}")))?;
        mac.update(format!("{key}:{expires}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("http://localhost:8080/files", b"pockity-dev-signing-secret")
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<StoredObject, BlobError> {
        let entry = Entry {
            data,
            content_type: content_type.to_owned(),
            last_modified: Utc::now(),
        };
        let stored = entry.describe(key);
        self.objects.insert(key.to_owned(), entry);
        Ok(stored)
    }

    async fn head(&self, key: &str) -> Result<StoredObject, BlobError> {
        self.objects
            .get(key)
            .map(|e| e.describe(key))
            .ok_or_else(|| BlobError::NotFound(key.to_owned()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.objects.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, BlobError> {
        let mut objects: Vec<StoredObject> = self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.value().describe(e.key()))
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| BlobError::Storage(format!("invalid url ttl: {e}")))?;
        let expires = (Utc::now() + ttl).timestamp();
        let signature = self.sign(key, expires)?;
        Ok(format!(
            "{}/{}?expires={expires}&signature={signature}",
            self.base_url,
            utf8_percent_encode(key, PATH_SEGMENT)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|kv| kv.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[tokio::test]
    async fn put_head_delete() {
        let store = MemoryObjectStore::default();
        let stored = store
            .put("user-a/x.txt", "text/plain", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 5);

        let head = store.head("user-a/x.txt").await.unwrap();
        assert_eq!(head.size_bytes, 5);
        assert_eq!(head.content_type.as_deref(), Some("text/plain"));
        assert_eq!(store.get("user-a/x.txt").unwrap(), Bytes::from_static(b"hello"));

        store.delete("user-a/x.txt").await.unwrap();
        assert!(matches!(
            store.head("user-a/x.txt").await,
            Err(BlobError::NotFound(_))
        ));
        // Deleting again is a no-op.
        store.delete("user-a/x.txt").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn put_replaces_existing() {
        let store = MemoryObjectStore::default();
        store.put("k", "text/plain", Bytes::from_static(b"1234")).await.unwrap();
        store.put("k", "application/json", Bytes::from_static(b"{}")).await.unwrap();
        let head = store.head("k").await.unwrap();
        assert_eq!(head.size_bytes, 2);
        assert_eq!(head.content_type.as_deref(), Some("application/json"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let store = MemoryObjectStore::default();
        for key in ["user-a/2", "user-a/1", "user-ab/1", "key-a/1"] {
            store.put(key, "text/plain", Bytes::from_static(b"x")).await.unwrap();
        }
        let keys: Vec<String> = store
            .list("user-a/")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["user-a/1", "user-a/2"]);
    }

    #[tokio::test]
    async fn presigned_urls_verify() {
        let store = MemoryObjectStore::new("https://files.test/", "secret");
        let url = store
            .presign("user-a/x.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("https://files.test/user-a/x.txt?expires="));

        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");
        let now = Utc::now();
        assert!(store.verify("user-a/x.txt", expires, signature, now));
        assert!(!store.verify("user-b/x.txt", expires, signature, now));
        assert!(!store.verify("user-a/x.txt", expires + 1, signature, now));

        let later = now + chrono::Duration::seconds(120);
        assert!(!store.verify("user-a/x.txt", expires, signature, later));

        let other = MemoryObjectStore::new("https://files.test", "other-secret");
        assert!(!other.verify("user-a/x.txt", expires, signature, now));
    }

    #[tokio::test]
    async fn presigned_urls_escape_reserved_characters() {
        let store = MemoryObjectStore::new("https://files.test", "secret");
        let key = "user-a/q3/report #1? 100%.pdf";
        let url = store.presign(key, Duration::from_secs(60)).await.unwrap();

        let (path, _) = url.split_once('?').unwrap();
        assert_eq!(
            path,
            "https://files.test/user-a/q3/report%20%231%3F%20100%25.pdf"
        );
        assert_eq!(url.matches('?').count(), 1);
        assert!(!url.contains('#'));

        // Signatures cover the decoded key.
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        let signature = query_param(&url, "signature");
        assert!(store.verify(key, expires, signature, Utc::now()));
    }
}
