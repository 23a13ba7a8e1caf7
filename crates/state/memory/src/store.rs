use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;

use pockity_state::error::StateError;
use pockity_state::key::{KeyKind, StateKey};
use pockity_state::store::{CasResult, StateStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            version: 1,
            expires_at: expiry_from_ttl(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn counter(&self, key: &str) -> Result<i64, StateError> {
        self.value.parse().map_err(|_| StateError::NotACounter {
            key: key.to_owned(),
            value: self.value.clone(),
        })
    }
}

fn expiry_from_ttl(ttl: Option<Duration>) -> Option<Instant> {
    ttl.map(|d| Instant::now() + d)
}

/// In-memory [`StateStore`] backed by a [`DashMap`].
///
/// Each operation holds the shard lock of its key for the whole
/// read-modify-write, which gives the same single-key atomicity as the
/// SQL backend. Expired entries are evicted lazily.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    data: DashMap<String, Entry>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries. Test helper.
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_expired(&self, rendered: &str) {
        self.data.remove_if(rendered, |_, entry| entry.is_expired());
    }

    fn add_to_counter(
        &self,
        key: &StateKey,
        ttl: Option<Duration>,
        apply: impl FnOnce(i64) -> i64,
    ) -> Result<i64, StateError> {
        let rendered = key.canonical();
        self.evict_expired(&rendered);

        let expires_at = expiry_from_ttl(ttl);
        let mut entry = self
            .data
            .entry(rendered.clone())
            .or_insert_with(|| Entry::new("0", None));

        let next = apply(entry.counter(&rendered)?);
        entry.value = next.to_string();
        entry.version += 1;
        if expires_at.is_some() {
            entry.expires_at = expires_at;
        }
        Ok(next)
    }

    fn scan(&self, pattern: &str) -> Vec<(String, String)> {
        self.data
            .iter()
            .filter(|e| e.key().starts_with(pattern) && !e.value().is_expired())
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let rendered = key.canonical();
        self.evict_expired(&rendered);

        match self.data.entry(rendered) {
            MapEntry::Occupied(_) => Ok(false),
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        let rendered = key.canonical();
        if let Some(entry) = self.data.get(&rendered) {
            if entry.is_expired() {
                drop(entry);
                self.evict_expired(&rendered);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        let expires_at = expiry_from_ttl(ttl);
        self.data
            .entry(key.canonical())
            .and_modify(|entry| {
                value.clone_into(&mut entry.value);
                entry.version += 1;
                entry.expires_at = expires_at;
            })
            .or_insert_with(|| Entry::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        match self.data.remove(&key.canonical()) {
            Some((_, entry)) => Ok(!entry.is_expired()),
            None => Ok(false),
        }
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        self.add_to_counter(key, ttl, |current| current.saturating_add(delta))
    }

    async fn increment_clamped(
        &self,
        key: &StateKey,
        delta: i64,
        floor: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        self.add_to_counter(key, ttl, |current| current.saturating_add(delta).max(floor))
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let rendered = key.canonical();
        self.evict_expired(&rendered);

        let Some(mut entry) = self.data.get_mut(&rendered) else {
            return Ok(CasResult::Conflict {
                current_value: None,
                current_version: 0,
            });
        };

        if entry.version != expected_version {
            return Ok(CasResult::Conflict {
                current_value: Some(entry.value.clone()),
                current_version: entry.version,
            });
        }

        new_value.clone_into(&mut entry.value);
        entry.version += 1;
        entry.expires_at = expiry_from_ttl(ttl).or(entry.expires_at);
        Ok(CasResult::Ok)
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        scope: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError> {
        let pattern = format!("{namespace}:{scope}:{kind}:{}", prefix.unwrap_or(""));
        Ok(self.scan(&pattern))
    }

    async fn scan_keys_by_kind(
        &self,
        namespace: &str,
        kind: KeyKind,
    ) -> Result<Vec<(String, String)>, StateError> {
        let ns_prefix = format!("{namespace}:");
        let kind_segment = kind.to_string();
        Ok(self
            .scan(&ns_prefix)
            .into_iter()
            .filter(|(k, _)| {
                StateKey::split_canonical(k).is_some_and(|(_, _, kind, _)| kind == kind_segment)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pockity_core::TenantRef;
    use pockity_state::key::{KeyKind, StateKey};
    use pockity_state::testing::run_store_conformance_tests;

    use super::*;

    fn usage_key(id: &str) -> StateKey {
        StateKey::for_tenant("test-ns", &TenantRef::user("alice"), KeyKind::Usage, id)
    }

    #[tokio::test]
    async fn conformance() {
        let store = MemoryStateStore::new();
        run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry_via_get() {
        let store = MemoryStateStore::new();
        let key = usage_key("ttl-expire");
        store
            .set(&key, "short-lived", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("short-lived"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn check_and_set_reclaims_expired_marker() {
        let store = MemoryStateStore::new();
        let key = usage_key("marker");
        assert!(store
            .check_and_set(&key, "v1", Some(Duration::from_secs(3)))
            .await
            .unwrap());
        assert!(!store.check_and_set(&key, "v2", None).await.unwrap());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.check_and_set(&key, "v2", None).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn increment_rejects_non_numeric_values() {
        let store = MemoryStateStore::new();
        let key = usage_key("garbage");
        store.set(&key, "not-a-number", None).await.unwrap();
        let err = store.increment(&key, 1, None).await.unwrap_err();
        assert!(matches!(err, StateError::NotACounter { .. }));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStateStore::new());
        let key = usage_key("bytes");
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                store.increment(&key, 3, None).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("150"));
    }

    #[tokio::test]
    async fn clamped_decrements_never_go_negative() {
        let store = MemoryStateStore::new();
        let key = usage_key("objects");
        store.increment(&key, 2, None).await.unwrap();
        for _ in 0..5 {
            let v = store.increment_clamped(&key, -1, 0, None).await.unwrap();
            assert!(v >= 0);
        }
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn scan_by_kind_splits_on_the_kind_segment() {
        let store = MemoryStateStore::new();
        store.set(&usage_key("bytes"), "1", None).await.unwrap();
        let limits =
            StateKey::for_tenant("test-ns", &TenantRef::user("alice"), KeyKind::Limits, "quota");
        store.set(&limits, "{}", None).await.unwrap();
        let usage = store
            .scan_keys_by_kind("test-ns", KeyKind::Usage)
            .await
            .unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].0, "test-ns:user-alice:usage:bytes");
    }
}
