//! Conformance suites shared by every state backend.

use std::time::Duration;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};
use crate::lock::DistributedLock;
use crate::store::{CasResult, StateStore};

const NS: &str = "conformance";

fn test_key(kind: KeyKind, id: &str) -> StateKey {
    StateKey::new(NS, "user-conformance", kind, id)
}

/// Run the full state store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn StateStore) -> Result<(), StateError> {
    test_get_missing(store).await?;
    test_set_and_get(store).await?;
    test_check_and_set_new(store).await?;
    test_check_and_set_existing(store).await?;
    test_delete(store).await?;
    test_increment(store).await?;
    test_increment_clamped(store).await?;
    test_increment_over_set_value(store).await?;
    test_compare_and_swap(store).await?;
    test_ttl_set(store).await?;
    test_scan_keys(store).await?;
    test_scan_keys_by_kind(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn StateStore) -> Result<(), StateError> {
    let val = store.get(&test_key(KeyKind::Limits, "missing")).await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_and_get(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Limits, "set-get");
    store.set(&key, "hello", None).await?;
    assert_eq!(store.get(&key).await?.as_deref(), Some("hello"));
    Ok(())
}

async fn test_check_and_set_new(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::PendingApproval, "cas-new");
    let created = store.check_and_set(&key, "v1", None).await?;
    assert!(created, "check_and_set on new key should return true");
    assert_eq!(store.get(&key).await?.as_deref(), Some("v1"));
    Ok(())
}

async fn test_check_and_set_existing(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::PendingApproval, "cas-existing");
    store.set(&key, "v1", None).await?;
    let created = store.check_and_set(&key, "v2", None).await?;
    assert!(!created, "check_and_set on existing key should return false");
    assert_eq!(
        store.get(&key).await?.as_deref(),
        Some("v1"),
        "original value should remain"
    );
    Ok(())
}

async fn test_delete(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Limits, "to-delete");
    store.set(&key, "bye", None).await?;
    assert!(store.delete(&key).await?, "delete should report existing key");
    assert!(store.get(&key).await?.is_none(), "get after delete");
    assert!(!store.delete(&key).await?, "delete on missing key");
    Ok(())
}

async fn test_increment(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Usage, "counter");
    assert_eq!(store.increment(&key, 1, None).await?, 1);
    assert_eq!(store.increment(&key, 5, None).await?, 6);
    assert_eq!(store.increment(&key, -2, None).await?, 4);
    Ok(())
}

async fn test_increment_clamped(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Usage, "clamped");
    assert_eq!(
        store.increment_clamped(&key, -10, 0, None).await?,
        0,
        "missing counter clamps to the floor"
    );
    assert_eq!(store.increment_clamped(&key, 7, 0, None).await?, 7);
    assert_eq!(store.increment_clamped(&key, -3, 0, None).await?, 4);
    assert_eq!(
        store.increment_clamped(&key, -100, 0, None).await?,
        0,
        "decrement past zero clamps"
    );
    assert_eq!(store.get(&key).await?.as_deref(), Some("0"));
    Ok(())
}

async fn test_increment_over_set_value(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Usage, "overwritten");
    store.set(&key, "40", None).await?;
    assert_eq!(store.increment(&key, 2, None).await?, 42);
    Ok(())
}

async fn test_compare_and_swap(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Approval, "cas-version");
    store.set(&key, "initial", None).await?;

    let result = store.compare_and_swap(&key, 999, "updated", None).await?;
    assert!(
        matches!(result, CasResult::Conflict { .. }),
        "CAS with wrong version should conflict"
    );

    let result = store.compare_and_swap(&key, 0, "ignored", None).await?;
    assert_eq!(
        result,
        CasResult::Conflict {
            current_value: Some("initial".into()),
            current_version: 1,
        },
        "CAS with version 0 should report the current version"
    );

    let result = store.compare_and_swap(&key, 1, "updated", None).await?;
    assert_eq!(result, CasResult::Ok, "CAS with correct version");
    assert_eq!(store.get(&key).await?.as_deref(), Some("updated"));

    let missing = test_key(KeyKind::Approval, "cas-missing");
    let result = store.compare_and_swap(&missing, 0, "new", None).await?;
    assert_eq!(
        result,
        CasResult::Conflict {
            current_value: None,
            current_version: 0,
        },
        "CAS on a missing key should conflict"
    );
    assert!(store.get(&missing).await?.is_none());
    Ok(())
}

async fn test_ttl_set(store: &dyn StateStore) -> Result<(), StateError> {
    let key = test_key(KeyKind::Limits, "ttl-test");
    store
        .set(&key, "ephemeral", Some(Duration::from_secs(3600)))
        .await?;
    assert_eq!(store.get(&key).await?.as_deref(), Some("ephemeral"));
    Ok(())
}

async fn test_scan_keys(store: &dyn StateStore) -> Result<(), StateError> {
    let scope = "_global";
    for id in ["req-1", "req-2", "other-1"] {
        store
            .set(&StateKey::new(NS, scope, KeyKind::ApiKey, id), id, None)
            .await?;
    }
    let mut all = store.scan_keys(NS, scope, KeyKind::ApiKey, None).await?;
    all.sort();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].0, format!("{NS}:{scope}:api_key:other-1"));

    let filtered = store
        .scan_keys(NS, scope, KeyKind::ApiKey, Some("req-"))
        .await?;
    assert_eq!(filtered.len(), 2, "prefix filter");
    Ok(())
}

async fn test_scan_keys_by_kind(store: &dyn StateStore) -> Result<(), StateError> {
    for scope in ["user-a", "user-b"] {
        store
            .set(&StateKey::new(NS, scope, KeyKind::ApiKeyHash, "h"), scope, None)
            .await?;
    }
    store
        .set(
            &StateKey::new("elsewhere", "user-c", KeyKind::ApiKeyHash, "h"),
            "x",
            None,
        )
        .await?;
    let entries = store.scan_keys_by_kind(NS, KeyKind::ApiKeyHash).await?;
    assert_eq!(entries.len(), 2, "scan is limited to one namespace");
    Ok(())
}

/// Run the full distributed lock conformance test suite.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_lock_conformance_tests(lock: &dyn DistributedLock) -> Result<(), StateError> {
    test_try_acquire_and_release(lock).await?;
    test_try_acquire_contention(lock).await?;
    test_lock_extend(lock).await?;
    test_acquire_times_out(lock).await?;
    Ok(())
}

async fn test_try_acquire_and_release(lock: &dyn DistributedLock) -> Result<(), StateError> {
    let guard = lock
        .try_acquire("admission:user-1", Duration::from_secs(10))
        .await?
        .expect("should acquire uncontested lock");
    assert!(guard.is_held().await?, "lock should be held");
    guard.release().await?;

    let again = lock
        .try_acquire("admission:user-1", Duration::from_secs(10))
        .await?;
    assert!(again.is_some(), "released lock can be taken again");
    if let Some(guard) = again {
        guard.release().await?;
    }
    Ok(())
}

async fn test_try_acquire_contention(lock: &dyn DistributedLock) -> Result<(), StateError> {
    let held = lock
        .try_acquire("admission:user-2", Duration::from_secs(10))
        .await?
        .expect("should acquire lock");

    let second = lock
        .try_acquire("admission:user-2", Duration::from_secs(10))
        .await?;
    assert!(second.is_none(), "second acquire should fail while held");

    held.release().await?;
    Ok(())
}

async fn test_lock_extend(lock: &dyn DistributedLock) -> Result<(), StateError> {
    let guard = lock
        .try_acquire("admission:user-3", Duration::from_secs(5))
        .await?
        .expect("should acquire lock");
    guard.extend(Duration::from_secs(10)).await?;
    assert!(guard.is_held().await?, "lock should still be held after extend");
    guard.release().await?;
    Ok(())
}

async fn test_acquire_times_out(lock: &dyn DistributedLock) -> Result<(), StateError> {
    let held = lock
        .try_acquire("admission:user-4", Duration::from_secs(30))
        .await?
        .expect("should acquire lock");
    let waited = lock
        .acquire(
            "admission:user-4",
            Duration::from_secs(30),
            Duration::from_millis(50),
        )
        .await;
    assert!(
        matches!(waited, Err(StateError::Timeout(_))),
        "contended acquire should time out"
    );
    held.release().await?;
    Ok(())
}
