use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use pockity_audit::{AuditEvent, AuditQuery, AuditStore};
use pockity_audit_memory::MemoryAuditStore;
use pockity_blob::MemoryObjectStore;
use pockity_core::{
    ApiKeyId, ApprovalFilter, ApprovalKind, ApprovalStatus, NewApprovalRequest, Quota, RequestId,
    TenantRef, UserId,
};
use pockity_gateway::{Gateway, GatewayBuilder, GatewayError};
use pockity_state::{CasResult, KeyKind, StateError, StateKey, StateStore};
use pockity_state_memory::MemoryStateStore;

fn user(id: &str) -> TenantRef {
    TenantRef::User(UserId::from(id))
}

fn gateway() -> Gateway {
    GatewayBuilder::new()
        .state(Arc::new(MemoryStateStore::new()))
        .object_store(Arc::new(MemoryObjectStore::default()))
        .build()
        .unwrap()
}

/// Wraps the memory store and slows or fails writes of approval records.
#[derive(Default)]
struct SlowApprovals {
    inner: MemoryStateStore,
    write_delay_ms: AtomicU64,
    failing_writes: AtomicU32,
}

impl SlowApprovals {
    fn delay_writes(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn fail_next_write(&self) {
        self.failing_writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for SlowApprovals {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        self.inner.check_and_set(key, value, ttl).await
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StateError> {
        if key.kind == KeyKind::Approval {
            let delay = self.write_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            let armed = self
                .failing_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if armed.is_ok() {
                return Err(StateError::Connection("injected write failure".into()));
            }
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        self.inner.delete(key).await
    }

    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        self.inner.increment(key, delta, ttl).await
    }

    async fn increment_clamped(
        &self,
        key: &StateKey,
        delta: i64,
        floor: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError> {
        self.inner.increment_clamped(key, delta, floor, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        self.inner
            .compare_and_swap(key, expected_version, new_value, ttl)
            .await
    }

    async fn scan_keys(
        &self,
        namespace: &str,
        scope: &str,
        kind: KeyKind,
        prefix: Option<&str>,
    ) -> Result<Vec<(String, String)>, StateError> {
        self.inner.scan_keys(namespace, scope, kind, prefix).await
    }

    async fn scan_keys_by_kind(
        &self,
        namespace: &str,
        kind: KeyKind,
    ) -> Result<Vec<(String, String)>, StateError> {
        self.inner.scan_keys_by_kind(namespace, kind).await
    }
}

fn gateway_over(state: Arc<SlowApprovals>) -> Gateway {
    GatewayBuilder::new()
        .state(state)
        .object_store(Arc::new(MemoryObjectStore::default()))
        .build()
        .unwrap()
}

fn create(bytes: u64, objects: u64) -> NewApprovalRequest {
    NewApprovalRequest {
        kind: ApprovalKind::Create,
        target: None,
        requested_bytes: bytes,
        requested_objects: objects,
        name: Some("ci uploads".into()),
        note: None,
    }
}

fn upgrade(target: Option<TenantRef>, bytes: u64, objects: u64) -> NewApprovalRequest {
    NewApprovalRequest {
        kind: ApprovalKind::Upgrade,
        target,
        requested_bytes: bytes,
        requested_objects: objects,
        name: None,
        note: Some("need more room".into()),
    }
}

/// Runs a CREATE request through approval and returns the issued key's tenant.
async fn issue_key(gateway: &Gateway, owner: &TenantRef) -> (TenantRef, String) {
    let request = gateway
        .approvals()
        .submit(owner, create(10_000, 50))
        .await
        .unwrap();
    let outcome = gateway
        .approvals()
        .approve(&request.id, "admin", None)
        .await
        .unwrap();
    let credential = outcome.credential.unwrap();
    (TenantRef::ApiKey(credential.key_id), credential.secret)
}

#[tokio::test]
async fn second_pending_request_conflicts() {
    let gateway = gateway();
    let alice = user("alice");
    gateway
        .approvals()
        .submit(&alice, create(1024, 10))
        .await
        .unwrap();

    let err = gateway
        .approvals()
        .submit(&alice, upgrade(None, 4 * 1024 * 1024 * 1024, 5000))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));

    // Another tenant is unaffected.
    gateway
        .approvals()
        .submit(&user("bob"), create(1024, 10))
        .await
        .unwrap();
}

#[tokio::test]
async fn decided_request_frees_the_pending_slot() {
    let gateway = gateway();
    let alice = user("alice");
    let first = gateway
        .approvals()
        .submit(&alice, create(1024, 10))
        .await
        .unwrap();
    gateway
        .approvals()
        .reject(&first.id, "admin", Some("too vague".into()))
        .await
        .unwrap();

    let second = gateway
        .approvals()
        .submit(&alice, create(1024, 10))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test(start_paused = true)]
async fn racing_submissions_leave_one_pending_request() {
    let state = Arc::new(SlowApprovals::default());
    state.delay_writes(Duration::from_millis(50));
    let gateway = gateway_over(state);
    let alice = user("alice");

    let first = tokio::spawn({
        let approvals = gateway.approvals().clone();
        let alice = alice.clone();
        async move { approvals.submit(&alice, create(1024, 10)).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = tokio::spawn({
        let approvals = gateway.approvals().clone();
        let alice = alice.clone();
        async move { approvals.submit(&alice, create(2048, 20)).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(GatewayError::Conflict(_))))
    );

    let pending = gateway
        .approvals()
        .list(&ApprovalFilter {
            status: Some(ApprovalStatus::Pending),
            tenant: Some(alice),
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
}

#[tokio::test]
async fn retried_approval_issues_one_key() {
    let state = Arc::new(SlowApprovals::default());
    let gateway = gateway_over(state.clone());
    let request = gateway
        .approvals()
        .submit(&user("alice"), create(1024, 10))
        .await
        .unwrap();

    // The credential is issued but the decision is never recorded.
    state.fail_next_write();
    assert!(
        gateway
            .approvals()
            .approve(&request.id, "admin", None)
            .await
            .is_err()
    );
    assert_eq!(
        gateway.approvals().get(&request.id).await.unwrap().status,
        ApprovalStatus::Pending
    );

    let outcome = gateway
        .approvals()
        .approve(&request.id, "admin", None)
        .await
        .unwrap();
    let credential = outcome.credential.unwrap();

    let keys = gateway
        .credentials()
        .list_for_owner(&UserId::from("alice"))
        .await
        .unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].id, credential.key_id);
    assert!(
        gateway
            .credentials()
            .authenticate(&credential.secret)
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(gateway.metrics().snapshot().credentials_issued, 1);
}

#[tokio::test]
async fn losing_submission_leaves_no_record() {
    let gateway = gateway();
    let alice = user("alice");
    let first = gateway
        .approvals()
        .submit(&alice, create(1024, 10))
        .await
        .unwrap();
    gateway
        .approvals()
        .reject(&first.id, "admin", None)
        .await
        .unwrap();
    let second = gateway
        .approvals()
        .submit(&alice, create(1024, 10))
        .await
        .unwrap();

    // A third submission loses to the live marker and leaves nothing behind.
    let err = gateway
        .approvals()
        .submit(&alice, create(4096, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
    let all = gateway
        .approvals()
        .list(&ApprovalFilter {
            status: None,
            tenant: Some(alice),
        })
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id) && ids.contains(&second.id));
}

#[tokio::test]
async fn approving_create_issues_a_working_credential() {
    let gateway = gateway();
    let alice = user("alice");
    let (key_tenant, secret) = issue_key(&gateway, &alice).await;

    let record = gateway
        .credentials()
        .authenticate(&secret)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.owner, UserId::from("alice"));
    assert_eq!(record.name, "ci uploads");
    assert_eq!(record.tenant(), key_tenant);

    let limits = gateway.policy().resolve_limits(&key_tenant).await.unwrap();
    assert_eq!(limits, Quota::new(10_000, 50));

    let keys = gateway
        .credentials()
        .list_for_owner(&UserId::from("alice"))
        .await
        .unwrap();
    assert_eq!(keys.len(), 1);
    assert!(gateway.credentials().authenticate("pk_wrong").await.unwrap().is_none());
}

#[tokio::test]
async fn api_keys_cannot_request_new_keys() {
    let gateway = gateway();
    let (key_tenant, _) = issue_key(&gateway, &user("alice")).await;

    let err = gateway
        .approvals()
        .submit(&key_tenant, create(1024, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(_)));
}

#[tokio::test]
async fn upgrade_raises_limits_without_lowering_either() {
    let gateway = gateway();
    let alice = user("alice");
    let default = Quota::default();

    let request = gateway
        .approvals()
        .submit(&alice, upgrade(None, default.max_bytes * 2, 10))
        .await
        .unwrap();
    assert_eq!(request.tenant, alice);
    gateway
        .approvals()
        .approve(&request.id, "admin", None)
        .await
        .unwrap();

    let limits = gateway.policy().resolve_limits(&alice).await.unwrap();
    assert_eq!(limits.max_bytes, default.max_bytes * 2);
    assert_eq!(limits.max_objects, default.max_objects);
}

#[tokio::test]
async fn upgrade_that_raises_nothing_is_rejected() {
    let gateway = gateway();
    let err = gateway
        .approvals()
        .submit(&user("alice"), upgrade(None, 10, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
}

#[tokio::test]
async fn users_may_upgrade_only_their_own_keys() {
    let gateway = gateway();
    let alice = user("alice");
    let (key_tenant, _) = issue_key(&gateway, &alice).await;

    let err = gateway
        .approvals()
        .submit(&user("mallory"), upgrade(Some(key_tenant.clone()), 20_000, 100))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Forbidden(_)));

    let err = gateway
        .approvals()
        .submit(
            &alice,
            upgrade(Some(TenantRef::ApiKey(ApiKeyId::from("nope"))), 20_000, 100),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));

    let request = gateway
        .approvals()
        .submit(&alice, upgrade(Some(key_tenant.clone()), 20_000, 100))
        .await
        .unwrap();
    assert_eq!(request.tenant, key_tenant);
    assert_eq!(request.submitted_by, alice);
}

#[tokio::test]
async fn decisions_are_final() {
    let gateway = gateway();
    let request = gateway
        .approvals()
        .submit(&user("alice"), create(1024, 10))
        .await
        .unwrap();
    let rejected = gateway
        .approvals()
        .reject(&request.id, "admin", Some("no".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(rejected.reviewer.as_deref(), Some("admin"));
    assert!(rejected.reviewed_at.is_some());

    let err = gateway
        .approvals()
        .approve(&request.id, "admin", None)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Conflict(_)));
    assert!(
        gateway
            .credentials()
            .list_for_owner(&UserId::from("alice"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let gateway = gateway();
    let id = RequestId::from("missing");
    assert!(matches!(
        gateway.approvals().get(&id).await,
        Err(GatewayError::NotFound(_))
    ));
    assert!(matches!(
        gateway.approvals().approve(&id, "admin", None).await,
        Err(GatewayError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_filters_by_status_and_tenant() {
    let gateway = gateway();
    let a = gateway
        .approvals()
        .submit(&user("alice"), create(1024, 10))
        .await
        .unwrap();
    gateway
        .approvals()
        .submit(&user("bob"), create(1024, 10))
        .await
        .unwrap();
    gateway.approvals().reject(&a.id, "admin", None).await.unwrap();

    let all = gateway
        .approvals()
        .list(&ApprovalFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let pending = gateway
        .approvals()
        .list(&ApprovalFilter {
            status: Some(ApprovalStatus::Pending),
            tenant: None,
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].tenant, user("bob"));

    let alice = gateway
        .approvals()
        .list(&ApprovalFilter {
            status: None,
            tenant: Some(user("alice")),
        })
        .await
        .unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].id, a.id);
}

#[tokio::test]
async fn workflow_is_audited() {
    let audit = Arc::new(MemoryAuditStore::new());
    let gateway = GatewayBuilder::new()
        .state(Arc::new(MemoryStateStore::new()))
        .object_store(Arc::new(MemoryObjectStore::default()))
        .audit(audit.clone())
        .build()
        .unwrap();
    let alice = user("alice");
    let request = gateway
        .approvals()
        .submit(&alice, create(1024, 10))
        .await
        .unwrap();
    gateway
        .approvals()
        .approve(&request.id, "root", None)
        .await
        .unwrap();
    gateway.shutdown().await;

    let page = audit
        .query(&AuditQuery {
            event: Some(AuditEvent::ApprovalApproved),
            ..AuditQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].actor.as_deref(), Some("root"));

    for event in [
        AuditEvent::ApprovalSubmitted,
        AuditEvent::CredentialIssued,
        AuditEvent::LimitsUpdated,
    ] {
        let page = audit
            .query(&AuditQuery {
                event: Some(event),
                ..AuditQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1, "{event}");
    }
}
