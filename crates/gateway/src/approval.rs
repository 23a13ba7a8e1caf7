//! Admin-gated requests for API key issuance and limit increases.
//!
//! Storage layout, all within the gateway namespace:
//!
//! - `_global:approval:{id}`: the request record (JSON).
//! - `_global:approval:{id}:claim`: reviewer that claimed the decision.
//! - `{tenant}:pending_approval:current`: id of the tenant's pending request.
//!
//! A submission saves its record first and then takes the pending marker
//! with `check_and_set`; the loser of a race deletes its record. A marker
//! whose request has been decided is stale and is taken over with
//! `compare_and_swap` against the version it was read at, so two submitters
//! can never both replace it. Markers are never deleted.
//!
//! Only the request holding its tenant's marker can be decided. The decision
//! claim is another `check_and_set`, released again if the decision fails.
//! Approval side effects are idempotent per request, so a retried approval
//! leaves the same state as one that succeeded first time.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use pockity_audit::AuditEvent;
use pockity_core::{
    ApprovalFilter, ApprovalKind, ApprovalRequest, ApprovalStatus, Namespace, NewApprovalRequest,
    ProvisionedCredential, Quota, RequestId, TenantRef,
};
use pockity_state::key::GLOBAL_SCOPE;
use pockity_state::{CasResult, KeyKind, StateKey, StateStore};

use crate::audit_helpers::AuditEmitter;
use crate::credentials::CredentialRegistry;
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::policy::QuotaPolicy;

const PENDING_ID: &str = "current";
const CLAIM_SUFFIX: &str = ":claim";
const MAX_NOTE_LEN: usize = 1000;

/// Result of approving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub request: ApprovalRequest,
    /// Present for `CREATE` requests; the secret is shown only here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<ProvisionedCredential>,
}

fn check_note(note: Option<&str>) -> Result<(), GatewayError> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => Err(GatewayError::Validation(format!(
            "note exceeds {MAX_NOTE_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

pub struct ApprovalWorkflow {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    policy: Arc<QuotaPolicy>,
    credentials: Arc<CredentialRegistry>,
    metrics: Arc<GatewayMetrics>,
    audit: AuditEmitter,
}

impl ApprovalWorkflow {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: Namespace,
        policy: Arc<QuotaPolicy>,
        credentials: Arc<CredentialRegistry>,
        metrics: Arc<GatewayMetrics>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            state,
            namespace,
            policy,
            credentials,
            metrics,
            audit,
        }
    }

    fn request_key(&self, id: &str) -> StateKey {
        StateKey::global(self.namespace.clone(), KeyKind::Approval, id)
    }

    fn claim_key(&self, id: &str) -> StateKey {
        self.request_key(&format!("{id}{CLAIM_SUFFIX}"))
    }

    fn pending_key(&self, tenant: &TenantRef) -> StateKey {
        StateKey::for_tenant(
            self.namespace.clone(),
            tenant,
            KeyKind::PendingApproval,
            PENDING_ID,
        )
    }

    async fn load(&self, id: &RequestId) -> Result<Option<ApprovalRequest>, GatewayError> {
        match self.state.get(&self.request_key(id.as_str())).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: &ApprovalRequest) -> Result<(), GatewayError> {
        let raw = serde_json::to_string(request)?;
        self.state
            .set(&self.request_key(request.id.as_str()), &raw, None)
            .await?;
        Ok(())
    }

    /// Work out which tenant a submission applies to, enforcing who may ask.
    async fn resolve_target(
        &self,
        submitter: &TenantRef,
        new: &NewApprovalRequest,
    ) -> Result<TenantRef, GatewayError> {
        match new.kind {
            ApprovalKind::Create => {
                if submitter.as_user().is_none() {
                    return Err(GatewayError::Forbidden(
                        "only user accounts may request new API keys".into(),
                    ));
                }
                if new.target.as_ref().is_some_and(|t| t != submitter) {
                    return Err(GatewayError::Validation(
                        "CREATE requests apply to the submitting user".into(),
                    ));
                }
                Ok(submitter.clone())
            }
            ApprovalKind::Upgrade => {
                let target = new.target.clone().unwrap_or_else(|| submitter.clone());
                if target == *submitter {
                    return Ok(target);
                }
                let (Some(user), Some(key_id)) = (submitter.as_user(), target.as_api_key()) else {
                    return Err(GatewayError::Forbidden(format!(
                        "{submitter} may not request changes for {target}"
                    )));
                };
                let record = self
                    .credentials
                    .get(key_id)
                    .await?
                    .ok_or_else(|| GatewayError::NotFound(format!("API key {key_id}")))?;
                if record.owner != *user {
                    return Err(GatewayError::Forbidden(format!(
                        "API key {key_id} is not owned by {submitter}"
                    )));
                }
                Ok(target)
            }
        }
    }

    /// Take the tenant's pending marker for `id`.
    ///
    /// A marker pointing at a decided or missing request is replaced, but
    /// only if it has not changed since it was read.
    async fn claim_pending(&self, tenant: &TenantRef, id: &RequestId) -> Result<(), GatewayError> {
        let key = self.pending_key(tenant);
        if self.state.check_and_set(&key, id.as_str(), None).await? {
            return Ok(());
        }
        let conflict = || GatewayError::Conflict(format!("{tenant} already has a pending request"));

        // Version 0 never matches, so this reads the holder and its version.
        let CasResult::Conflict {
            current_value,
            current_version,
        } = self.state.compare_and_swap(&key, 0, id.as_str(), None).await?
        else {
            return Ok(());
        };
        let Some(holder) = current_value else {
            // Expired between the two calls.
            return if self.state.check_and_set(&key, id.as_str(), None).await? {
                Ok(())
            } else {
                Err(conflict())
            };
        };

        let stale = self
            .load(&RequestId::new(holder.as_str()))
            .await?
            .is_none_or(|r| r.status.is_terminal());
        if !stale {
            return Err(conflict());
        }
        match self
            .state
            .compare_and_swap(&key, current_version, id.as_str(), None)
            .await?
        {
            CasResult::Ok => {
                debug!(tenant = %tenant, previous = %holder, "replaced stale pending marker");
                Ok(())
            }
            CasResult::Conflict { .. } => Err(conflict()),
        }
    }

    /// Whether `id` holds its tenant's pending marker.
    async fn holds_pending(
        &self,
        tenant: &TenantRef,
        id: &RequestId,
    ) -> Result<bool, GatewayError> {
        let holder = self.state.get(&self.pending_key(tenant)).await?;
        Ok(holder.as_deref() == Some(id.as_str()))
    }

    async fn discard(&self, id: &RequestId) {
        if let Err(e) = self.state.delete(&self.request_key(id.as_str())).await {
            warn!(error = %e, request_id = %id, "failed to discard unclaimed request");
        }
    }

    /// Submit a request on behalf of `submitter`.
    #[instrument(name = "approval.submit", skip_all, fields(submitter = %submitter, kind = new.kind.as_str()))]
    pub async fn submit(
        &self,
        submitter: &TenantRef,
        new: NewApprovalRequest,
    ) -> Result<ApprovalRequest, GatewayError> {
        let requested = Quota::new(new.requested_bytes, new.requested_objects);
        requested.validate()?;
        check_note(new.note.as_deref())?;

        let tenant = self.resolve_target(submitter, &new).await?;
        if new.kind == ApprovalKind::Upgrade {
            let current = self.policy.resolve_limits(&tenant).await?;
            if !current.is_raised_by(&requested) {
                return Err(GatewayError::Validation(format!(
                    "requested limits do not exceed the current {} bytes / {} objects",
                    current.max_bytes, current.max_objects
                )));
            }
        }

        let request = ApprovalRequest {
            id: RequestId::generate(),
            tenant: tenant.clone(),
            kind: new.kind,
            requested_bytes: new.requested_bytes,
            requested_objects: new.requested_objects,
            status: ApprovalStatus::Pending,
            name: new.name.filter(|n| !n.trim().is_empty()),
            note: new.note,
            submitted_by: submitter.clone(),
            created_at: Utc::now(),
            reviewer: None,
            reviewed_at: None,
            review_note: None,
        };

        self.save(&request).await?;
        if let Err(e) = self.claim_pending(&tenant, &request.id).await {
            self.discard(&request.id).await;
            return Err(e);
        }

        self.metrics.increment_approvals_submitted();
        info!(request_id = %request.id, tenant = %tenant, "approval request submitted");
        self.audit.emit(
            self.audit
                .event(&tenant, AuditEvent::ApprovalSubmitted)
                .with_actor(submitter.to_string())
                .with_details(serde_json::json!({
                    "requestId": request.id,
                    "kind": request.kind,
                    "requestedBytes": request.requested_bytes,
                    "requestedObjects": request.requested_objects,
                })),
        );
        Ok(request)
    }

    pub async fn get(&self, id: &RequestId) -> Result<ApprovalRequest, GatewayError> {
        self.load(id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("request {id}")))
    }

    /// Requests matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &ApprovalFilter,
    ) -> Result<Vec<ApprovalRequest>, GatewayError> {
        let entries = self
            .state
            .scan_keys(self.namespace.as_str(), GLOBAL_SCOPE, KeyKind::Approval, None)
            .await?;
        let mut requests = Vec::new();
        for (key, raw) in entries {
            if key.ends_with(CLAIM_SUFFIX) {
                continue;
            }
            let request: ApprovalRequest = serde_json::from_str(&raw)?;
            if filter.matches(&request) {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    /// Load a pending request and take its decision claim.
    async fn claim_decision(
        &self,
        id: &RequestId,
        reviewer: &str,
    ) -> Result<ApprovalRequest, GatewayError> {
        let request = self.get(id).await?;
        if request.status.is_terminal() {
            return Err(GatewayError::Conflict(format!(
                "request {id} is already {}",
                request.status
            )));
        }
        if !self.holds_pending(&request.tenant, id).await? {
            return Err(GatewayError::Conflict(format!(
                "request {id} is not the active request of {}",
                request.tenant
            )));
        }
        if !self
            .state
            .check_and_set(&self.claim_key(id.as_str()), reviewer, None)
            .await?
        {
            return Err(GatewayError::Conflict(format!(
                "request {id} is already being reviewed"
            )));
        }
        Ok(request)
    }

    async fn release_decision(&self, id: &RequestId) {
        if let Err(e) = self.state.delete(&self.claim_key(id.as_str())).await {
            warn!(error = %e, request_id = %id, "failed to release decision claim");
        }
    }

    async fn record_decision(
        &self,
        mut request: ApprovalRequest,
        status: ApprovalStatus,
        reviewer: &str,
        note: Option<String>,
    ) -> Result<ApprovalRequest, GatewayError> {
        request.status = status;
        request.reviewer = Some(reviewer.to_owned());
        request.reviewed_at = Some(Utc::now());
        request.review_note = note;
        if let Err(e) = self.save(&request).await {
            self.release_decision(&request.id).await;
            return Err(e);
        }
        Ok(request)
    }

    async fn apply(
        &self,
        request: &ApprovalRequest,
        reviewer: &str,
    ) -> Result<Option<ProvisionedCredential>, GatewayError> {
        match request.kind {
            ApprovalKind::Create => {
                let owner = request.tenant.as_user().ok_or_else(|| {
                    GatewayError::Internal(format!(
                        "CREATE request {} belongs to non-user tenant {}",
                        request.id, request.tenant
                    ))
                })?;
                let name = request.name.as_deref().unwrap_or_default();
                let (record, credential) =
                    self.credentials.issue(owner, name, &request.id).await?;
                self.policy
                    .set_limits(&record.tenant(), request.requested_quota(), reviewer)
                    .await?;
                Ok(Some(credential))
            }
            ApprovalKind::Upgrade => {
                let current = self.policy.resolve_limits(&request.tenant).await?;
                let raised = current.raised_to(&request.requested_quota());
                self.policy
                    .set_limits(&request.tenant, raised, reviewer)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Approve a pending request and apply its effect.
    #[instrument(name = "approval.approve", skip_all, fields(request_id = %id, reviewer = %reviewer))]
    pub async fn approve(
        &self,
        id: &RequestId,
        reviewer: &str,
        note: Option<String>,
    ) -> Result<ApprovalOutcome, GatewayError> {
        check_note(note.as_deref())?;
        let request = self.claim_decision(id, reviewer).await?;

        let credential = match self.apply(&request, reviewer).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, request_id = %id, "approval side effect failed");
                self.release_decision(id).await;
                return Err(e);
            }
        };
        let request = self
            .record_decision(request, ApprovalStatus::Approved, reviewer, note)
            .await?;

        self.metrics.increment_approvals_approved();
        info!(request_id = %id, tenant = %request.tenant, "approval request approved");
        self.audit.emit(
            self.audit
                .event(&request.tenant, AuditEvent::ApprovalApproved)
                .with_actor(reviewer)
                .with_details(serde_json::json!({
                    "requestId": request.id,
                    "kind": request.kind,
                    "keyId": credential.as_ref().map(|c| c.key_id.clone()),
                })),
        );
        Ok(ApprovalOutcome {
            request,
            credential,
        })
    }

    /// Reject a pending request. Nothing else changes.
    #[instrument(name = "approval.reject", skip_all, fields(request_id = %id, reviewer = %reviewer))]
    pub async fn reject(
        &self,
        id: &RequestId,
        reviewer: &str,
        note: Option<String>,
    ) -> Result<ApprovalRequest, GatewayError> {
        check_note(note.as_deref())?;
        let request = self.claim_decision(id, reviewer).await?;
        let request = self
            .record_decision(request, ApprovalStatus::Rejected, reviewer, note)
            .await?;

        self.metrics.increment_approvals_rejected();
        info!(request_id = %id, tenant = %request.tenant, "approval request rejected");
        self.audit.emit(
            self.audit
                .event(&request.tenant, AuditEvent::ApprovalRejected)
                .with_actor(reviewer)
                .with_details(serde_json::json!({
                    "requestId": request.id,
                    "kind": request.kind,
                })),
        );
        Ok(request)
    }
}
