use std::sync::Arc;

use tracing::{info, instrument};

use pockity_audit::AuditEvent;
use pockity_core::{Quota, QuotaDecision, StoredObject, TenantRef, UsageRecord};

use crate::audit_helpers::AuditEmitter;
use crate::error::GatewayError;
use crate::ledger::UsageLedger;
use crate::limits::TenantLimits;

/// Decides whether a tenant may store more data.
pub struct QuotaPolicy {
    limits: Arc<TenantLimits>,
    ledger: Arc<UsageLedger>,
    audit: AuditEmitter,
}

impl QuotaPolicy {
    pub fn new(limits: Arc<TenantLimits>, ledger: Arc<UsageLedger>, audit: AuditEmitter) -> Self {
        Self {
            limits,
            ledger,
            audit,
        }
    }

    /// The tenant's stored limits, else the configured default.
    pub async fn resolve_limits(&self, tenant: &TenantRef) -> Result<Quota, GatewayError> {
        self.limits.resolve(tenant).await
    }

    /// Evaluate one more object of `incoming_bytes` against current usage.
    pub async fn evaluate(
        &self,
        tenant: &TenantRef,
        incoming_bytes: u64,
    ) -> Result<QuotaDecision, GatewayError> {
        self.evaluate_replacing(tenant, incoming_bytes, None).await
    }

    /// Like [`evaluate`](Self::evaluate), but credits back `replaced` first.
    ///
    /// An upload that overwrites an existing object only adds the size
    /// difference and no new object, so the projection removes the old one.
    #[instrument(name = "policy.evaluate", skip_all, fields(tenant = %tenant, incoming_bytes = incoming_bytes))]
    pub async fn evaluate_replacing(
        &self,
        tenant: &TenantRef,
        incoming_bytes: u64,
        replaced: Option<&StoredObject>,
    ) -> Result<QuotaDecision, GatewayError> {
        let usage = self.ledger.get_usage(tenant).await?;
        let quota = self.limits.resolve(tenant).await?;

        let projected = match replaced {
            Some(old) => UsageRecord {
                bytes_used: usage.bytes_used.saturating_sub(old.size_bytes),
                object_count: usage.object_count.saturating_sub(1),
                ..usage.clone()
            },
            None => usage.clone(),
        };
        let decision = QuotaDecision::evaluate(&projected, &quota, incoming_bytes);

        if decision.quota_exceeded {
            info!(
                tenant = %tenant,
                bytes_used = usage.bytes_used,
                object_count = usage.object_count,
                max_bytes = quota.max_bytes,
                max_objects = quota.max_objects,
                "upload would exceed quota"
            );
            self.audit.emit(
                self.audit
                    .event(tenant, AuditEvent::QuotaExceeded)
                    .with_bytes(incoming_bytes)
                    .with_details(serde_json::json!({
                        "bytesUsed": usage.bytes_used,
                        "objectCount": usage.object_count,
                        "maxBytes": quota.max_bytes,
                        "maxObjects": quota.max_objects,
                    })),
            );
        }
        Ok(decision)
    }

    /// Store explicit limits for `tenant`.
    pub async fn set_limits(
        &self,
        tenant: &TenantRef,
        quota: Quota,
        actor: &str,
    ) -> Result<(), GatewayError> {
        self.limits.store(tenant, quota).await?;
        info!(
            tenant = %tenant,
            max_bytes = quota.max_bytes,
            max_objects = quota.max_objects,
            "limits updated"
        );
        self.audit.emit(
            self.audit
                .event(tenant, AuditEvent::LimitsUpdated)
                .with_actor(actor)
                .with_details(serde_json::to_value(quota)?),
        );
        Ok(())
    }
}
