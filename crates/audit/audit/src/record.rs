use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// What happened. Stored as its snake-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    ObjectUploaded,
    ObjectDeleted,
    UsageIncremented,
    UsageDecremented,
    UsageAdjusted,
    QuotaExceeded,
    LimitsUpdated,
    ApprovalSubmitted,
    ApprovalApproved,
    ApprovalRejected,
    CredentialIssued,
    LedgerReconciled,
}

impl AuditEvent {
    pub const ALL: [AuditEvent; 12] = [
        Self::ObjectUploaded,
        Self::ObjectDeleted,
        Self::UsageIncremented,
        Self::UsageDecremented,
        Self::UsageAdjusted,
        Self::QuotaExceeded,
        Self::LimitsUpdated,
        Self::ApprovalSubmitted,
        Self::ApprovalApproved,
        Self::ApprovalRejected,
        Self::CredentialIssued,
        Self::LedgerReconciled,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObjectUploaded => "object_uploaded",
            Self::ObjectDeleted => "object_deleted",
            Self::UsageIncremented => "usage_incremented",
            Self::UsageDecremented => "usage_decremented",
            Self::UsageAdjusted => "usage_adjusted",
            Self::QuotaExceeded => "quota_exceeded",
            Self::LimitsUpdated => "limits_updated",
            Self::ApprovalSubmitted => "approval_submitted",
            Self::ApprovalApproved => "approval_approved",
            Self::ApprovalRejected => "approval_rejected",
            Self::CredentialIssued => "credential_issued",
            Self::LedgerReconciled => "ledger_reconciled",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditEvent {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| AuditError::Serialization(format!("unknown audit event: {s}")))
    }
}

/// One entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditRecord {
    /// UUID v7, so ids sort by creation time.
    pub id: String,
    pub namespace: String,
    /// Canonical tenant reference (`user-…` / `key-…`).
    pub tenant: String,
    pub event: AuditEvent,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    /// Who caused the event, when it was not the tenant itself.
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuditRecord {
    #[must_use]
    pub fn new(namespace: impl Into<String>, tenant: impl Into<String>, event: AuditEvent) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            namespace: namespace.into(),
            tenant: tenant.into(),
            event,
            file_name: None,
            bytes: None,
            actor: None,
            details: serde_json::Value::Null,
            recorded_at: Utc::now(),
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Expire the record `ttl_seconds` after it was recorded.
    #[must_use]
    pub fn with_ttl(mut self, ttl_seconds: Option<u64>) -> Self {
        self.expires_at = ttl_seconds
            .and_then(|s| i64::try_from(s).ok())
            .map(|s| self.recorded_at + chrono::Duration::seconds(s));
        self
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Query parameters for searching audit records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema, utoipa::IntoParams))]
pub struct AuditQuery {
    pub namespace: Option<String>,
    pub tenant: Option<String>,
    pub event: Option<AuditEvent>,
    pub file_name: Option<String>,
    pub actor: Option<String>,
    /// Only records at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only records at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of records to return (default 50, max 1000).
    pub limit: Option<u32>,
    /// Number of records to skip for pagination.
    pub offset: Option<u32>,
}

impl AuditQuery {
    /// Return the effective limit, clamped to 1..=1000, defaulting to 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 1000)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// In-process filter shared by backends that cannot push it down.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.namespace.as_ref().is_none_or(|n| *n == record.namespace)
            && self.tenant.as_ref().is_none_or(|t| *t == record.tenant)
            && self.event.is_none_or(|e| e == record.event)
            && self
                .file_name
                .as_ref()
                .is_none_or(|f| record.file_name.as_ref() == Some(f))
            && self
                .actor
                .as_ref()
                .is_none_or(|a| record.actor.as_ref() == Some(a))
            && self.from.is_none_or(|from| record.recorded_at >= from)
            && self.to.is_none_or(|to| record.recorded_at <= to)
    }
}

/// A paginated page of audit records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditPage {
    pub records: Vec<AuditRecord>,
    /// Total number of records matching the query (before pagination).
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}
