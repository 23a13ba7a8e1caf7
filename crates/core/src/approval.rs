use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quota::Quota;
use crate::tenant::TenantRef;
use crate::types::RequestId;

/// What an approval request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalKind {
    /// Issue a new API key to the requesting user.
    Create,
    /// Raise the stored limits of an existing tenant.
    Upgrade,
}

impl ApprovalKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Upgrade => "UPGRADE",
        }
    }
}

/// Lifecycle of an approval request. Only `Pending` can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for key issuance or a limit increase, decided once by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: RequestId,
    /// The tenant the request applies to. For `Create` this is the user who
    /// will own the new key.
    pub tenant: TenantRef,
    pub kind: ApprovalKind,
    pub requested_bytes: u64,
    pub requested_objects: u64,
    pub status: ApprovalStatus,
    /// Display name for the key a `Create` request provisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub submitted_by: TenantRef,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
}

impl ApprovalRequest {
    #[must_use]
    pub fn requested_quota(&self) -> Quota {
        Quota::new(self.requested_bytes, self.requested_objects)
    }
}

/// Submission payload for a new approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NewApprovalRequest {
    pub kind: ApprovalKind,
    /// Tenant to upgrade. Defaults to the submitter.
    #[serde(default)]
    pub target: Option<TenantRef>,
    pub requested_bytes: u64,
    pub requested_objects: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Optional filters when listing approval requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFilter {
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub tenant: Option<TenantRef>,
}

impl ApprovalFilter {
    #[must_use]
    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        self.status.is_none_or(|s| s == request.status)
            && self.tenant.as_ref().is_none_or(|t| *t == request.tenant)
    }
}
