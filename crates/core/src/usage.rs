use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quota::{Quota, UsagePercentage};
use crate::tenant::TenantRef;

/// Running usage counters for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub tenant: TenantRef,
    pub bytes_used: u64,
    pub object_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl UsageRecord {
    /// A zeroed record stamped with the current time.
    #[must_use]
    pub fn empty(tenant: TenantRef) -> Self {
        Self {
            tenant,
            bytes_used: 0,
            object_count: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Usage joined with the tenant's effective quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub tenant: TenantRef,
    pub bytes_used: u64,
    pub object_count: u64,
    pub last_updated: DateTime<Utc>,
    pub max_bytes: u64,
    pub max_objects: u64,
    pub usage_percentage: UsagePercentage,
}

impl UsageReport {
    #[must_use]
    pub fn new(usage: UsageRecord, quota: Quota) -> Self {
        let usage_percentage = UsagePercentage::compute(&usage, &quota);
        Self {
            tenant: usage.tenant,
            bytes_used: usage.bytes_used,
            object_count: usage.object_count,
            last_updated: usage.last_updated,
            max_bytes: quota.max_bytes,
            max_objects: quota.max_objects,
            usage_percentage,
        }
    }

    #[must_use]
    pub fn quota(&self) -> Quota {
        Quota::new(self.max_bytes, self.max_objects)
    }
}

/// Result of comparing the ledger with the objects actually stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub tenant: TenantRef,
    pub ledger_bytes: u64,
    pub ledger_objects: u64,
    pub actual_bytes: u64,
    pub actual_objects: u64,
    pub repaired: bool,
}

impl ReconcileReport {
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.ledger_bytes != self.actual_bytes || self.ledger_objects != self.actual_objects
    }
}
