use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::usage::UsageRecord;

/// Fallback byte ceiling for tenants without explicit limits (1 GiB).
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024 * 1024;

/// Fallback object ceiling for tenants without explicit limits.
pub const DEFAULT_MAX_OBJECTS: u64 = 1000;

/// The storage ceiling for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    /// Maximum total bytes the tenant may store.
    pub max_bytes: u64,
    /// Maximum number of objects the tenant may store.
    pub max_objects: u64,
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_objects: DEFAULT_MAX_OBJECTS,
        }
    }
}

impl Quota {
    #[must_use]
    pub fn new(max_bytes: u64, max_objects: u64) -> Self {
        Self {
            max_bytes,
            max_objects,
        }
    }

    /// Reject ceilings that would make every upload fail.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_bytes == 0 {
            return Err(CoreError::InvalidQuota("max_bytes must be positive".into()));
        }
        if self.max_objects == 0 {
            return Err(CoreError::InvalidQuota(
                "max_objects must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Per-dimension maximum of two ceilings.
    #[must_use]
    pub fn raised_to(&self, other: &Quota) -> Quota {
        Quota {
            max_bytes: self.max_bytes.max(other.max_bytes),
            max_objects: self.max_objects.max(other.max_objects),
        }
    }

    /// Whether `other` is larger than `self` in at least one dimension.
    #[must_use]
    pub fn is_raised_by(&self, other: &Quota) -> bool {
        other.max_bytes > self.max_bytes || other.max_objects > self.max_objects
    }
}

/// Outcome of evaluating a prospective upload against a tenant's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub can_upload: bool,
    pub quota_exceeded: bool,
    pub max_bytes: u64,
    pub max_objects: u64,
}

impl QuotaDecision {
    /// Evaluate one more object of `incoming_bytes` against `quota`.
    ///
    /// The upload is refused when either the byte total or the object count
    /// would go past its ceiling. Additions saturate, so the result is
    /// monotonic in `incoming_bytes`.
    #[must_use]
    pub fn evaluate(usage: &UsageRecord, quota: &Quota, incoming_bytes: u64) -> Self {
        let bytes_after = usage.bytes_used.saturating_add(incoming_bytes);
        let objects_after = usage.object_count.saturating_add(1);
        let quota_exceeded = bytes_after > quota.max_bytes || objects_after > quota.max_objects;
        Self {
            can_upload: !quota_exceeded,
            quota_exceeded,
            max_bytes: quota.max_bytes,
            max_objects: quota.max_objects,
        }
    }
}

/// How much of each quota dimension is consumed, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UsagePercentage {
    pub bytes: f64,
    pub objects: f64,
}

impl UsagePercentage {
    #[must_use]
    pub fn compute(usage: &UsageRecord, quota: &Quota) -> Self {
        Self {
            bytes: percentage(usage.bytes_used, quota.max_bytes),
            objects: percentage(usage.object_count, quota.max_objects),
        }
    }
}

/// `used / max` as a percentage clamped to `[0, 100]`.
///
/// A zero ceiling reads as fully consumed once anything is stored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(used: u64, max: u64) -> f64 {
    if max == 0 {
        return if used == 0 { 0.0 } else { 100.0 };
    }
    let pct = used as f64 / max as f64 * 100.0;
    pct.clamp(0.0, 100.0)
}
