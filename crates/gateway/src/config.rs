use std::time::Duration;

use serde::{Deserialize, Serialize};

use pockity_core::{Namespace, Quota};

/// How uploads are admitted against the quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Check then increment in separate round trips. Concurrent uploads for
    /// one tenant may both pass the check and overshoot the quota.
    #[default]
    BestEffort,
    /// Serialize each tenant's uploads through a distributed lock held from
    /// the quota check until the ledger is updated.
    Strict,
}

/// Runtime settings shared by the gateway components.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Namespace under which all state and audit records are kept.
    pub namespace: Namespace,
    /// Limits applied to tenants without explicit limits.
    pub default_quota: Quota,
    pub admission: AdmissionMode,
    /// Delete a freshly written object when the ledger update after it fails.
    pub compensate_on_ledger_failure: bool,
    /// How long resolved limits are cached. Zero disables caching.
    pub limits_cache_ttl: Duration,
    /// Largest accepted upload body.
    pub max_upload_bytes: u64,
    /// Lifetime of the per-tenant lock.
    pub admission_lock_ttl: Duration,
    /// How long an upload, delete or repair waits for the per-tenant lock.
    pub admission_lock_timeout: Duration,
    /// Retention for audit records, `None` keeps them forever.
    pub audit_ttl_seconds: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            namespace: Namespace::new("pockity"),
            default_quota: Quota::default(),
            admission: AdmissionMode::BestEffort,
            compensate_on_ledger_failure: true,
            limits_cache_ttl: Duration::from_secs(60),
            max_upload_bytes: 100 * 1024 * 1024,
            admission_lock_ttl: Duration::from_secs(30),
            admission_lock_timeout: Duration::from_secs(10),
            audit_ttl_seconds: None,
        }
    }
}
