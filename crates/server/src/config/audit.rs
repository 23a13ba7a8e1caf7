use serde::Deserialize;

/// Configuration for the audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Whether audit recording is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Which backend to use: `"memory"` or `"postgres"`.
    #[serde(default = "default_audit_backend")]
    pub backend: String,
    /// Connection URL for the `postgres` backend.
    pub url: Option<String>,
    /// Table prefix for the audit backend.
    #[serde(default = "default_audit_prefix")]
    pub prefix: String,
    /// TTL for audit records in seconds (default: 30 days).
    #[serde(default = "default_ttl")]
    pub ttl_seconds: Option<u64>,
    /// Background cleanup interval in seconds (default: 1 hour).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_audit_backend(),
            url: None,
            prefix: default_audit_prefix(),
            ttl_seconds: default_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

fn default_audit_backend() -> String {
    "memory".to_owned()
}

fn default_audit_prefix() -> String {
    "pockity_".to_owned()
}

#[allow(clippy::unnecessary_wraps)]
fn default_ttl() -> Option<u64> {
    Some(2_592_000)
}

fn default_cleanup_interval() -> u64 {
    3600
}
