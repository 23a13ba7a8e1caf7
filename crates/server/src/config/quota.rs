use serde::Deserialize;

use pockity_core::{DEFAULT_MAX_BYTES, DEFAULT_MAX_OBJECTS};
use pockity_gateway::AdmissionMode;

/// Quota defaults and admission behavior.
#[derive(Debug, Deserialize)]
pub struct QuotaConfig {
    /// State and audit namespace for this deployment.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_max_bytes")]
    pub default_max_bytes: u64,
    #[serde(default = "default_max_objects")]
    pub default_max_objects: u64,
    /// `"best_effort"` (default) or `"strict"`.
    #[serde(default)]
    pub admission: AdmissionMode,
    /// Delete a freshly stored object when its ledger update fails.
    #[serde(default = "default_compensate")]
    pub compensate_on_ledger_failure: bool,
    /// How long resolved tenant limits are cached.
    #[serde(default = "default_limits_cache_ttl")]
    pub limits_cache_ttl_seconds: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            default_max_bytes: default_max_bytes(),
            default_max_objects: default_max_objects(),
            admission: AdmissionMode::default(),
            compensate_on_ledger_failure: default_compensate(),
            limits_cache_ttl_seconds: default_limits_cache_ttl(),
        }
    }
}

fn default_namespace() -> String {
    "pockity".to_owned()
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_max_objects() -> u64 {
    DEFAULT_MAX_OBJECTS
}

fn default_compensate() -> bool {
    true
}

fn default_limits_cache_ttl() -> u64 {
    60
}
