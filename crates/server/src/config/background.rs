use serde::Deserialize;

/// Configuration for periodic background work.
#[derive(Debug, Deserialize)]
pub struct BackgroundProcessingConfig {
    /// Whether the ledger reconciliation sweep runs.
    #[serde(default)]
    pub enable_reconciliation: bool,
    /// How often to sweep (seconds).
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_seconds: u64,
    /// Overwrite drifted counters instead of only reporting them.
    #[serde(default = "default_repair_drift")]
    pub repair_drift: bool,
}

impl Default for BackgroundProcessingConfig {
    fn default() -> Self {
        Self {
            enable_reconciliation: false,
            reconcile_interval_seconds: default_reconcile_interval(),
            repair_drift: default_repair_drift(),
        }
    }
}

fn default_reconcile_interval() -> u64 {
    3600
}

fn default_repair_drift() -> bool {
    true
}
