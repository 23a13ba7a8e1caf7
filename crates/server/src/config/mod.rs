mod audit;
mod auth;
mod background;
mod object_store;
mod quota;
mod server;
mod state;
mod telemetry;


pub use audit::*;
pub use auth::*;
pub use background::*;
pub use object_store::*;
pub use quota::*;
pub use server::*;
pub use state::*;
pub use telemetry::*;

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use pockity_core::{Namespace, Quota};
use pockity_gateway::{BackgroundConfig, GatewayConfig};

use crate::error::ServerError;

/// Top-level server configuration, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct PockityConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub background: BackgroundProcessingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl PockityConfig {
    /// Read the configuration at `path`. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Runtime settings for the gateway.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            namespace: Namespace::new(self.quota.namespace.as_str()),
            default_quota: Quota::new(self.quota.default_max_bytes, self.quota.default_max_objects),
            admission: self.quota.admission,
            compensate_on_ledger_failure: self.quota.compensate_on_ledger_failure,
            limits_cache_ttl: Duration::from_secs(self.quota.limits_cache_ttl_seconds),
            max_upload_bytes: self.server.max_upload_bytes,
            audit_ttl_seconds: self.audit.ttl_seconds,
            ..GatewayConfig::default()
        }
    }

    pub fn background_config(&self) -> BackgroundConfig {
        BackgroundConfig {
            enable_reconciliation: self.background.enable_reconciliation,
            reconcile_interval: Duration::from_secs(self.background.reconcile_interval_seconds),
            repair_drift: self.background.repair_drift,
        }
    }

    /// The bearer-token secret, preferring `POCKITY_JWT_SECRET` over the file.
    pub fn jwt_secret(&self) -> Option<String> {
        std::env::var("POCKITY_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.auth.jwt_secret.clone())
    }
}
