//! Usage accounting, quota enforcement and approval workflow for Pockity.
//!
//! [`GatewayBuilder`] wires a [`StateStore`](pockity_state::StateStore), an
//! [`ObjectStore`](pockity_blob::ObjectStore) and an optional audit store into
//! a [`Gateway`] exposing the storage, approval and credential services.

pub(crate) mod audit_helpers;
pub mod approval;
pub mod background;
pub mod builder;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod gateway;
pub mod ledger;
pub mod limits;
pub mod metrics;
pub mod policy;
pub mod reconcile;
pub mod storage;

pub use approval::{ApprovalOutcome, ApprovalWorkflow};
pub use background::{BackgroundConfig, BackgroundProcessor, BackgroundProcessorBuilder};
pub use builder::GatewayBuilder;
pub use config::{AdmissionMode, GatewayConfig};
pub use credentials::{CredentialRegistry, hash_secret};
pub use error::{CapacityExceeded, GatewayError};
pub use gate::TenantGate;
pub use gateway::Gateway;
pub use ledger::UsageLedger;
pub use limits::TenantLimits;
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use policy::QuotaPolicy;
pub use reconcile::Reconciler;
pub use storage::StorageService;
