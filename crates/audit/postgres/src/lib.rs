pub mod cleanup;
pub mod config;
pub mod migrations;
pub mod store;

pub use cleanup::spawn_cleanup_task;
pub use config::PostgresAuditConfig;
pub use store::PostgresAuditStore;
