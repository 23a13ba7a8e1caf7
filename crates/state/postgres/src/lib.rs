mod config;
mod lock;
mod migrations;
mod pool;
mod store;

pub use config::PostgresConfig;
pub use lock::{PostgresDistributedLock, PostgresLockGuard};
pub use migrations::run_migrations;
pub use pool::connect;
pub use store::PostgresStateStore;
