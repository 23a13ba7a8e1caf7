//! In-memory state backend. Suitable for tests and single-node deployments;
//! nothing survives a restart.

mod lock;
mod store;

pub use lock::{MemoryDistributedLock, MemoryLockGuard};
pub use store::MemoryStateStore;
