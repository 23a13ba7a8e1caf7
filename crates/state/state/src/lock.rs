use std::time::Duration;

use async_trait::async_trait;

use crate::error::StateError;

/// A held lock. Dropping it without `release` leaves the lock to expire
/// after its TTL.
#[async_trait]
pub trait LockGuard: Send + Sync {
    /// Push the expiry out to `duration` from now.
    async fn extend(&self, duration: Duration) -> Result<(), StateError>;

    /// Release the lock.
    async fn release(self: Box<Self>) -> Result<(), StateError>;

    /// Whether this guard still owns the lock.
    async fn is_held(&self) -> Result<bool, StateError>;
}

/// Named mutual exclusion shared by every process using the same backend.
///
/// Used to serialize ledger-affecting work per tenant.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try once. Returns `None` when another owner holds the lock.
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StateError>;

    /// Wait up to `timeout` for the lock.
    ///
    /// Fails with [`StateError::Timeout`] when the lock stays contended.
    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StateError>;
}
