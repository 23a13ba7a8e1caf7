use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use uuid::Uuid;

use pockity_state::error::StateError;
use pockity_state::lock::{DistributedLock, LockGuard};

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct Holder {
    owner: Uuid,
    expires_at: Instant,
}

impl Holder {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

type LockTable = Arc<DashMap<String, Holder>>;

/// In-process [`DistributedLock`]. Only coordinates tasks within one process,
/// which is all a single-node deployment needs.
#[derive(Debug, Clone, Default)]
pub struct MemoryDistributedLock {
    table: LockTable,
}

impl MemoryDistributedLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for MemoryDistributedLock {
    async fn try_acquire(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Box<dyn LockGuard>>, StateError> {
        let owner = Uuid::new_v4();
        let holder = Holder {
            owner,
            expires_at: Instant::now() + ttl,
        };
        let acquired = match self.table.entry(name.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live() {
                    false
                } else {
                    occupied.insert(holder);
                    true
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(holder);
                true
            }
        };

        Ok(acquired.then(|| {
            Box::new(MemoryLockGuard {
                table: Arc::clone(&self.table),
                name: name.to_owned(),
                owner,
            }) as Box<dyn LockGuard>
        }))
    }

    async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Box<dyn LockGuard>, StateError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(guard) = self.try_acquire(name, ttl).await? {
                return Ok(guard);
            }
            if Instant::now() >= deadline {
                return Err(StateError::Timeout(timeout));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }
}

/// Guard returned by [`MemoryDistributedLock`].
#[derive(Debug)]
pub struct MemoryLockGuard {
    table: LockTable,
    name: String,
    owner: Uuid,
}

#[async_trait]
impl LockGuard for MemoryLockGuard {
    async fn extend(&self, duration: Duration) -> Result<(), StateError> {
        match self.table.get_mut(&self.name) {
            Some(mut holder) if holder.owner == self.owner && holder.is_live() => {
                holder.expires_at = Instant::now() + duration;
                Ok(())
            }
            _ => Err(StateError::LockExpired(self.name.clone())),
        }
    }

    async fn release(self: Box<Self>) -> Result<(), StateError> {
        self.table
            .remove_if(&self.name, |_, holder| holder.owner == self.owner);
        Ok(())
    }

    async fn is_held(&self) -> Result<bool, StateError> {
        Ok(self
            .table
            .get(&self.name)
            .is_some_and(|holder| holder.owner == self.owner && holder.is_live()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use pockity_state::testing::run_lock_conformance_tests;

    use super::*;

    #[tokio::test]
    async fn conformance() {
        let lock = MemoryDistributedLock::new();
        run_lock_conformance_tests(&lock)
            .await
            .expect("lock conformance tests should pass");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lock_can_be_taken_over() {
        let lock = MemoryDistributedLock::new();
        let stale = lock
            .try_acquire("admission:user-a", Duration::from_secs(2))
            .await
            .unwrap()
            .expect("should acquire");

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!stale.is_held().await.unwrap());

        let fresh = lock
            .try_acquire("admission:user-a", Duration::from_secs(10))
            .await
            .unwrap()
            .expect("should acquire after expiry");

        // The stale guard must not release the new owner's lock.
        stale.release().await.unwrap();
        assert!(fresh.is_held().await.unwrap());
        assert!(fresh.extend(Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_for_expiry() {
        let lock = MemoryDistributedLock::new();
        let _held = lock
            .try_acquire("admission:user-b", Duration::from_secs(1))
            .await
            .unwrap()
            .expect("should acquire");

        let waiter = lock.clone();
        let handle = tokio::spawn(async move {
            waiter
                .acquire(
                    "admission:user-b",
                    Duration::from_secs(5),
                    Duration::from_secs(10),
                )
                .await
        });
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn critical_sections_do_not_overlap() {
        let lock = Arc::new(MemoryDistributedLock::new());
        let inside = Arc::new(AtomicU32::new(0));
        let completed = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let completed = Arc::clone(&completed);
            handles.push(tokio::spawn(async move {
                let guard = lock
                    .acquire(
                        "admission:user-c",
                        Duration::from_secs(5),
                        Duration::from_secs(5),
                    )
                    .await
                    .expect("should eventually acquire");
                assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                guard.release().await.expect("release");
            }));
        }
        for h in handles {
            h.await.expect("task should not panic");
        }
        assert_eq!(completed.load(Ordering::SeqCst), 10);
    }
}
