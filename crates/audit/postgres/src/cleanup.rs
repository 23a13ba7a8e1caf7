use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use pockity_audit::store::AuditStore;

/// Spawn a task that deletes expired audit records every `interval`.
///
/// The first run happens one interval after startup. Abort the returned
/// handle on shutdown.
pub fn spawn_cleanup_task(
    store: Arc<dyn AuditStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.tick().await;

        loop {
            timer.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => {}
                Ok(n) => info!(removed = n, "audit cleanup removed expired records"),
                Err(e) => warn!(error = %e, "audit cleanup failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pockity_audit::{AuditEvent, AuditRecord};
    use pockity_audit_memory::MemoryAuditStore;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cleanup_runs_after_first_interval() {
        let store = Arc::new(MemoryAuditStore::new());
        let mut expired = AuditRecord::new("ns", "user-a", AuditEvent::ObjectDeleted);
        expired.expires_at = Some(Utc::now() - chrono::Duration::seconds(5));
        store.record(expired).await.unwrap();

        let handle = spawn_cleanup_task(
            Arc::clone(&store) as Arc<dyn AuditStore>,
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.len(), 1, "no cleanup at startup");

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(store.is_empty());
        handle.abort();
    }
}
