use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::warn;

use pockity_audit::{AuditEvent, AuditRecord, AuditStore};
use pockity_core::{Namespace, TenantRef};

/// Fire-and-forget audit writer shared by the gateway components.
///
/// Records are written on a [`TaskTracker`] so callers never wait on the
/// audit store; failures are logged and dropped. [`shutdown`](Self::shutdown)
/// waits for in-flight writes.
#[derive(Clone)]
pub struct AuditEmitter {
    store: Option<Arc<dyn AuditStore>>,
    tracker: TaskTracker,
    namespace: Namespace,
    ttl_seconds: Option<u64>,
}

impl AuditEmitter {
    pub fn new(
        store: Option<Arc<dyn AuditStore>>,
        namespace: Namespace,
        ttl_seconds: Option<u64>,
    ) -> Self {
        Self {
            store,
            tracker: TaskTracker::new(),
            namespace,
            ttl_seconds,
        }
    }

    /// An emitter that records nothing.
    pub fn disabled(namespace: Namespace) -> Self {
        Self::new(None, namespace, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Start a record for `tenant` in this emitter's namespace.
    pub(crate) fn event(&self, tenant: &TenantRef, event: AuditEvent) -> AuditRecord {
        AuditRecord::new(self.namespace.as_str(), tenant.to_string(), event)
            .with_ttl(self.ttl_seconds)
    }

    pub(crate) fn emit(&self, record: AuditRecord) {
        let Some(store) = &self.store else {
            return;
        };
        let store = Arc::clone(store);
        self.tracker.spawn(async move {
            let event = record.event;
            if let Err(e) = store.record(record).await {
                warn!(error = %e, event = %event, "audit recording failed");
            }
        });
    }

    /// Stop accepting records and wait for pending writes.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
