use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use pockity_audit::error::AuditError;
use pockity_audit::record::{AuditPage, AuditQuery, AuditRecord};
use pockity_audit::store::AuditStore;

/// In-memory audit store keyed by record id. Suitable for development and
/// testing.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: DashMap<String, AuditRecord>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        self.records.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AuditRecord>, AuditError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let mut matching: Vec<AuditRecord> = self
            .records
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        // Newest first; ids are v7 UUIDs so they break timestamp ties in order.
        matching.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(AuditPage {
            records,
            total,
            limit,
            offset,
        })
    }

    async fn cleanup_expired(&self) -> Result<u64, AuditError> {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        Ok((before - self.records.len()) as u64)
    }
}
