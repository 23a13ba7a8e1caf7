//! Per-tenant usage counters.
//!
//! Each tenant has three entries of kind [`KeyKind::Usage`]: `bytes`,
//! `objects` and `updated_at`. Counters are only ever changed through the
//! store's single-key atomic primitives, so concurrent mutations never lose
//! updates and decrements never go below zero.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use pockity_audit::AuditEvent;
use pockity_core::{Namespace, TenantRef, UsageRecord, UsageReport};
use pockity_state::{KeyKind, StateKey, StateStore};

use crate::audit_helpers::AuditEmitter;
use crate::error::GatewayError;
use crate::limits::TenantLimits;

const BYTES: &str = "bytes";
const OBJECTS: &str = "objects";
const UPDATED_AT: &str = "updated_at";

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn to_delta(bytes: u64) -> Result<i64, GatewayError> {
    i64::try_from(bytes)
        .map_err(|_| GatewayError::Validation(format!("{bytes} bytes exceeds the ledger range")))
}

pub struct UsageLedger {
    state: Arc<dyn StateStore>,
    namespace: Namespace,
    limits: Arc<TenantLimits>,
    audit: AuditEmitter,
}

impl UsageLedger {
    pub fn new(
        state: Arc<dyn StateStore>,
        namespace: Namespace,
        limits: Arc<TenantLimits>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            state,
            namespace,
            limits,
            audit,
        }
    }

    fn key(&self, tenant: &TenantRef, id: &str) -> StateKey {
        StateKey::for_tenant(self.namespace.clone(), tenant, KeyKind::Usage, id)
    }

    async fn touch(&self, tenant: &TenantRef) -> Result<DateTime<Utc>, GatewayError> {
        let now = Utc::now();
        self.state
            .set(&self.key(tenant, UPDATED_AT), &now.to_rfc3339(), None)
            .await?;
        Ok(now)
    }

    async fn read_counter(&self, tenant: &TenantRef, id: &str) -> Result<u64, GatewayError> {
        let raw = self.state.get(&self.key(tenant, id)).await?;
        Ok(raw
            .and_then(|v| v.parse::<i64>().ok())
            .map_or(0, to_u64))
    }

    /// Current usage for `tenant`, creating a zeroed record on first access.
    #[instrument(name = "ledger.get_usage", skip_all, fields(tenant = %tenant))]
    pub async fn get_usage(&self, tenant: &TenantRef) -> Result<UsageRecord, GatewayError> {
        let updated_key = self.key(tenant, UPDATED_AT);
        let updated = match self.state.get(&updated_key).await? {
            Some(raw) => raw,
            None => {
                // Conditional writes: an increment racing with this keeps its value.
                let now = Utc::now().to_rfc3339();
                self.state.check_and_set(&self.key(tenant, BYTES), "0", None).await?;
                self.state.check_and_set(&self.key(tenant, OBJECTS), "0", None).await?;
                self.state.check_and_set(&updated_key, &now, None).await?;
                debug!(tenant = %tenant, "initialized usage record");
                self.state.get(&updated_key).await?.unwrap_or(now)
            }
        };

        Ok(UsageRecord {
            tenant: tenant.clone(),
            bytes_used: self.read_counter(tenant, BYTES).await?,
            object_count: self.read_counter(tenant, OBJECTS).await?,
            last_updated: DateTime::parse_from_rfc3339(&updated)
                .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc)),
        })
    }

    /// Usage joined with the tenant's effective limits.
    pub async fn get_usage_with_quota(
        &self,
        tenant: &TenantRef,
    ) -> Result<UsageReport, GatewayError> {
        let usage = self.get_usage(tenant).await?;
        let quota = self.limits.resolve(tenant).await?;
        Ok(UsageReport::new(usage, quota))
    }

    /// Record a new object of `delta_bytes`.
    #[instrument(name = "ledger.increment", skip_all, fields(tenant = %tenant, bytes = delta_bytes))]
    pub async fn increment(
        &self,
        tenant: &TenantRef,
        delta_bytes: u64,
        file_name: &str,
    ) -> Result<UsageRecord, GatewayError> {
        let delta = to_delta(delta_bytes)?;
        let bytes = self
            .state
            .increment(&self.key(tenant, BYTES), delta, None)
            .await?;
        let objects = self
            .state
            .increment(&self.key(tenant, OBJECTS), 1, None)
            .await?;
        let now = self.touch(tenant).await?;

        self.audit.emit(
            self.audit
                .event(tenant, AuditEvent::UsageIncremented)
                .with_file(file_name)
                .with_bytes(delta_bytes),
        );
        Ok(UsageRecord {
            tenant: tenant.clone(),
            bytes_used: to_u64(bytes),
            object_count: to_u64(objects),
            last_updated: now,
        })
    }

    /// Record the removal of one object of `delta_bytes`, clamping at zero.
    #[instrument(name = "ledger.decrement", skip_all, fields(tenant = %tenant, bytes = delta_bytes))]
    pub async fn decrement(
        &self,
        tenant: &TenantRef,
        delta_bytes: u64,
        file_name: &str,
    ) -> Result<UsageRecord, GatewayError> {
        let delta = to_delta(delta_bytes)?;
        let bytes = self
            .state
            .increment_clamped(&self.key(tenant, BYTES), -delta, 0, None)
            .await?;
        let objects = self
            .state
            .increment_clamped(&self.key(tenant, OBJECTS), -1, 0, None)
            .await?;
        let now = self.touch(tenant).await?;

        self.audit.emit(
            self.audit
                .event(tenant, AuditEvent::UsageDecremented)
                .with_file(file_name)
                .with_bytes(delta_bytes),
        );
        Ok(UsageRecord {
            tenant: tenant.clone(),
            bytes_used: to_u64(bytes),
            object_count: to_u64(objects),
            last_updated: now,
        })
    }

    /// Apply signed deltas, clamping each counter at zero.
    ///
    /// Used when an upload replaces an existing object: bytes move by
    /// `new - old` and the object count stays put.
    #[instrument(name = "ledger.adjust", skip_all, fields(tenant = %tenant, delta_bytes = delta_bytes, delta_objects = delta_objects))]
    pub async fn adjust(
        &self,
        tenant: &TenantRef,
        delta_bytes: i64,
        delta_objects: i64,
        file_name: &str,
    ) -> Result<UsageRecord, GatewayError> {
        let bytes = self
            .state
            .increment_clamped(&self.key(tenant, BYTES), delta_bytes, 0, None)
            .await?;
        let objects = self
            .state
            .increment_clamped(&self.key(tenant, OBJECTS), delta_objects, 0, None)
            .await?;
        let now = self.touch(tenant).await?;

        self.audit.emit(
            self.audit
                .event(tenant, AuditEvent::UsageAdjusted)
                .with_file(file_name)
                .with_details(serde_json::json!({
                    "deltaBytes": delta_bytes,
                    "deltaObjects": delta_objects,
                })),
        );
        Ok(UsageRecord {
            tenant: tenant.clone(),
            bytes_used: to_u64(bytes),
            object_count: to_u64(objects),
            last_updated: now,
        })
    }

    /// Replace both counters. Only the reconciler should call this.
    pub async fn overwrite(
        &self,
        tenant: &TenantRef,
        bytes: u64,
        objects: u64,
    ) -> Result<UsageRecord, GatewayError> {
        self.state
            .set(&self.key(tenant, BYTES), &to_delta(bytes)?.to_string(), None)
            .await?;
        self.state
            .set(&self.key(tenant, OBJECTS), &to_delta(objects)?.to_string(), None)
            .await?;
        let now = self.touch(tenant).await?;
        Ok(UsageRecord {
            tenant: tenant.clone(),
            bytes_used: bytes,
            object_count: objects,
            last_updated: now,
        })
    }

    /// Every tenant that has a usage record.
    pub async fn tenants(&self) -> Result<Vec<TenantRef>, GatewayError> {
        let entries = self
            .state
            .scan_keys_by_kind(self.namespace.as_str(), KeyKind::Usage)
            .await?;
        let mut tenants: Vec<TenantRef> = entries
            .iter()
            .filter_map(|(key, _)| {
                let (_, scope, _, id) = StateKey::split_canonical(key)?;
                (id == BYTES).then(|| scope.parse().ok()).flatten()
            })
            .collect();
        tenants.sort_by_key(ToString::to_string);
        tenants.dedup();
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pockity_core::Quota;
    use pockity_state_memory::MemoryStateStore;

    use super::*;

    fn ledger() -> UsageLedger {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let ns = Namespace::new("ns");
        let limits = Arc::new(TenantLimits::new(
            Arc::clone(&state),
            ns.clone(),
            Quota::new(1000, 10),
            Duration::ZERO,
        ));
        UsageLedger::new(state, ns.clone(), limits, AuditEmitter::disabled(ns))
    }

    #[tokio::test]
    async fn first_read_initializes_zero_record() {
        let ledger = ledger();
        let tenant = TenantRef::user("a");
        let usage = ledger.get_usage(&tenant).await.unwrap();
        assert_eq!(usage.bytes_used, 0);
        assert_eq!(usage.object_count, 0);
        assert_eq!(ledger.tenants().await.unwrap(), vec![tenant]);
    }

    #[tokio::test]
    async fn increment_then_decrement() {
        let ledger = ledger();
        let tenant = TenantRef::user("a");
        ledger.increment(&tenant, 300, "a").await.unwrap();
        let after = ledger.increment(&tenant, 200, "b").await.unwrap();
        assert_eq!((after.bytes_used, after.object_count), (500, 2));

        let after = ledger.decrement(&tenant, 300, "a").await.unwrap();
        assert_eq!((after.bytes_used, after.object_count), (200, 1));
        let read = ledger.get_usage(&tenant).await.unwrap();
        assert_eq!((read.bytes_used, read.object_count), (200, 1));
    }

    #[tokio::test]
    async fn decrement_clamps_at_zero() {
        let ledger = ledger();
        let tenant = TenantRef::api_key("k");
        ledger.increment(&tenant, 10, "a").await.unwrap();
        let after = ledger.decrement(&tenant, 50, "a").await.unwrap();
        assert_eq!((after.bytes_used, after.object_count), (0, 0));
        let after = ledger.decrement(&tenant, 50, "a").await.unwrap();
        assert_eq!((after.bytes_used, after.object_count), (0, 0));
    }

    #[tokio::test]
    async fn adjust_moves_bytes_only() {
        let ledger = ledger();
        let tenant = TenantRef::user("a");
        ledger.increment(&tenant, 100, "a").await.unwrap();
        let grown = ledger.adjust(&tenant, 50, 0, "a").await.unwrap();
        assert_eq!((grown.bytes_used, grown.object_count), (150, 1));
        let shrunk = ledger.adjust(&tenant, -500, 0, "a").await.unwrap();
        assert_eq!((shrunk.bytes_used, shrunk.object_count), (0, 1));
    }

    #[tokio::test]
    async fn overwrite_and_report() {
        let ledger = ledger();
        let tenant = TenantRef::user("a");
        ledger.increment(&tenant, 999, "x").await.unwrap();
        ledger.overwrite(&tenant, 250, 5).await.unwrap();

        let report = ledger.get_usage_with_quota(&tenant).await.unwrap();
        assert_eq!(report.bytes_used, 250);
        assert_eq!(report.object_count, 5);
        assert_eq!(report.max_bytes, 1000);
        assert!((report.usage_percentage.bytes - 25.0).abs() < f64::EPSILON);
        assert!((report.usage_percentage.objects - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let ledger = Arc::new(ledger());
        let tenant = TenantRef::user("a");
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                let tenant = tenant.clone();
                tokio::spawn(async move { ledger.increment(&tenant, 10, &format!("f{i}")).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let usage = ledger.get_usage(&tenant).await.unwrap();
        assert_eq!((usage.bytes_used, usage.object_count), (200, 20));
    }

    #[tokio::test]
    async fn tenants_lists_each_once() {
        let ledger = ledger();
        ledger.increment(&TenantRef::user("b"), 1, "x").await.unwrap();
        ledger.increment(&TenantRef::api_key("k"), 1, "x").await.unwrap();
        ledger.increment(&TenantRef::user("b"), 1, "y").await.unwrap();
        assert_eq!(
            ledger.tenants().await.unwrap(),
            vec![TenantRef::api_key("k"), TenantRef::user("b")]
        );
    }
}
