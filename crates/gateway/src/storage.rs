//! Caller-facing object operations: upload, delete, list and usage.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, instrument, warn};

use pockity_audit::AuditEvent;
use pockity_blob::{BlobError, ObjectGateway, PutOutcome, file_name_of};
use pockity_core::{
    BulkDeleteItem, BulkDeleteReport, DEFAULT_CONTENT_TYPE, DeletedObject, ObjectEntry,
    ObjectListing, StoredObject, TenantRef, UploadReceipt, UsageReport,
};

use crate::audit_helpers::AuditEmitter;
use crate::config::{AdmissionMode, GatewayConfig};
use crate::error::{CapacityExceeded, GatewayError};
use crate::gate::TenantGate;
use crate::ledger::UsageLedger;
use crate::metrics::GatewayMetrics;
use crate::policy::QuotaPolicy;

/// Settings the storage service takes from [`GatewayConfig`].
#[derive(Debug, Clone)]
struct StorageSettings {
    admission: AdmissionMode,
    compensate_on_ledger_failure: bool,
    max_upload_bytes: u64,
}

/// Composes the object gateway, usage ledger and quota policy.
///
/// With a lock configured, every store write and its ledger update run
/// inside the tenant's [`TenantGate`]. Strict admission widens that section
/// to start before the quota check.
pub struct StorageService {
    objects: ObjectGateway,
    ledger: Arc<UsageLedger>,
    policy: Arc<QuotaPolicy>,
    gate: TenantGate,
    metrics: Arc<GatewayMetrics>,
    audit: AuditEmitter,
    settings: StorageSettings,
}

impl StorageService {
    /// Strict admission requires a locking gate; the builder enforces this.
    pub fn new(
        config: &GatewayConfig,
        objects: ObjectGateway,
        ledger: Arc<UsageLedger>,
        policy: Arc<QuotaPolicy>,
        gate: TenantGate,
        metrics: Arc<GatewayMetrics>,
        audit: AuditEmitter,
    ) -> Self {
        Self {
            objects,
            ledger,
            policy,
            gate,
            metrics,
            audit,
            settings: StorageSettings {
                admission: config.admission,
                compensate_on_ledger_failure: config.compensate_on_ledger_failure,
                max_upload_bytes: config.max_upload_bytes,
            },
        }
    }

    pub fn objects(&self) -> &ObjectGateway {
        &self.objects
    }

    async fn head_existing(&self, key: &str) -> Result<Option<StoredObject>, GatewayError> {
        match self.objects.head(key).await {
            Ok(object) => Ok(Some(object)),
            Err(BlobError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store `data` as the tenant's `file_name` if it fits within the quota.
    #[instrument(
        name = "storage.upload",
        skip_all,
        fields(tenant = %tenant, file_name = %file_name, size = data.len())
    )]
    pub async fn upload(
        &self,
        tenant: &TenantRef,
        file_name: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<UploadReceipt, GatewayError> {
        let size = data.len() as u64;
        if size > self.settings.max_upload_bytes {
            return Err(GatewayError::Validation(format!(
                "upload of {size} bytes exceeds the {} byte limit",
                self.settings.max_upload_bytes
            )));
        }
        let key = self.objects.key_for(tenant, file_name)?;

        if self.settings.admission == AdmissionMode::Strict {
            let guard = self.gate.enter_required(tenant).await?;
            let result = self
                .admitted_upload(tenant, file_name, &key, data, content_type, false)
                .await;
            TenantGate::leave(tenant, Some(guard)).await;
            result
        } else {
            self.admitted_upload(tenant, file_name, &key, data, content_type, true)
                .await
        }
    }

    /// Quota check, then the store write and ledger update. `gate_write`
    /// enters the tenant gate for the write when the caller has not already.
    async fn admitted_upload(
        &self,
        tenant: &TenantRef,
        file_name: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        gate_write: bool,
    ) -> Result<UploadReceipt, GatewayError> {
        let size = data.len() as u64;
        let existing = self.head_existing(key).await?;

        let decision = self
            .policy
            .evaluate_replacing(tenant, size, existing.as_ref())
            .await?;
        if decision.quota_exceeded {
            self.metrics.increment_upload_rejections();
            return Err(GatewayError::CapacityExceeded(CapacityExceeded {
                quota_exceeded: true,
                max_bytes: decision.max_bytes,
                max_objects: decision.max_objects,
                file_size: size,
            }));
        }

        let guard = if gate_write {
            self.gate.enter(tenant).await?
        } else {
            None
        };
        let written = self
            .write_and_record(tenant, file_name, data, content_type, existing.as_ref())
            .await;
        TenantGate::leave(tenant, guard).await;
        let stored = written?;

        self.metrics.increment_uploads();
        self.metrics.add_upload_bytes(size);
        let content_type = stored
            .object
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
        self.audit.emit(
            self.audit
                .event(tenant, AuditEvent::ObjectUploaded)
                .with_file(file_name)
                .with_bytes(size)
                .with_details(serde_json::json!({
                    "contentType": content_type,
                    "replaced": existing.is_some(),
                })),
        );
        debug!(key = %stored.key, replaced = existing.is_some(), "upload complete");

        Ok(UploadReceipt {
            file_name: file_name.to_owned(),
            key: stored.key,
            url: stored.url,
            size,
            content_type,
        })
    }

    async fn write_and_record(
        &self,
        tenant: &TenantRef,
        file_name: &str,
        data: Bytes,
        content_type: Option<&str>,
        existing: Option<&StoredObject>,
    ) -> Result<PutOutcome, GatewayError> {
        let size = data.len() as u64;
        let stored = self.objects.put(tenant, file_name, data, content_type).await?;

        let ledger_result = match existing {
            Some(old) => {
                let delta = i128::from(size) - i128::from(old.size_bytes);
                let delta = i64::try_from(delta).unwrap_or(if delta < 0 {
                    i64::MIN
                } else {
                    i64::MAX
                });
                self.ledger.adjust(tenant, delta, 0, file_name).await
            }
            None => self.ledger.increment(tenant, size, file_name).await,
        };
        let Err(e) = ledger_result else {
            return Ok(stored);
        };

        self.metrics.increment_ledger_failures();
        error!(
            error = %e,
            tenant = %tenant,
            key = %stored.key,
            "ledger update failed after upload"
        );
        if self.settings.compensate_on_ledger_failure && existing.is_none() {
            match self.objects.delete_key(tenant, &stored.key).await {
                Ok(()) => {
                    self.metrics.increment_compensations();
                    info!(key = %stored.key, "removed object after ledger failure");
                }
                Err(del) => {
                    error!(error = %del, key = %stored.key, "compensating delete failed");
                }
            }
        }
        Err(GatewayError::Internal(format!("usage ledger update failed: {e}")))
    }

    /// Delete the tenant's `file_name` and release its usage.
    ///
    /// A ledger failure after the object is gone is logged and counted; the
    /// delete still succeeds and reconciliation repairs the counters.
    #[instrument(
        name = "storage.delete",
        skip_all,
        fields(tenant = %tenant, file_name = %file_name)
    )]
    pub async fn delete(
        &self,
        tenant: &TenantRef,
        file_name: &str,
    ) -> Result<DeletedObject, GatewayError> {
        let key = self.objects.key_for(tenant, file_name)?;
        let guard = self.gate.enter(tenant).await?;
        let removed = self.remove_and_record(tenant, file_name, &key).await;
        TenantGate::leave(tenant, guard).await;
        let object = removed?;

        self.metrics.increment_deletes();
        self.audit.emit(
            self.audit
                .event(tenant, AuditEvent::ObjectDeleted)
                .with_file(file_name)
                .with_bytes(object.size_bytes),
        );
        Ok(DeletedObject {
            file_name: file_name.to_owned(),
            key,
            size_bytes: object.size_bytes,
        })
    }

    /// Head, delete and decrement. The head doubles as the existence check,
    /// since backend deletes succeed on missing keys.
    async fn remove_and_record(
        &self,
        tenant: &TenantRef,
        file_name: &str,
        key: &str,
    ) -> Result<StoredObject, GatewayError> {
        let object = self.objects.head(key).await?;

        if let Err(e) = self.objects.delete_key(tenant, key).await {
            self.metrics.increment_delete_failures();
            return Err(e.into());
        }

        if let Err(e) = self
            .ledger
            .decrement(tenant, object.size_bytes, file_name)
            .await
        {
            self.metrics.increment_ledger_failures();
            warn!(error = %e, tenant = %tenant, key = %key, "ledger update failed after delete");
        }
        Ok(object)
    }

    /// Delete each name in turn, collecting per-item results.
    pub async fn bulk_delete(
        &self,
        tenant: &TenantRef,
        file_names: &[String],
    ) -> BulkDeleteReport {
        let mut results = Vec::with_capacity(file_names.len());
        for name in file_names {
            let item = match self.delete(tenant, name).await {
                Ok(deleted) => BulkDeleteItem::deleted(deleted),
                Err(e) => BulkDeleteItem::failed(name.clone(), e.to_string()),
            };
            results.push(item);
        }
        let report = BulkDeleteReport::from(results);
        info!(
            tenant = %tenant,
            succeeded = report.succeeded,
            failed = report.failed,
            bytes = report.total_size_deleted,
            "bulk delete finished"
        );
        report
    }

    async fn entry(
        &self,
        tenant: &TenantRef,
        object: StoredObject,
    ) -> Result<ObjectEntry, GatewayError> {
        let url = self.objects.url(&object.key).await?;
        // Some listings omit the content type; fetch it so entries match `head`.
        let content_type = match object.content_type {
            Some(ct) => Some(ct),
            None => self
                .head_existing(&object.key)
                .await?
                .and_then(|o| o.content_type),
        };
        Ok(ObjectEntry {
            file_name: file_name_of(tenant, &object.key).to_owned(),
            url,
            size_bytes: object.size_bytes,
            last_modified: object.last_modified,
            content_type,
            key: object.key,
        })
    }

    /// Every object the tenant owns, each with a signed URL.
    #[instrument(name = "storage.list", skip_all, fields(tenant = %tenant))]
    pub async fn list(&self, tenant: &TenantRef) -> Result<ObjectListing, GatewayError> {
        let objects = self.objects.list(tenant).await?;
        let mut entries = Vec::with_capacity(objects.len());
        for object in objects {
            entries.push(self.entry(tenant, object).await?);
        }
        Ok(ObjectListing::new(entries))
    }

    /// Metadata and a signed URL for one owned object.
    pub async fn head(
        &self,
        tenant: &TenantRef,
        file_name: &str,
    ) -> Result<ObjectEntry, GatewayError> {
        let object = self.objects.head_file(tenant, file_name).await?;
        self.entry(tenant, object).await
    }

    pub async fn usage(&self, tenant: &TenantRef) -> Result<UsageReport, GatewayError> {
        self.ledger.get_usage_with_quota(tenant).await
    }
}
