pub mod approval;
pub mod caller;
pub mod credential;
pub mod error;
pub mod object;
pub mod quota;
pub mod tenant;
pub mod types;
pub mod usage;

pub use approval::{
    ApprovalFilter, ApprovalKind, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
};
pub use caller::{Caller, Role};
pub use credential::{ApiKeyRecord, ProvisionedCredential};
pub use error::CoreError;
pub use object::{
    BulkDeleteItem, BulkDeleteReport, DEFAULT_CONTENT_TYPE, DeletedObject, ObjectEntry,
    ObjectListing, StoredObject, UploadReceipt,
};
pub use quota::{
    DEFAULT_MAX_BYTES, DEFAULT_MAX_OBJECTS, Quota, QuotaDecision, UsagePercentage, percentage,
};
pub use tenant::{TenantRef, validate_identifier};
pub use types::{ApiKeyId, Namespace, RequestId, UserId};
pub use usage::{ReconcileReport, UsageRecord, UsageReport};
