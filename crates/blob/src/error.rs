use thiserror::Error;

/// Errors that can occur during object storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The object key or file name is malformed.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The key lies outside the caller's tenant prefix.
    #[error("object key {key} is not owned by tenant {tenant}")]
    NotOwned {
        /// Offending key.
        key: String,
        /// Tenant that attempted the operation.
        tenant: String,
    },

    /// A storage backend error occurred.
    #[error("object storage error: {0}")]
    Storage(String),

    /// The content type is invalid.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),
}
