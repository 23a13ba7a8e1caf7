use thiserror::Error;

/// Errors raised while parsing or validating core domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid tenant reference: {0}")]
    InvalidTenant(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid quota: {0}")]
    InvalidQuota(String),
}
