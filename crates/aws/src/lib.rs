//! AWS backends for Pockity.
//!
//! - **S3** (`s3` feature): [`S3ObjectStore`], an [`ObjectStore`](pockity_blob::ObjectStore)
//!   over a single bucket with optional deployment-wide key prefix.
//!
//! Clients are built from an [`AwsConnection`](config::AwsConnection): a
//! region, an optional endpoint override and an optional role to assume.

pub mod auth;
pub mod config;
pub mod error;

#[cfg(feature = "s3")]
pub mod s3;

pub use config::AwsConnection;
pub use error::AwsError;

#[cfg(feature = "s3")]
pub use s3::{S3Config, S3ObjectStore};
