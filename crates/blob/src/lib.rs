//! Object storage for Pockity.
//!
//! [`ObjectStore`] is the backend seam (bucket primitives); [`ObjectGateway`]
//! layers tenant namespacing, key validation and signed URLs on top of it.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod namespace;
pub mod store;

pub use error::BlobError;
pub use gateway::{ObjectGateway, PutOutcome};
pub use memory::MemoryObjectStore;
pub use namespace::{
    MAX_FILE_NAME_LEN, ensure_owned, file_name_of, object_key, validate_content_type,
};
pub use store::ObjectStore;
