//! Object storage for uploaded images.

pub mod client;
pub mod types;

pub use client::{BlobStore, HttpBlobStore};
pub use types::{ObjectMetadata, StorageError};
