//! Destination object storage
//!
//! The pipeline only needs three things from the destination, captured by
//! [`ObjectStore`]. [`S3Store`] talks to any S3-compatible service;
//! [`MemoryStore`] keeps everything in process.

use crate::error::StorageError;
use crate::file::FileState;
use async_trait::async_trait;

pub mod config;
pub mod memory;
pub mod s3;

pub use self::config::StorageConfig;
pub use self::memory::MemoryStore;
pub use self::s3::S3Store;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `container` unless it already exists
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError>;

    /// Recorded fingerprint of an object, `None` if it does not exist
    async fn object_state(&self, container: &str, object: &str) -> Result<Option<FileState>, StorageError>;

    /// Write an object together with the fingerprint it was copied from
    async fn put_object(
        &self,
        container: &str,
        object: &str,
        body: Vec<u8>,
        state: &FileState,
    ) -> Result<(), StorageError>;
}
