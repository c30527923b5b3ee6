//! Blob Store
//!
//! a uniform async facade over object-storage backends: upload & download of
//! text and JSON blobs, container and blob listing, idempotent deletes

// crate-specific lint exceptions:
//#![allow()]

mod aws_s3_storage;
mod blob_store;
mod error;
mod local_storage;
mod memory_storage;
mod options;

pub use aws_s3_storage::AwsS3Storage;
pub use blob_store::BlobStore;
pub use error::{Error, Result};
pub use local_storage::LocalStorage;
pub use memory_storage::MemoryStorage;
pub use options::{AccountCredentials, StorageOptions, ACCESS_KEY_ENV, ACCOUNT_ENV};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A container descriptor, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
}

/// A blob descriptor, as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub path: String,
    pub size: u64,
}

/// One page of listing results.
///
/// Backends return at most one segment per call. When more entries exist
/// than the backend returns in a single exchange, `continuation` carries the
/// backend's token for the next page. This crate never follows continuation
/// tokens: callers that need full enumeration must drive pagination
/// themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment<T> {
    pub items: Vec<T>,
    pub continuation: Option<String>,
}

impl<T> Segment<T> {
    /// A complete segment with no further pages.
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }
}

/// A trait for object-storage backends.
///
/// Each operation is a single request/response exchange with the underlying
/// service; implementations must not retry, cache, or assume synchronous
/// completion. The handle must be safe for concurrent use by multiple
/// in-flight operations.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Creates the container if it does not already exist.
    ///
    /// Pre-existence is not an error.
    async fn create_container_if_not_exists(&self, container: &str) -> Result<()>;

    /// Writes `content` to `path` in `container`, overwriting any blob
    /// already stored at that path.
    async fn write_text(&self, container: &str, path: &str, content: &str) -> Result<()>;

    /// Reads the full text content of the blob at `path` in `container`.
    ///
    /// If the container or blob does not exist, `Error::NoSuchContainer` or
    /// `Error::NoSuchBlob` is returned.
    ///
    /// In any other case, an error is returned.
    async fn read_text(&self, container: &str, path: &str) -> Result<String>;

    /// Returns the first segment of containers for the account.
    async fn list_containers(&self) -> Result<Segment<ContainerInfo>>;

    /// Returns the first segment of blobs within `container`.
    ///
    /// If the container does not exist, `Error::NoSuchContainer` is
    /// returned.
    async fn list_blobs(&self, container: &str) -> Result<Segment<BlobInfo>>;

    /// Deletes the blob at `path` in `container` if it exists, returning
    /// whether a blob was actually removed.
    ///
    /// Deleting a missing blob is not an error.
    async fn delete_blob_if_exists(&self, container: &str, path: &str) -> Result<bool>;
}
