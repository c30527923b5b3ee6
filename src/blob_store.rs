use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{BlobInfo, ContainerInfo, Error, Result, Segment, StorageBackend};

/// A uniform facade over a single storage backend handle.
///
/// The facade is stateless apart from the backend handle: nothing is cached
/// between calls, no call is ever retried, and concurrent in-flight
/// operations are independent. Cloning is cheap and shares the same backend.
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn StorageBackend>,
}

impl BlobStore {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wraps an already-shared backend handle.
    pub fn from_arc(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Writes text content to `path` in `container`, overwriting any blob
    /// already stored at that path.
    ///
    /// The container is created first if it does not exist yet: a write
    /// never fails merely because the container was missing, and never
    /// lands in a non-existent container.
    pub async fn post_text(&self, container: &str, path: &str, content: &str) -> Result<()> {
        debug!("post_text: {}/{} ({} bytes)", container, path, content.len());

        self.backend
            .create_container_if_not_exists(container)
            .await?;

        self.backend.write_text(container, path, content).await
    }

    /// Serializes `value` to JSON and writes it to `path` in `container`.
    ///
    /// # Errors
    ///
    /// `Error::Serialization` if the value cannot be represented as JSON;
    /// otherwise the same failures as `post_text`.
    pub async fn post_json<T: Serialize>(
        &self,
        container: &str,
        path: &str,
        value: &T,
    ) -> Result<()> {
        let content = serde_json::to_string(value).map_err(Error::Serialization)?;

        self.post_text(container, path, &content).await
    }

    /// Reads the text content of the blob at `path` in `container`.
    ///
    /// # Errors
    ///
    /// `Error::NoSuchContainer` or `Error::NoSuchBlob` if the target does
    /// not exist; `Error::Backend` for any other service failure.
    pub async fn get_text(&self, container: &str, path: &str) -> Result<String> {
        self.backend.read_text(container, path).await
    }

    /// Reads the blob at `path` in `container` and parses it as JSON.
    ///
    /// # Errors
    ///
    /// `Error::Deserialization` if the content is not valid JSON; read
    /// failures are propagated unchanged.
    pub async fn get_json<T: DeserializeOwned>(&self, container: &str, path: &str) -> Result<T> {
        let content = self.get_text(container, path).await?;

        serde_json::from_str(&content).map_err(Error::Deserialization)
    }

    /// Returns the first segment of containers for the account.
    ///
    /// No auto-pagination: callers that need full enumeration must follow
    /// the segment's continuation token against the backend themselves.
    pub async fn list_containers(&self) -> Result<Segment<ContainerInfo>> {
        self.backend.list_containers().await
    }

    /// Returns the first segment of blobs within `container`.
    ///
    /// Same single-page caveat as `list_containers`.
    pub async fn list_blobs(&self, container: &str) -> Result<Segment<BlobInfo>> {
        self.backend.list_blobs(container).await
    }

    /// Deletes the blob at `path` in `container` if it exists, returning
    /// whether a deletion actually occurred.
    ///
    /// Deleting a missing blob is a no-op, not an error.
    pub async fn delete_blob(&self, container: &str, path: &str) -> Result<bool> {
        debug!("delete_blob: {}/{}", container, path);

        self.backend.delete_blob_if_exists(container, path).await
    }
}
