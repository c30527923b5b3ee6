use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{BlobInfo, ContainerInfo, Error, Result, Segment, StorageBackend};

/// An in-memory storage backend.
///
/// Every container and blob lives in a process-local map. Intended as the
/// substitutable test double for code written against `StorageBackend`, and
/// usable for local prototyping. The lock is only held across synchronous
/// map access, never across an await point.
#[derive(Default)]
pub struct MemoryStorage {
    containers: Mutex<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<()> {
        self.containers
            .lock()
            .unwrap()
            .entry(container.to_owned())
            .or_default();

        Ok(())
    }

    async fn write_text(&self, container: &str, path: &str, content: &str) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();

        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| Error::NoSuchContainer(container.to_owned()))?;

        blobs.insert(path.to_owned(), content.to_owned());

        Ok(())
    }

    async fn read_text(&self, container: &str, path: &str) -> Result<String> {
        let containers = self.containers.lock().unwrap();

        let blobs = containers
            .get(container)
            .ok_or_else(|| Error::NoSuchContainer(container.to_owned()))?;

        blobs
            .get(path)
            .cloned()
            .ok_or_else(|| Error::no_such_blob(container, path))
    }

    async fn list_containers(&self) -> Result<Segment<ContainerInfo>> {
        let containers = self.containers.lock().unwrap();

        let mut items: Vec<ContainerInfo> = containers
            .keys()
            .map(|name| ContainerInfo { name: name.clone() })
            .collect();

        items.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Segment::complete(items))
    }

    async fn list_blobs(&self, container: &str) -> Result<Segment<BlobInfo>> {
        let containers = self.containers.lock().unwrap();

        let blobs = containers
            .get(container)
            .ok_or_else(|| Error::NoSuchContainer(container.to_owned()))?;

        let items = blobs
            .iter()
            .map(|(path, content)| BlobInfo {
                path: path.clone(),
                size: content.len() as u64,
            })
            .collect();

        Ok(Segment::complete(items))
    }

    async fn delete_blob_if_exists(&self, container: &str, path: &str) -> Result<bool> {
        let mut containers = self.containers.lock().unwrap();

        match containers.get_mut(container) {
            Some(blobs) => Ok(blobs.remove(path).is_some()),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_container_creation_is_idempotent() {
        let storage = MemoryStorage::new();

        storage.create_container_if_not_exists("docs").await.unwrap();
        storage.write_text("docs", "a", "first").await.unwrap();

        // A second create must not wipe existing blobs.
        storage.create_container_if_not_exists("docs").await.unwrap();

        assert_eq!("first", storage.read_text("docs", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_requires_container() {
        let storage = MemoryStorage::new();

        assert!(matches!(
            storage.write_text("missing", "a", "content").await,
            Err(Error::NoSuchContainer(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_reports_sizes() {
        let storage = MemoryStorage::new();
        storage.create_container_if_not_exists("docs").await.unwrap();
        storage.write_text("docs", "b", "xy").await.unwrap();
        storage.write_text("docs", "a", "xyz").await.unwrap();

        let segment = storage.list_blobs("docs").await.unwrap();

        assert_eq!(None, segment.continuation);
        assert_eq!(
            vec![
                BlobInfo {
                    path: "a".to_owned(),
                    size: 3
                },
                BlobInfo {
                    path: "b".to_owned(),
                    size: 2
                },
            ],
            segment.items
        );
    }

    #[tokio::test]
    async fn test_delete_missing_blob_is_a_no_op() {
        let storage = MemoryStorage::new();
        storage.create_container_if_not_exists("docs").await.unwrap();

        assert!(!storage.delete_blob_if_exists("docs", "a").await.unwrap());
        assert!(!storage
            .delete_blob_if_exists("missing", "a")
            .await
            .unwrap());

        storage.write_text("docs", "a", "content").await.unwrap();
        assert!(storage.delete_blob_if_exists("docs", "a").await.unwrap());
    }
}
