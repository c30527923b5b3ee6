use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{BlobInfo, ContainerInfo, Error, Result, Segment, StorageBackend};

/// A storage backend rooted in a local directory.
///
/// Containers are direct subdirectories of the root and blobs are files
/// within them. Blob paths may contain `/` separators; the intermediate
/// directories are created on write. Listings are always complete: the
/// filesystem has no notion of a result page, so the segment's continuation
/// token is always `None`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Opens a local storage rooted at `root`, creating the directory if
    /// necessary.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|err| {
            Error::forward_with_context(
                err,
                format!("could not create storage root: {}", root.display()),
            )
        })?;

        Ok(Self { root })
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf> {
        validate_component(container)?;

        Ok(self.root.join(container))
    }

    fn blob_file(&self, container: &str, path: &str) -> Result<PathBuf> {
        let mut file = self.container_dir(container)?;

        for component in path.split('/') {
            validate_component(component)?;
            file.push(component);
        }

        Ok(file)
    }

    async fn container_exists(&self, dir: &Path) -> Result<bool> {
        match fs::metadata(dir).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::forward_with_context(
                err,
                format!("could not stat container directory: {}", dir.display()),
            )),
        }
    }
}

fn validate_component(component: &str) -> Result<()> {
    if component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('\\')
    {
        return Err(Error::forward_with_context(
            anyhow::anyhow!("invalid path component: {:?}", component),
            "invalid container or blob name",
        ));
    }

    Ok(())
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn create_container_if_not_exists(&self, container: &str) -> Result<()> {
        let dir = self.container_dir(container)?;

        fs::create_dir_all(&dir).await.map_err(|err| {
            Error::forward_with_context(
                err,
                format!("could not create container directory: {}", dir.display()),
            )
        })
    }

    async fn write_text(&self, container: &str, path: &str, content: &str) -> Result<()> {
        let dir = self.container_dir(container)?;

        if !self.container_exists(&dir).await? {
            return Err(Error::NoSuchContainer(container.to_owned()));
        }

        let file = self.blob_file(container, path)?;

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                Error::forward_with_context(
                    err,
                    format!("could not create blob directory: {}", parent.display()),
                )
            })?;
        }

        debug!("writing blob: {}", file.display());

        fs::write(&file, content).await.map_err(|err| {
            Error::forward_with_context(err, format!("could not write blob: {}", file.display()))
        })
    }

    async fn read_text(&self, container: &str, path: &str) -> Result<String> {
        let dir = self.container_dir(container)?;

        if !self.container_exists(&dir).await? {
            return Err(Error::NoSuchContainer(container.to_owned()));
        }

        let file = self.blob_file(container, path)?;

        match fs::read_to_string(&file).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::no_such_blob(container, path))
            }
            Err(err) => Err(Error::forward_with_context(
                err,
                format!("could not read blob: {}", file.display()),
            )),
        }
    }

    async fn list_containers(&self) -> Result<Segment<ContainerInfo>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|err| {
            Error::forward_with_context(
                err,
                format!("could not list storage root: {}", self.root.display()),
            )
        })?;

        let mut items = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|err| {
            Error::forward_with_context(err, "could not enumerate storage root")
        })? {
            let file_type = entry.file_type().await.map_err(|err| {
                Error::forward_with_context(err, "could not stat storage root entry")
            })?;

            if file_type.is_dir() {
                if let Ok(name) = entry.file_name().into_string() {
                    items.push(ContainerInfo { name });
                }
            }
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Segment::complete(items))
    }

    async fn list_blobs(&self, container: &str) -> Result<Segment<BlobInfo>> {
        let dir = self.container_dir(container)?;

        if !self.container_exists(&dir).await? {
            return Err(Error::NoSuchContainer(container.to_owned()));
        }

        // Non-recursive walk of the container tree; blob paths are the
        // file paths relative to the container directory.
        let mut pending = vec![(dir, String::new())];
        let mut items = Vec::new();

        while let Some((current, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&current).await.map_err(|err| {
                Error::forward_with_context(
                    err,
                    format!("could not list container directory: {}", current.display()),
                )
            })?;

            while let Some(entry) = entries.next_entry().await.map_err(|err| {
                Error::forward_with_context(err, "could not enumerate container directory")
            })? {
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(_) => continue,
                };

                let path = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };

                let metadata = entry.metadata().await.map_err(|err| {
                    Error::forward_with_context(err, "could not stat container entry")
                })?;

                if metadata.is_dir() {
                    pending.push((entry.path(), path));
                } else {
                    items.push(BlobInfo {
                        path,
                        size: metadata.len(),
                    });
                }
            }
        }

        items.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Segment::complete(items))
    }

    async fn delete_blob_if_exists(&self, container: &str, path: &str) -> Result<bool> {
        let file = self.blob_file(container, path)?;

        match fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::forward_with_context(
                err,
                format!("could not delete blob: {}", file.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        (dir, storage)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (_dir, storage) = temp_storage().await;

        storage.create_container_if_not_exists("docs").await.unwrap();
        storage.write_text("docs", "a.txt", "content").await.unwrap();

        assert_eq!("content", storage.read_text("docs", "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_blob_paths() {
        let (_dir, storage) = temp_storage().await;

        storage.create_container_if_not_exists("docs").await.unwrap();
        storage
            .write_text("docs", "2024/05/report.json", "{}")
            .await
            .unwrap();

        assert_eq!(
            "{}",
            storage.read_text("docs", "2024/05/report.json").await.unwrap()
        );

        let segment = storage.list_blobs("docs").await.unwrap();
        assert_eq!(1, segment.items.len());
        assert_eq!("2024/05/report.json", segment.items[0].path);
        assert_eq!(2, segment.items[0].size);
    }

    #[tokio::test]
    async fn test_read_missing_container_and_blob() {
        let (_dir, storage) = temp_storage().await;

        assert!(matches!(
            storage.read_text("missing", "a").await,
            Err(Error::NoSuchContainer(_))
        ));

        storage.create_container_if_not_exists("docs").await.unwrap();

        assert!(matches!(
            storage.read_text("docs", "missing").await,
            Err(Error::NoSuchBlob { .. })
        ));
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let (_dir, storage) = temp_storage().await;

        storage.create_container_if_not_exists("docs").await.unwrap();

        assert!(storage.write_text("docs", "../escape", "content").await.is_err());
        assert!(storage.read_text("..", "blob").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_reports_whether_blob_existed() {
        let (_dir, storage) = temp_storage().await;

        storage.create_container_if_not_exists("docs").await.unwrap();

        assert!(!storage.delete_blob_if_exists("docs", "a").await.unwrap());

        storage.write_text("docs", "a", "content").await.unwrap();

        assert!(storage.delete_blob_if_exists("docs", "a").await.unwrap());
        assert!(matches!(
            storage.read_text("docs", "a").await,
            Err(Error::NoSuchBlob { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_containers() {
        let (_dir, storage) = temp_storage().await;

        storage.create_container_if_not_exists("b").await.unwrap();
        storage.create_container_if_not_exists("a").await.unwrap();

        let segment = storage.list_containers().await.unwrap();

        assert_eq!(None, segment.continuation);
        assert_eq!(
            vec!["a", "b"],
            segment
                .items
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
        );
    }
}
