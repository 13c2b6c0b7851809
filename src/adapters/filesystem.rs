use crate::core::blob_utils::{apply_get_options, md5_etag};
use crate::core::listing::page_listing;
use crate::domain::blob::{
    Blob, BlobMetadata, GetOptions, ListContainerOptions, PageSet, StorageMetadata, DIRECTORY_CONTENT_TYPE,
};
use crate::domain::location::Location;
use crate::domain::ports::BlobStore;
use crate::utils::error::{CloudError, Result};
use crate::utils::validation::validate_object_name;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Sidecar metadata lives here, outside any container directory.
const METADATA_DIR: &str = ".polycloud-metadata";

/// Blob store over a local directory tree: containers are first-level
/// directories, blobs are files and `/` in names becomes subdirectories.
pub struct FilesystemBlobStore {
    base_dir: PathBuf,
    location: Location,
}

impl FilesystemBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            location: Location::provider("filesystem"),
        }
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        validate_object_name("container", container)?;
        if container.contains('/') || container.starts_with('.') {
            return Err(CloudError::invalid_argument(format!(
                "container '{}' must be a single path segment not starting with '.'",
                container
            )));
        }
        Ok(self.base_dir.join(container))
    }

    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        validate_object_name("blob", name)?;
        Ok(self.container_path(container)?.join(name))
    }

    fn sidecar_path(&self, container: &str, name: &str) -> PathBuf {
        self.base_dir
            .join(METADATA_DIR)
            .join(container)
            .join(format!("{}.json", name.trim_end_matches('/')))
    }

    async fn existing_container(&self, container: &str) -> Result<PathBuf> {
        let path = self.container_path(container)?;
        if is_dir(&path).await {
            Ok(path)
        } else {
            Err(CloudError::ContainerNotFound {
                container: container.to_string(),
            })
        }
    }

    async fn read_metadata(&self, container: &str, name: &str, path: &Path) -> Result<Option<BlobMetadata>> {
        let file_meta = match fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if file_meta.is_dir() {
            return Ok(None);
        }

        let mut metadata = match fs::read(self.sidecar_path(container, name)).await {
            Ok(bytes) => serde_json::from_slice::<BlobMetadata>(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let payload = fs::read(path).await?;
                let (digest, etag) = md5_etag(&payload);
                let mut md = BlobMetadata {
                    etag: Some(etag),
                    ..Default::default()
                };
                md.content.content_md5 = Some(digest);
                md
            }
            Err(e) => return Err(e.into()),
        };
        metadata.name = name.to_string();
        metadata.container = container.to_string();
        metadata.size = Some(file_meta.len());
        metadata.content.content_length = Some(file_meta.len());
        metadata.last_modified = file_meta.modified().ok().map(DateTime::<Utc>::from);
        Ok(Some(metadata))
    }

    /// Every file and directory under the container, as blob metadata. Directories
    /// are reported as markers named `dir/`.
    async fn walk(&self, container: &str, root: &Path) -> Result<Vec<BlobMetadata>> {
        let mut entries = Vec::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut reader = fs::read_dir(&dir).await?;
            while let Some(entry) = reader.next_entry().await? {
                let path = entry.path();
                let relative = relative_name(root, &path);
                if entry.file_type().await?.is_dir() {
                    let mut marker = BlobMetadata {
                        name: format!("{}/", relative),
                        container: container.to_string(),
                        ..Default::default()
                    };
                    marker.content.content_type = Some(DIRECTORY_CONTENT_TYPE.to_string());
                    entries.push(marker);
                    pending.push(path);
                } else if let Some(md) = self.read_metadata(container, &relative, &path).await? {
                    entries.push(md);
                }
            }
        }
        Ok(entries)
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn list_assignable_locations(&self) -> Result<Vec<Location>> {
        Ok(vec![self.location.clone()])
    }

    async fn list(&self) -> Result<PageSet<StorageMetadata>> {
        let mut items = Vec::new();
        let mut reader = match fs::read_dir(&self.base_dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PageSet::new(items, None)),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            let mut md = StorageMetadata::container(name, Some(self.location.clone()));
            md.last_modified = entry.metadata().await?.modified().ok().map(DateTime::<Utc>::from);
            items.push(md);
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(PageSet::new(items, None))
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(is_dir(&self.container_path(container)?).await)
    }

    async fn create_container_in_location(&self, _location: Option<&Location>, container: &str) -> Result<bool> {
        let path = self.container_path(container)?;
        if is_dir(&path).await {
            return Ok(false);
        }
        fs::create_dir_all(&path).await?;
        tracing::debug!(container, path = %path.display(), "created container");
        Ok(true)
    }

    async fn list_container(&self, container: &str, options: &ListContainerOptions) -> Result<PageSet<StorageMetadata>> {
        let root = self.existing_container(container).await?;
        let entries = self.walk(container, &root).await?;
        Ok(page_listing(entries, options))
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        remove_dir_if_exists(&self.container_path(container)?).await?;
        remove_dir_if_exists(&self.base_dir.join(METADATA_DIR).join(container)).await?;
        tracing::debug!(container, "deleted container");
        Ok(())
    }

    async fn directory_exists(&self, container: &str, directory: &str) -> Result<bool> {
        self.existing_container(container).await?;
        Ok(is_dir(&self.blob_path(container, directory.trim_end_matches('/'))?).await)
    }

    async fn create_directory(&self, container: &str, directory: &str) -> Result<()> {
        self.existing_container(container).await?;
        fs::create_dir_all(self.blob_path(container, directory.trim_end_matches('/'))?).await?;
        Ok(())
    }

    async fn delete_directory(&self, container: &str, directory: &str) -> Result<()> {
        self.existing_container(container).await?;
        let directory = directory.trim_end_matches('/');
        remove_dir_if_exists(&self.blob_path(container, directory)?).await?;
        remove_dir_if_exists(&self.base_dir.join(METADATA_DIR).join(container).join(directory)).await
    }

    async fn blob_exists(&self, container: &str, name: &str) -> Result<bool> {
        self.existing_container(container).await?;
        let path = self.blob_path(container, name)?;
        Ok(fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false))
    }

    async fn put_blob(&self, container: &str, mut blob: Blob) -> Result<String> {
        self.existing_container(container).await?;
        let name = blob.name().to_string();
        let path = self.blob_path(container, &name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let (digest, etag) = md5_etag(&blob.payload);
        fs::write(&path, &blob.payload).await?;

        let metadata = &mut blob.metadata;
        metadata.container = container.to_string();
        metadata.etag = Some(etag.clone());
        metadata.content.content_md5 = Some(digest);
        metadata.user_metadata = std::mem::take(&mut metadata.user_metadata)
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        let sidecar = self.sidecar_path(container, &name);
        if let Some(parent) = sidecar.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&sidecar, serde_json::to_vec(&blob.metadata)?).await?;

        tracing::debug!(container, blob = %name, path = %path.display(), "stored blob");
        Ok(etag)
    }

    async fn blob_metadata(&self, container: &str, name: &str) -> Result<Option<BlobMetadata>> {
        self.existing_container(container).await?;
        let path = self.blob_path(container, name)?;
        self.read_metadata(container, name, &path).await
    }

    async fn get_blob(&self, container: &str, name: &str, options: &GetOptions) -> Result<Option<Blob>> {
        self.existing_container(container).await?;
        let path = self.blob_path(container, name)?;
        let Some(metadata) = self.read_metadata(container, name, &path).await? else {
            return Ok(None);
        };
        let payload = fs::read(&path).await?;
        apply_get_options(Blob { metadata, payload }, options).map(Some)
    }

    async fn remove_blob(&self, container: &str, name: &str) -> Result<()> {
        let path = self.blob_path(container, name)?;
        remove_if_exists(&path).await?;
        remove_if_exists(&self.sidecar_path(container, name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_blob_round_trip_on_disk() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(temp.path());
        assert!(store.create_container_in_location(None, "c").await.unwrap());

        store
            .put_blob(
                "c",
                Blob::builder("nested/dir/file.txt")
                    .payload("hello")
                    .content_type("text/plain")
                    .user_metadata([("Color", "blue")])
                    .build(),
            )
            .await
            .unwrap();

        assert!(temp.path().join("c/nested/dir/file.txt").is_file());
        let blob = store
            .get_blob("c", "nested/dir/file.txt", &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blob.payload, b"hello");
        assert_eq!(blob.metadata.content.content_type.as_deref(), Some("text/plain"));
        assert_eq!(blob.metadata.user_metadata.get("color").map(String::as_str), Some("blue"));
        assert_eq!(blob.metadata.etag.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
        assert!(blob.metadata.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_rejects_escaping_names() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(temp.path());
        store.create_container_in_location(None, "c").await.unwrap();
        let err = store
            .put_blob("c", Blob::builder("../escape").payload("x").build())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidArgument { .. }));
        assert!(store.container_exists("../c").await.is_err());
    }

    #[tokio::test]
    async fn test_metadata_dir_is_not_a_container() {
        let temp = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(temp.path());
        store.create_container_in_location(None, "c").await.unwrap();
        store
            .put_blob("c", Blob::builder("a").payload("x").build())
            .await
            .unwrap();
        let names: Vec<String> = store.list().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["c"]);
    }

    #[tokio::test]
    async fn test_files_without_sidecar_get_md5_etag() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("c")).unwrap();
        std::fs::write(temp.path().join("c/raw.bin"), b"hello").unwrap();

        let store = FilesystemBlobStore::new(temp.path());
        let md = store.blob_metadata("c", "raw.bin").await.unwrap().unwrap();
        assert_eq!(md.etag.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
        assert_eq!(md.size, Some(5));
    }
}
