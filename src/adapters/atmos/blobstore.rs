use super::client::{directory_path, file_path, AtmosClient};
use super::domain::{AtmosObject, ContentMetadata, FileType, ListOptions, PutOptions, UserMetadata};
use crate::core::blob_utils::{apply_get_options, md5_etag};
use crate::core::listing::page_listing;
use crate::domain::blob::{
    Blob, BlobMetadata, ContentMetadata as BlobContent, GetOptions, ListContainerOptions, PageSet, StorageMetadata,
    StorageType, DIRECTORY_CONTENT_TYPE,
};
use crate::domain::location::Location;
use crate::domain::ports::BlobStore;
use crate::utils::error::{CloudError, Result};
use crate::utils::validation::validate_object_name;
use async_trait::async_trait;
use futures::future::try_join_all;

pub const PROVIDER_ID: &str = "atmos";

/// Blob store view of an Atmos namespace: root directories are containers.
pub struct AtmosBlobStore {
    client: AtmosClient,
    location: Location,
}

impl AtmosBlobStore {
    pub fn new(client: AtmosClient) -> Self {
        Self {
            client,
            location: Location::provider(PROVIDER_ID),
        }
    }

    pub fn client(&self) -> &AtmosClient {
        &self.client
    }

    async fn require_container(&self, container: &str) -> Result<()> {
        if self.client.path_exists(&directory_path(container)).await? {
            Ok(())
        } else {
            Err(CloudError::ContainerNotFound {
                container: container.to_string(),
            })
        }
    }

    /// Every file and directory below `prefix`, named relative to the container.
    /// Directories come back as `name/` markers.
    async fn walk(&self, container: &str, prefix: Option<&str>) -> Result<Vec<BlobMetadata>> {
        let mut entries = Vec::new();
        let mut pending = vec![prefix.map(|p| p.trim_matches('/').to_string()).unwrap_or_default()];
        while let Some(relative) = pending.pop() {
            let mut options = ListOptions::default();
            loop {
                let page = self
                    .client
                    .list_directory(&file_path(container, &relative), &options)
                    .await?;
                for entry in page.items {
                    let name = if relative.is_empty() {
                        entry.object_name.clone()
                    } else {
                        format!("{}/{}", relative, entry.object_name)
                    };
                    match entry.file_type {
                        FileType::Directory => {
                            entries.push(marker(container, &name));
                            pending.push(name);
                        }
                        FileType::RegularFile => entries.push(BlobMetadata {
                            name,
                            container: container.to_string(),
                            ..Default::default()
                        }),
                    }
                }
                match page.token {
                    Some(token) => options = options.token(token),
                    None => break,
                }
            }
        }
        Ok(entries)
    }

    async fn list_one_level(&self, container: &str, options: &ListContainerOptions) -> Result<PageSet<StorageMetadata>> {
        let dir = options.normalized_dir();
        let mut list_options = ListOptions::default().limit(options.effective_max_results());
        if let Some(marker) = &options.marker {
            list_options = list_options.token(marker.clone());
        }
        let path = dir.map(|d| file_path(container, d)).unwrap_or_else(|| container.to_string());
        let page = self.client.list_directory(&path, &list_options).await?;

        let items = page
            .items
            .into_iter()
            .map(|entry| {
                let name = match dir {
                    Some(d) => format!("{}/{}", d, entry.object_name),
                    None => entry.object_name,
                };
                match entry.file_type {
                    FileType::Directory => StorageMetadata::relative_path(name),
                    FileType::RegularFile => StorageMetadata::new(StorageType::Blob, name),
                }
            })
            .collect();
        Ok(PageSet::new(items, page.token))
    }

    async fn fill_details(&self, container: &str, page: &mut PageSet<StorageMetadata>) -> Result<()> {
        let lookups = page
            .items
            .iter()
            .filter(|item| item.kind == StorageType::Blob)
            .map(|item| self.blob_metadata(container, &item.name));
        let details = try_join_all(lookups).await?;
        let blobs = page.items.iter_mut().filter(|i| i.kind == StorageType::Blob);
        for (item, md) in blobs.zip(details) {
            if let Some(md) = md {
                item.etag = md.etag;
                item.size = md.size;
                item.last_modified = md.last_modified;
                item.user_metadata = md.user_metadata;
            }
        }
        Ok(())
    }

    fn to_metadata(container: &str, name: &str, object: &AtmosObject) -> BlobMetadata {
        let system = object.system_metadata.clone().unwrap_or_default();
        let mut content = BlobContent {
            content_type: object.content_metadata.content_type.clone(),
            content_length: object.content_metadata.content_length,
            content_md5: object.content_metadata.content_md5.clone(),
            ..Default::default()
        };
        if system.file_type == Some(FileType::Directory) {
            content.content_type = Some(DIRECTORY_CONTENT_TYPE.to_string());
        }
        BlobMetadata {
            name: name.to_string(),
            container: container.to_string(),
            etag: object.content_metadata.content_md5.as_ref().map(hex::encode),
            last_modified: system.mtime,
            size: system.size.or(object.content_metadata.content_length),
            user_metadata: object.user_metadata.metadata.clone(),
            content,
        }
    }
}

fn marker(container: &str, name: &str) -> BlobMetadata {
    BlobMetadata {
        name: format!("{}/", name),
        container: container.to_string(),
        content: BlobContent {
            content_type: Some(DIRECTORY_CONTENT_TYPE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn not_found_as_container(container: &str, err: CloudError) -> CloudError {
    if err.is_not_found() {
        CloudError::ContainerNotFound {
            container: container.to_string(),
        }
    } else {
        err
    }
}

#[async_trait]
impl BlobStore for AtmosBlobStore {
    async fn list_assignable_locations(&self) -> Result<Vec<Location>> {
        Ok(vec![self.location.clone()])
    }

    async fn list(&self) -> Result<PageSet<StorageMetadata>> {
        let mut containers = Vec::new();
        let mut options = ListOptions::default();
        loop {
            let page = self.client.list_directories(&options).await?;
            containers.extend(
                page.items
                    .into_iter()
                    .filter(|e| e.file_type == FileType::Directory)
                    .map(|e| StorageMetadata::container(e.object_name, Some(self.location.clone()))),
            );
            match page.token {
                Some(token) => options = options.token(token),
                None => break,
            }
        }
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(PageSet::new(containers, None))
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        self.client.path_exists(&directory_path(container)).await
    }

    async fn create_container_in_location(&self, _location: Option<&Location>, container: &str) -> Result<bool> {
        validate_object_name("container", container)?;
        Ok(self.client.create_directory(container).await?.is_some())
    }

    async fn list_container(&self, container: &str, options: &ListContainerOptions) -> Result<PageSet<StorageMetadata>> {
        let mut page = if options.recursive {
            let entries = self
                .walk(container, options.normalized_dir())
                .await
                .map_err(|e| not_found_as_container(container, e))?;
            page_listing(entries, options)
        } else {
            self.list_one_level(container, options)
                .await
                .map_err(|e| not_found_as_container(container, e))?
        };
        if options.detailed {
            self.fill_details(container, &mut page).await?;
        }
        Ok(page)
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        if !self.container_exists(container).await? {
            return Ok(());
        }
        self.clear_container(container).await?;
        self.client.delete_path(&directory_path(container)).await
    }

    async fn directory_exists(&self, container: &str, directory: &str) -> Result<bool> {
        if self
            .client
            .path_exists(&directory_path(&file_path(container, directory)))
            .await?
        {
            return Ok(true);
        }
        self.require_container(container).await?;
        Ok(false)
    }

    async fn create_directory(&self, container: &str, directory: &str) -> Result<()> {
        validate_object_name("directory", directory)?;
        self.require_container(container).await?;
        self.client.create_directory(&file_path(container, directory)).await?;
        Ok(())
    }

    /// Atmos only deletes empty directories, so contents go first, deepest last.
    async fn delete_directory(&self, container: &str, directory: &str) -> Result<()> {
        let entries = match self.walk(container, Some(directory)).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return self.require_container(container).await,
            Err(e) => return Err(e),
        };
        let (mut dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.is_directory_marker());
        for file in &files {
            self.client.delete_path(&file_path(container, &file.name)).await?;
        }
        dirs.sort_by_key(|d| std::cmp::Reverse(d.name.matches('/').count()));
        for dir in &dirs {
            self.client.delete_path(&file_path(container, &dir.name)).await?;
        }
        self.client
            .delete_path(&directory_path(&file_path(container, directory)))
            .await
    }

    async fn blob_exists(&self, container: &str, name: &str) -> Result<bool> {
        if self.client.path_exists(&file_path(container, name)).await? {
            return Ok(true);
        }
        self.require_container(container).await?;
        Ok(false)
    }

    async fn put_blob(&self, container: &str, blob: Blob) -> Result<String> {
        validate_object_name("blob", blob.name())?;
        self.require_container(container).await?;

        let (digest, etag) = md5_etag(&blob.payload);
        let (parent, leaf) = match blob.name().rsplit_once('/') {
            Some((dir, leaf)) => {
                self.client.create_directory(&file_path(container, dir)).await?;
                (file_path(container, dir), leaf.to_string())
            }
            None => (container.to_string(), blob.name().to_string()),
        };
        let object = AtmosObject {
            content_metadata: ContentMetadata {
                name: leaf,
                content_type: blob.metadata.content.content_type.clone(),
                content_length: Some(blob.payload.len() as u64),
                content_md5: Some(digest),
            },
            system_metadata: None,
            user_metadata: UserMetadata {
                metadata: blob
                    .metadata
                    .user_metadata
                    .iter()
                    .map(|(k, v)| (k.to_lowercase(), v.clone()))
                    .collect(),
                ..Default::default()
            },
            payload: blob.payload,
        };

        match self.client.create_file(&parent, &object, PutOptions::default()).await {
            Ok(_) => {}
            Err(CloudError::AlreadyExists { .. }) => {
                tracing::debug!(container, blob = %object.content_metadata.name, "replacing existing file");
                self.client
                    .delete_path(&file_path(&parent, &object.content_metadata.name))
                    .await?;
                self.client.create_file(&parent, &object, PutOptions::default()).await?;
            }
            Err(e) => return Err(e),
        }
        Ok(etag)
    }

    async fn blob_metadata(&self, container: &str, name: &str) -> Result<Option<BlobMetadata>> {
        match self.client.head_file(&file_path(container, name)).await? {
            Some(object) => Ok(Some(Self::to_metadata(container, name, &object))),
            None => {
                self.require_container(container).await?;
                Ok(None)
            }
        }
    }

    async fn get_blob(&self, container: &str, name: &str, options: &GetOptions) -> Result<Option<Blob>> {
        let path = file_path(container, name);
        // conditions are evaluated against the whole payload's digest
        let remote_options = if options.is_conditional() {
            GetOptions::default()
        } else {
            options.clone()
        };
        let Some(object) = self.client.read_file(&path, &remote_options).await? else {
            self.require_container(container).await?;
            return Ok(None);
        };
        let mut metadata = Self::to_metadata(container, name, &object);
        if remote_options.ranges.is_empty() {
            let (digest, etag) = md5_etag(&object.payload);
            metadata.etag = Some(etag);
            metadata.content.content_md5 = Some(digest);
        }
        metadata.content.content_length = Some(object.payload.len() as u64);
        let blob = Blob {
            metadata,
            payload: object.payload,
        };
        if options.is_conditional() {
            apply_get_options(blob, options).map(Some)
        } else {
            Ok(Some(blob))
        }
    }

    async fn remove_blob(&self, container: &str, name: &str) -> Result<()> {
        self.client.delete_path(&file_path(container, name)).await
    }
}
