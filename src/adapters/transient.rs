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
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

struct ContainerState {
    location: Option<Location>,
    blobs: BTreeMap<String, Blob>,
}

/// In-memory blob store; everything is lost when it is dropped.
pub struct TransientBlobStore {
    location: Location,
    containers: DashMap<String, ContainerState>,
}

impl Default for TransientBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransientBlobStore {
    pub fn new() -> Self {
        Self {
            location: Location::provider("transient"),
            containers: DashMap::new(),
        }
    }

    fn missing(container: &str) -> CloudError {
        CloudError::ContainerNotFound {
            container: container.to_string(),
        }
    }

    fn marker_name(directory: &str) -> String {
        format!("{}/", directory.trim_end_matches('/'))
    }
}

#[async_trait]
impl BlobStore for TransientBlobStore {
    async fn list_assignable_locations(&self) -> Result<Vec<Location>> {
        Ok(vec![self.location.clone()])
    }

    async fn list(&self) -> Result<PageSet<StorageMetadata>> {
        let mut items: Vec<StorageMetadata> = self
            .containers
            .iter()
            .map(|entry| StorageMetadata::container(entry.key().clone(), entry.value().location.clone()))
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(PageSet::new(items, None))
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(self.containers.contains_key(container))
    }

    async fn create_container_in_location(&self, location: Option<&Location>, container: &str) -> Result<bool> {
        validate_object_name("container", container)?;
        match self.containers.entry(container.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(ContainerState {
                    location: Some(location.cloned().unwrap_or_else(|| self.location.clone())),
                    blobs: BTreeMap::new(),
                });
                tracing::debug!(container, "created container");
                Ok(true)
            }
        }
    }

    async fn list_container(&self, container: &str, options: &ListContainerOptions) -> Result<PageSet<StorageMetadata>> {
        let state = self.containers.get(container).ok_or_else(|| Self::missing(container))?;
        let entries: Vec<BlobMetadata> = state.blobs.values().map(|b| b.metadata.clone()).collect();
        drop(state);
        Ok(page_listing(entries, options))
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        if self.containers.remove(container).is_some() {
            tracing::debug!(container, "deleted container");
        }
        Ok(())
    }

    async fn directory_exists(&self, container: &str, directory: &str) -> Result<bool> {
        let state = self.containers.get(container).ok_or_else(|| Self::missing(container))?;
        let prefix = Self::marker_name(directory);
        Ok(state.blobs.keys().any(|name| name.starts_with(&prefix)))
    }

    async fn create_directory(&self, container: &str, directory: &str) -> Result<()> {
        validate_object_name("directory", directory)?;
        let mut state = self.containers.get_mut(container).ok_or_else(|| Self::missing(container))?;
        let name = Self::marker_name(directory);
        let mut marker = Blob::builder(name.clone()).content_type(DIRECTORY_CONTENT_TYPE).build();
        marker.metadata.container = container.to_string();
        marker.metadata.last_modified = Some(Utc::now());
        state.blobs.entry(name).or_insert(marker);
        Ok(())
    }

    async fn delete_directory(&self, container: &str, directory: &str) -> Result<()> {
        let mut state = self.containers.get_mut(container).ok_or_else(|| Self::missing(container))?;
        let prefix = Self::marker_name(directory);
        state.blobs.retain(|name, _| !name.starts_with(&prefix));
        Ok(())
    }

    async fn blob_exists(&self, container: &str, name: &str) -> Result<bool> {
        let state = self.containers.get(container).ok_or_else(|| Self::missing(container))?;
        Ok(state.blobs.contains_key(name))
    }

    async fn put_blob(&self, container: &str, mut blob: Blob) -> Result<String> {
        validate_object_name("blob", blob.name())?;
        let mut state = self.containers.get_mut(container).ok_or_else(|| Self::missing(container))?;

        let (digest, etag) = md5_etag(&blob.payload);
        let size = blob.payload.len() as u64;
        let metadata = &mut blob.metadata;
        metadata.container = container.to_string();
        metadata.etag = Some(etag.clone());
        metadata.size = Some(size);
        metadata.last_modified = Some(Utc::now());
        metadata.content.content_md5 = Some(digest);
        metadata.content.content_length = Some(size);
        metadata.user_metadata = std::mem::take(&mut metadata.user_metadata)
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        tracing::debug!(container, blob = %blob.name(), size, "stored blob");
        state.blobs.insert(blob.name().to_string(), blob);
        Ok(etag)
    }

    async fn blob_metadata(&self, container: &str, name: &str) -> Result<Option<BlobMetadata>> {
        let state = self.containers.get(container).ok_or_else(|| Self::missing(container))?;
        Ok(state.blobs.get(name).map(|b| b.metadata.clone()))
    }

    async fn get_blob(&self, container: &str, name: &str, options: &GetOptions) -> Result<Option<Blob>> {
        let blob = {
            let state = self.containers.get(container).ok_or_else(|| Self::missing(container))?;
            state.blobs.get(name).cloned()
        };
        blob.map(|b| apply_get_options(b, options)).transpose()
    }

    async fn remove_blob(&self, container: &str, name: &str) -> Result<()> {
        if let Some(mut state) = self.containers.get_mut(container) {
            state.blobs.remove(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blob::StorageType;

    #[tokio::test]
    async fn test_create_container_twice() {
        let store = TransientBlobStore::new();
        assert!(store.create_container_in_location(None, "c").await.unwrap());
        assert!(!store.create_container_in_location(None, "c").await.unwrap());
        let containers = store.list().await.unwrap();
        assert_eq!(containers.items[0].location.as_ref().map(|l| l.id.as_str()), Some("transient"));
    }

    #[tokio::test]
    async fn test_put_sets_etag_and_lowercases_metadata() {
        let store = TransientBlobStore::new();
        store.create_container_in_location(None, "c").await.unwrap();
        let etag = store
            .put_blob(
                "c",
                Blob::builder("a.txt").payload("").user_metadata([("Owner", "Ops")]).build(),
            )
            .await
            .unwrap();
        assert_eq!(etag, "d41d8cd98f00b204e9800998ecf8427e");

        let md = store.blob_metadata("c", "a.txt").await.unwrap().unwrap();
        assert_eq!(md.user_metadata.get("owner").map(String::as_str), Some("Ops"));
        assert_eq!(md.container, "c");
        assert!(md.last_modified.is_some());
    }

    #[tokio::test]
    async fn test_put_into_missing_container() {
        let store = TransientBlobStore::new();
        let err = store
            .put_blob("nope", Blob::builder("a").payload("x").build())
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::ContainerNotFound { .. }));
    }

    #[tokio::test]
    async fn test_directory_marker_listed_as_relative_path() {
        let store = TransientBlobStore::new();
        store.create_container_in_location(None, "c").await.unwrap();
        store.create_directory("c", "photos").await.unwrap();
        assert!(store.directory_exists("c", "photos").await.unwrap());

        let page = store.list_container("c", &ListContainerOptions::default()).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.items[0].kind, StorageType::RelativePath);
        assert_eq!(page.items[0].name, "photos");

        store.delete_directory("c", "photos").await.unwrap();
        assert!(!store.directory_exists("c", "photos").await.unwrap());
    }
}
