use crate::domain::blob::{
    Blob, BlobMetadata, GetOptions, ListContainerOptions, PageSet, StorageMetadata,
};
use crate::domain::compute::{
    Hardware, Image, NodeAndInitialCredentials, NodeMetadata, Template,
};
use crate::domain::location::Location;
use crate::domain::template::TemplateBuilder;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Selects nodes for the bulk `*_nodes_matching` operations.
pub type NodePredicate<'a> = &'a (dyn Fn(&NodeMetadata) -> bool + Send + Sync);

/// Vendor-neutral object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list_assignable_locations(&self) -> Result<Vec<Location>>;

    /// Lists containers.
    async fn list(&self) -> Result<PageSet<StorageMetadata>>;

    async fn container_exists(&self, container: &str) -> Result<bool>;

    /// Returns true when the container was created, false when it already existed.
    async fn create_container_in_location(
        &self,
        location: Option<&Location>,
        container: &str,
    ) -> Result<bool>;

    async fn list_container(
        &self,
        container: &str,
        options: &ListContainerOptions,
    ) -> Result<PageSet<StorageMetadata>>;

    async fn delete_container(&self, container: &str) -> Result<()>;

    async fn directory_exists(&self, container: &str, directory: &str) -> Result<bool>;

    async fn create_directory(&self, container: &str, directory: &str) -> Result<()>;

    async fn delete_directory(&self, container: &str, directory: &str) -> Result<()>;

    async fn blob_exists(&self, container: &str, name: &str) -> Result<bool>;

    /// Stores the blob and returns its etag.
    async fn put_blob(&self, container: &str, blob: Blob) -> Result<String>;

    async fn blob_metadata(&self, container: &str, name: &str) -> Result<Option<BlobMetadata>>;

    async fn get_blob(
        &self,
        container: &str,
        name: &str,
        options: &GetOptions,
    ) -> Result<Option<Blob>>;

    async fn remove_blob(&self, container: &str, name: &str) -> Result<()>;

    async fn clear_container(&self, container: &str) -> Result<()> {
        crate::core::blob_utils::clear_container(self, container).await
    }

    async fn count_blobs(&self, container: &str) -> Result<u64> {
        crate::core::blob_utils::count_blobs(self, container).await
    }
}

/// The provider-typed half of a compute integration. Adapters speak their own
/// DTOs and supply conversions to the portable model.
#[async_trait]
pub trait ComputeServiceAdapter: Send + Sync {
    type Node: Send + Sync;
    type Hardware: Send + Sync;
    type Image: Send + Sync;
    type Location: Send + Sync;

    async fn create_node_with_group_encoded_into_name(
        &self,
        group: &str,
        name: &str,
        template: &Template,
    ) -> Result<NodeAndInitialCredentials<Self::Node>>;

    async fn list_hardware_profiles(&self) -> Result<Vec<Self::Hardware>>;

    async fn list_images(&self) -> Result<Vec<Self::Image>>;

    async fn list_locations(&self) -> Result<Vec<Self::Location>>;

    async fn list_nodes(&self) -> Result<Vec<Self::Node>>;

    async fn get_node(&self, id: &str) -> Result<Option<Self::Node>>;

    async fn destroy_node(&self, id: &str) -> Result<()>;

    async fn reboot_node(&self, id: &str) -> Result<()>;

    async fn resume_node(&self, id: &str) -> Result<()>;

    async fn suspend_node(&self, id: &str) -> Result<()>;

    fn to_node_metadata(&self, node: &Self::Node) -> NodeMetadata;

    fn to_hardware(&self, hardware: &Self::Hardware) -> Hardware;

    fn to_image(&self, image: &Self::Image) -> Image;

    fn to_location(&self, location: &Self::Location) -> Location;
}

/// Vendor-neutral virtual machine management.
#[async_trait]
pub trait ComputeService: Send + Sync {
    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>>;

    async fn list_images(&self) -> Result<Vec<Image>>;

    async fn list_assignable_locations(&self) -> Result<Vec<Location>>;

    async fn list_nodes(&self) -> Result<Vec<NodeMetadata>>;

    async fn list_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>>;

    async fn get_node_metadata(&self, id: &str) -> Result<Option<NodeMetadata>>;

    async fn build_template(&self, builder: TemplateBuilder) -> Result<Template>;

    async fn create_nodes_in_group(
        &self,
        group: &str,
        count: usize,
        template: &Template,
    ) -> Result<Vec<NodeMetadata>>;

    async fn destroy_node(&self, id: &str) -> Result<()>;

    async fn destroy_nodes_matching(&self, filter: NodePredicate<'_>)
        -> Result<Vec<NodeMetadata>>;

    async fn reboot_node(&self, id: &str) -> Result<()>;

    async fn resume_node(&self, id: &str) -> Result<()>;

    async fn suspend_node(&self, id: &str) -> Result<()>;

    async fn reboot_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>>;

    async fn resume_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>>;

    async fn suspend_nodes_matching(&self, filter: NodePredicate<'_>)
        -> Result<Vec<NodeMetadata>>;
}
