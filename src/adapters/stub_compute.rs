use crate::domain::compute::{
    Hardware, Image, ImageStatus, NodeAndInitialCredentials, NodeMetadata, NodeStatus, OperatingSystem, Processor,
    Template, Volume,
};
use crate::domain::credentials::LoginCredentials;
use crate::domain::location::{Location, LocationScope};
use crate::domain::ports::ComputeServiceAdapter;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

pub const PROVIDER_ID: &str = "stub";

#[derive(Debug, Clone)]
pub struct StubNode {
    pub id: String,
    pub name: String,
    pub group: String,
    pub status: NodeStatus,
    pub hardware: Hardware,
    pub image_id: String,
    pub location: Location,
    pub ordinal: u64,
    pending_reads: usize,
    fails_on_start: bool,
}

/// In-memory compute provider with a fixed catalog.
pub struct StubComputeServiceAdapter {
    nodes: DashMap<String, StubNode>,
    next_id: AtomicU64,
    reads_until_running: usize,
    failing_names: DashSet<String>,
    error_names: DashSet<String>,
}

impl Default for StubComputeServiceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StubComputeServiceAdapter {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            next_id: AtomicU64::new(1),
            reads_until_running: 1,
            failing_names: DashSet::new(),
            error_names: DashSet::new(),
        }
    }

    /// Number of status reads a new node spends in `Pending`.
    pub fn with_reads_until_running(mut self, reads: usize) -> Self {
        self.reads_until_running = reads;
        self
    }

    /// Creation of a node with this name fails outright.
    pub fn fail_creation_of(&self, name: impl Into<String>) {
        self.failing_names.insert(name.into());
    }

    /// A node with this name is created but goes into `Error` while starting.
    pub fn error_on_start_of(&self, name: impl Into<String>) {
        self.error_names.insert(name.into());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn provider() -> Location {
        Location::provider(PROVIDER_ID).with_iso3166_codes(["US"])
    }

    fn region() -> Location {
        Location::new("stub-region", LocationScope::Region, "stub region").with_parent(Self::provider())
    }

    pub fn zones() -> Vec<Location> {
        ["stub-zone-a", "stub-zone-b"]
            .into_iter()
            .map(|id| Location::new(id, LocationScope::Zone, id).with_parent(Self::region()))
            .collect()
    }

    pub fn hardware_catalog() -> Vec<Hardware> {
        [("small", 1.0, 1024, 20.0), ("medium", 2.0, 4096, 40.0), ("large", 4.0, 8192, 80.0)]
            .into_iter()
            .map(|(id, cores, ram_mb, disk)| Hardware {
                id: id.to_string(),
                name: id.to_string(),
                processors: vec![Processor { cores, speed: 2.0 }],
                ram_mb,
                volumes: vec![Volume::local(disk, true)],
                location: None,
                hypervisor: Some("stub".to_string()),
            })
            .collect()
    }

    pub fn image_catalog() -> Vec<Image> {
        [("ubuntu-22.04", "Ubuntu 22.04 LTS 64-bit"), ("centos-7", "CentOS 7 64-bit")]
            .into_iter()
            .map(|(id, description)| Image {
                id: id.to_string(),
                name: description.to_string(),
                os: OperatingSystem::from_description(description),
                description: description.to_string(),
                location: None,
                status: ImageStatus::Available,
                default_credentials: Some(LoginCredentials {
                    user: "root".to_string(),
                    ..Default::default()
                }),
            })
            .collect()
    }

    fn not_found(id: &str) -> CloudError {
        CloudError::ResourceNotFound {
            resource: format!("stub node {}", id),
        }
    }

    fn set_status(&self, id: &str, status: NodeStatus) -> Result<()> {
        let mut node = self.nodes.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        node.status = status;
        Ok(())
    }
}

#[async_trait]
impl ComputeServiceAdapter for StubComputeServiceAdapter {
    type Node = StubNode;
    type Hardware = Hardware;
    type Image = Image;
    type Location = Location;

    async fn create_node_with_group_encoded_into_name(
        &self,
        group: &str,
        name: &str,
        template: &Template,
    ) -> Result<NodeAndInitialCredentials<StubNode>> {
        if self.failing_names.contains(name) {
            return Err(CloudError::HttpResponse {
                status: 500,
                method: "POST".to_string(),
                url: format!("stub://nodes/{}", name),
                message: "simulated provisioning failure".to_string(),
            });
        }
        let ordinal = self.next_id.fetch_add(1, Ordering::SeqCst);
        let node = StubNode {
            id: ordinal.to_string(),
            name: name.to_string(),
            group: group.to_string(),
            status: NodeStatus::Pending,
            hardware: template.hardware.clone(),
            image_id: template.image.id.clone(),
            location: template.location.clone(),
            ordinal,
            pending_reads: self.reads_until_running,
            fails_on_start: self.error_names.contains(name),
        };
        let password: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        self.nodes.insert(node.id.clone(), node.clone());
        Ok(NodeAndInitialCredentials {
            node_id: node.id.clone(),
            node,
            credentials: Some(LoginCredentials::password("root", password)),
        })
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>> {
        Ok(Self::hardware_catalog())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        Ok(Self::image_catalog())
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        Ok(Self::zones())
    }

    async fn list_nodes(&self) -> Result<Vec<StubNode>> {
        let mut nodes: Vec<StubNode> = self.nodes.iter().map(|n| n.value().clone()).collect();
        nodes.sort_by_key(|n| n.ordinal);
        Ok(nodes)
    }

    async fn get_node(&self, id: &str) -> Result<Option<StubNode>> {
        let Some(mut node) = self.nodes.get_mut(id) else {
            return Ok(None);
        };
        if node.status == NodeStatus::Pending {
            if node.pending_reads == 0 {
                node.status = if node.fails_on_start {
                    NodeStatus::Error
                } else {
                    NodeStatus::Running
                };
            } else {
                node.pending_reads -= 1;
            }
        }
        Ok(Some(node.clone()))
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        if self.nodes.remove(id).is_some() {
            tracing::debug!(node = id, "stub node removed");
        }
        Ok(())
    }

    async fn reboot_node(&self, id: &str) -> Result<()> {
        self.set_status(id, NodeStatus::Running)
    }

    async fn resume_node(&self, id: &str) -> Result<()> {
        self.set_status(id, NodeStatus::Running)
    }

    async fn suspend_node(&self, id: &str) -> Result<()> {
        self.set_status(id, NodeStatus::Suspended)
    }

    fn to_node_metadata(&self, node: &StubNode) -> NodeMetadata {
        let octet = node.ordinal % 254 + 1;
        let mut md = NodeMetadata::new(node.id.clone(), node.name.clone(), node.status);
        md.group = Some(node.group.clone());
        md.backend_status = Some(node.status.to_string());
        md.location = Some(node.location.clone());
        md.hardware = Some(node.hardware.clone());
        md.image_id = Some(node.image_id.clone());
        md.os = Self::image_catalog()
            .into_iter()
            .find(|i| i.id == node.image_id)
            .map(|i| i.os);
        md.public_addresses = vec![format!("203.0.113.{}", octet)];
        md.private_addresses = vec![format!("10.0.0.{}", octet)];
        md
    }

    fn to_hardware(&self, hardware: &Hardware) -> Hardware {
        hardware.clone()
    }

    fn to_image(&self, image: &Image) -> Image {
        image.clone()
    }

    fn to_location(&self, location: &Location) -> Location {
        location.clone()
    }
}
