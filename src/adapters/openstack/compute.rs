use super::domain::{CreateServerOptions, Flavor, NovaImage, RebootType, Server, ServerStatus};
use super::nova::NovaClient;
use crate::domain::compute::{
    Hardware, Image, ImageStatus, NodeAndInitialCredentials, NodeMetadata, NodeStatus, OperatingSystem, Processor,
    Template, Volume,
};
use crate::domain::credentials::LoginCredentials;
use crate::domain::location::{Location, LocationScope};
use crate::domain::ports::ComputeServiceAdapter;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use std::net::IpAddr;

pub const PROVIDER_ID: &str = "openstack-nova";

pub fn node_status(status: ServerStatus) -> NodeStatus {
    match status {
        ServerStatus::Active => NodeStatus::Running,
        ServerStatus::Build
        | ServerStatus::Rebuild
        | ServerStatus::Reboot
        | ServerStatus::HardReboot
        | ServerStatus::Resize
        | ServerStatus::VerifyResize
        | ServerStatus::Password
        | ServerStatus::Migrating => NodeStatus::Pending,
        ServerStatus::Suspended | ServerStatus::Paused | ServerStatus::Shutoff | ServerStatus::Stopped => {
            NodeStatus::Suspended
        }
        ServerStatus::Deleted => NodeStatus::Terminated,
        ServerStatus::Error => NodeStatus::Error,
        ServerStatus::Unrecognized => NodeStatus::Unrecognized,
    }
}

/// RFC 1918 space for IPv4, unique local addresses for IPv6.
pub fn is_private_address(addr: &str) -> bool {
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_private(),
        Ok(IpAddr::V6(v6)) => (v6.segments()[0] & 0xfe00) == 0xfc00,
        Err(_) => false,
    }
}

fn image_status(status: Option<&str>) -> ImageStatus {
    match status.map(str::to_ascii_uppercase).as_deref() {
        Some("ACTIVE") => ImageStatus::Available,
        Some("SAVING") | Some("QUEUED") | Some("UNKNOWN") => ImageStatus::Pending,
        Some("DELETED") => ImageStatus::Deleted,
        Some("ERROR") | Some("KILLED") => ImageStatus::Error,
        _ => ImageStatus::Unrecognized,
    }
}

/// Nova servers, flavors and images through the portable compute model.
pub struct NovaComputeServiceAdapter {
    client: NovaClient,
    provider: Location,
    default_login_user: String,
}

impl NovaComputeServiceAdapter {
    pub fn new(client: NovaClient) -> Self {
        Self {
            client,
            provider: Location::provider(PROVIDER_ID),
            default_login_user: "root".to_string(),
        }
    }

    pub fn with_login_user(mut self, user: impl Into<String>) -> Self {
        self.default_login_user = user.into();
        self
    }

    fn region_location(&self, region: &str) -> Location {
        Location::new(region, LocationScope::Region, region).with_parent(self.provider.clone())
    }
}

#[async_trait]
impl ComputeServiceAdapter for NovaComputeServiceAdapter {
    type Node = Server;
    type Hardware = Flavor;
    type Image = NovaImage;
    type Location = String;

    async fn create_node_with_group_encoded_into_name(
        &self,
        group: &str,
        name: &str,
        template: &Template,
    ) -> Result<NodeAndInitialCredentials<Server>> {
        let options = CreateServerOptions {
            name: name.to_string(),
            image_ref: template.image.id.clone(),
            flavor_ref: template.hardware.id.clone(),
            metadata: template.options.user_metadata.clone(),
            admin_pass: template.options.login_password.clone(),
        };
        tracing::debug!(group, name, "creating nova server");
        let created = self.client.create_server(&options).await?;
        let server = self
            .client
            .get_server(&created.id)
            .await?
            .ok_or_else(|| CloudError::illegal_state(format!("server {} vanished after create", created.id)))?;

        let user = template
            .options
            .login_user
            .clone()
            .unwrap_or_else(|| self.default_login_user.clone());
        Ok(NodeAndInitialCredentials {
            node_id: created.id,
            credentials: created.admin_pass.map(|pass| LoginCredentials::password(user, pass)),
            node: server,
        })
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<Flavor>> {
        self.client.list_flavors().await
    }

    async fn list_images(&self) -> Result<Vec<NovaImage>> {
        self.client.list_images().await
    }

    async fn list_locations(&self) -> Result<Vec<String>> {
        self.client.regions().await
    }

    async fn list_nodes(&self) -> Result<Vec<Server>> {
        self.client.list_servers().await
    }

    async fn get_node(&self, id: &str) -> Result<Option<Server>> {
        self.client.get_server(id).await
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        if !self.client.delete_server(id).await? {
            tracing::debug!(node = id, "server was already gone");
        }
        Ok(())
    }

    async fn reboot_node(&self, id: &str) -> Result<()> {
        self.client.reboot_server(id, RebootType::Hard).await
    }

    async fn resume_node(&self, id: &str) -> Result<()> {
        self.client.resume_server(id).await
    }

    async fn suspend_node(&self, id: &str) -> Result<()> {
        self.client.suspend_server(id).await
    }

    fn to_node_metadata(&self, server: &Server) -> NodeMetadata {
        let mut md = NodeMetadata::new(server.id.clone(), server.name.clone(), node_status(server.status));
        md.backend_status = Some(server.status.to_string());
        md.image_id = server.image.as_ref().map(|i| i.id.clone());
        md.location = server
            .availability_zone
            .as_deref()
            .map(|zone| Location::new(zone, LocationScope::Zone, zone).with_parent(self.provider.clone()));
        let (private, public): (Vec<String>, Vec<String>) =
            server.all_addresses().into_iter().partition(|a| is_private_address(a));
        md.private_addresses = private;
        md.public_addresses = public;
        md.user_metadata = server.metadata.clone();
        md
    }

    fn to_hardware(&self, flavor: &Flavor) -> Hardware {
        let volumes = if flavor.disk > 0 {
            vec![Volume::local(flavor.disk as f32, true)]
        } else {
            Vec::new()
        };
        Hardware {
            id: flavor.id.clone(),
            name: flavor.name.clone(),
            processors: vec![Processor {
                cores: f64::from(flavor.vcpus),
                speed: 1.0,
            }],
            ram_mb: flavor.ram,
            volumes,
            location: None,
            hypervisor: None,
        }
    }

    fn to_image(&self, image: &NovaImage) -> Image {
        Image {
            id: image.id.clone(),
            name: image.name.clone(),
            os: OperatingSystem::from_description(&image.name),
            description: image.name.clone(),
            location: None,
            status: image_status(image.status.as_deref()),
            default_credentials: None,
        }
    }

    fn to_location(&self, region: &String) -> Location {
        self.region_location(region)
    }
}
