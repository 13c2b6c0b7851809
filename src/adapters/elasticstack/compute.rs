use super::client::ElasticStackClient;
use super::domain::{Drive, Nic, Server, ServerInfo, ServerStatus};
use crate::config::StandardDrive;
use crate::core::http::FallbackExt;
use crate::core::retry::{retry_until, RetryPolicy};
use crate::domain::compute::{
    Hardware, Image, ImageStatus, NodeAndInitialCredentials, NodeMetadata, NodeStatus, OperatingSystem, Processor,
    Template, Volume,
};
use crate::domain::credentials::LoginCredentials;
use crate::domain::location::Location;
use crate::domain::ports::ComputeServiceAdapter;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::HashSet;
use std::net::IpAddr;

const CPU_MHZ: [u32; 4] = [1000, 5000, 10000, 20000];
const RAM_MB: [u32; 5] = [512, 1024, 4096, 16384, 32768];
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;
const DEFAULT_LOGIN_USER: &str = "root";

pub fn node_status(status: ServerStatus) -> NodeStatus {
    match status {
        ServerStatus::Active => NodeStatus::Running,
        ServerStatus::Stopped | ServerStatus::Paused => NodeStatus::Suspended,
        ServerStatus::Dumped | ServerStatus::Dead => NodeStatus::Terminated,
        ServerStatus::Unrecognized => NodeStatus::Unrecognized,
    }
}

pub fn hardware_id(cpu: u32, ram: u32, disk_gb: u32) -> String {
    format!("cpu={},ram={},disk={}", cpu, ram, disk_gb)
}

/// Inverse of [`hardware_id`].
pub fn parse_hardware_id(id: &str) -> Result<(u32, u32, u32)> {
    let mut cpu = None;
    let mut ram = None;
    let mut disk = None;
    for part in id.split(',') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| CloudError::invalid_argument(format!("malformed hardware id {}", id)))?;
        let value: u32 = value
            .trim()
            .parse()
            .map_err(|_| CloudError::invalid_argument(format!("malformed hardware id {}", id)))?;
        match key.trim() {
            "cpu" => cpu = Some(value),
            "ram" => ram = Some(value),
            "disk" => disk = Some(value),
            _ => {}
        }
    }
    match (cpu, ram, disk) {
        (Some(cpu), Some(ram), Some(disk)) => Ok((cpu, ram, disk)),
        _ => Err(CloudError::invalid_argument(format!("hardware id {} needs cpu, ram and disk", id))),
    }
}

fn hardware(cpu: u32, ram: u32, disk_gb: u32, location: Option<Location>) -> Hardware {
    let id = hardware_id(cpu, ram, disk_gb);
    Hardware {
        name: id.clone(),
        id,
        processors: vec![Processor {
            cores: 1.0,
            speed: f64::from(cpu) / 1000.0,
        }],
        ram_mb: ram,
        volumes: vec![Volume::local(disk_gb as f32, true)],
        location,
        hypervisor: Some("kvm".to_string()),
    }
}

/// Compute adapter for the ElasticStack family of clouds.
pub struct ElasticStackComputeServiceAdapter {
    client: ElasticStackClient,
    location: Location,
    standard_drives: Vec<StandardDrive>,
    imaging_policy: RetryPolicy,
}

impl ElasticStackComputeServiceAdapter {
    pub fn new(client: ElasticStackClient, location: Location, standard_drives: Vec<StandardDrive>) -> Self {
        Self {
            client,
            location,
            standard_drives,
            imaging_policy: RetryPolicy::default(),
        }
    }

    /// How long to wait for a new drive to finish copying its image.
    pub fn with_imaging_policy(mut self, policy: RetryPolicy) -> Self {
        self.imaging_policy = policy;
        self
    }

    pub fn client(&self) -> &ElasticStackClient {
        &self.client
    }

    async fn create_imaged_drive(&self, name: &str, image_id: &str, disk_gb: u32) -> Result<String> {
        let drive = self
            .client
            .create_drive(&Drive::new(name, u64::from(disk_gb) * BYTES_PER_GB))
            .await?;
        let uuid = drive.uuid;
        let result = async {
            self.client.image_drive(image_id, &uuid).await?;
            let client = &self.client;
            let target = &uuid;
            retry_until(&self.imaging_policy, &format!("drive {} imaging", uuid), || async move {
                match client.get_drive_info(target).await? {
                    Some(info) if info.is_imaging() => {
                        tracing::debug!(drive = %target, progress = ?info.imaging, "drive still imaging");
                        Ok(None)
                    }
                    Some(info) => Ok(Some(info)),
                    None => Err(CloudError::ResourceNotFound {
                        resource: format!("drive {}", target),
                    }),
                }
            })
            .await
        }
        .await;

        match result {
            Ok(_) => Ok(uuid),
            Err(e) => {
                tracing::warn!(drive = %uuid, error = %e, "imaging failed, destroying drive");
                if let Err(cleanup) = self.client.destroy_drive(&uuid).await.or_void_on_not_found() {
                    tracing::warn!(drive = %uuid, error = %cleanup, "could not destroy drive");
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ComputeServiceAdapter for ElasticStackComputeServiceAdapter {
    type Node = ServerInfo;
    type Hardware = Hardware;
    type Image = StandardDrive;
    type Location = Location;

    async fn create_node_with_group_encoded_into_name(
        &self,
        group: &str,
        name: &str,
        template: &Template,
    ) -> Result<NodeAndInitialCredentials<ServerInfo>> {
        let (cpu, ram, disk_gb) = parse_hardware_id(&template.hardware.id)?;
        tracing::debug!(group, name, cpu, ram, disk_gb, image = %template.image.id, ">> creating server");

        let drive = self.create_imaged_drive(name, &template.image.id, disk_gb).await?;

        let password: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let mut server = Server::new(name, cpu, ram)
            .boot_drive(drive.clone())
            .nic(Nic {
                dhcp: Some("auto".to_string()),
                ..Default::default()
            })
            .vnc_password(password.clone());
        server.tags = template.options.tags.iter().cloned().collect();
        server.user_metadata = template.options.user_metadata.clone();

        let info = match self.client.create_and_start_server(&server).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(name, drive = %drive, error = %e, "server creation failed, destroying drive");
                if let Err(cleanup) = self.client.destroy_drive(&drive).await.or_void_on_not_found() {
                    tracing::warn!(drive = %drive, error = %cleanup, "could not destroy drive");
                }
                return Err(e);
            }
        };
        tracing::debug!(name, uuid = %info.uuid, "<< created server");

        let user = template
            .image
            .default_credentials
            .as_ref()
            .map(|c| c.user.clone())
            .unwrap_or_else(|| DEFAULT_LOGIN_USER.to_string());
        Ok(NodeAndInitialCredentials {
            node_id: info.uuid.clone(),
            node: info,
            credentials: Some(LoginCredentials::password(user, password)),
        })
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>> {
        let mut profiles = Vec::with_capacity(CPU_MHZ.len() * RAM_MB.len());
        for cpu in CPU_MHZ {
            for ram in RAM_MB {
                profiles.push(hardware(cpu, ram, cpu / 100, Some(self.location.clone())));
            }
        }
        Ok(profiles)
    }

    async fn list_images(&self) -> Result<Vec<StandardDrive>> {
        let reported: HashSet<String> = self.client.list_drives().await?.into_iter().collect();
        Ok(self
            .standard_drives
            .iter()
            .filter(|d| reported.contains(&d.uuid))
            .cloned()
            .collect())
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        Ok(vec![self.location.clone()])
    }

    async fn list_nodes(&self) -> Result<Vec<ServerInfo>> {
        self.client.list_server_info().await
    }

    async fn get_node(&self, id: &str) -> Result<Option<ServerInfo>> {
        self.client.get_server_info(id).await
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        let Some(info) = self.client.get_server_info(id).await? else {
            return Ok(());
        };
        tracing::debug!(node = id, ">> destroying server and drives");
        self.client.stop_server(id).await.or_void_on_not_found()?;
        self.client.destroy_server(id).await.or_void_on_not_found()?;
        for drive in info.drive_uuids() {
            self.client.destroy_drive(drive).await.or_void_on_not_found()?;
        }
        tracing::debug!(node = id, "<< destroyed server and drives");
        Ok(())
    }

    async fn reboot_node(&self, id: &str) -> Result<()> {
        self.client.reset_server(id).await
    }

    async fn resume_node(&self, id: &str) -> Result<()> {
        self.client.start_server(id).await
    }

    async fn suspend_node(&self, id: &str) -> Result<()> {
        self.client.stop_server(id).await
    }

    fn to_node_metadata(&self, info: &ServerInfo) -> NodeMetadata {
        let server = &info.server;
        let status = node_status(info.status);
        let mut md = NodeMetadata::new(info.uuid.clone(), server.name.clone(), status);
        md.backend_status = Some(info.status.to_string());
        md.location = Some(self.location.clone());
        md.hardware = Some(Hardware {
            processors: vec![Processor {
                cores: server.smp.map(f64::from).unwrap_or(1.0),
                speed: f64::from(server.cpu) / 1000.0,
            }],
            ..hardware(server.cpu, server.mem, server.cpu / 100, Some(self.location.clone()))
        });
        md.public_addresses = server
            .nics
            .iter()
            .filter_map(|nic| nic.dhcp.as_deref())
            .filter(|addr| addr.parse::<IpAddr>().is_ok())
            .map(str::to_string)
            .collect();
        md.tags = server.tags.iter().cloned().collect();
        md.user_metadata = server.user_metadata.clone();
        md
    }

    fn to_hardware(&self, hardware: &Hardware) -> Hardware {
        hardware.clone()
    }

    fn to_image(&self, drive: &StandardDrive) -> Image {
        Image {
            id: drive.uuid.clone(),
            name: drive.name.clone(),
            os: OperatingSystem::from_description(&drive.name),
            description: drive.name.clone(),
            location: Some(self.location.clone()),
            status: ImageStatus::Available,
            default_credentials: Some(LoginCredentials {
                user: DEFAULT_LOGIN_USER.to_string(),
                ..Default::default()
            }),
        }
    }

    fn to_location(&self, location: &Location) -> Location {
        location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compute::TemplateOptions;
    use crate::domain::credentials::Credentials;
    use httpmock::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(node_status(ServerStatus::Active), NodeStatus::Running);
        assert_eq!(node_status(ServerStatus::Stopped), NodeStatus::Suspended);
        assert_eq!(node_status(ServerStatus::Paused), NodeStatus::Suspended);
        assert_eq!(node_status(ServerStatus::Dumped), NodeStatus::Terminated);
        assert_eq!(node_status(ServerStatus::Dead), NodeStatus::Terminated);
        assert_eq!(node_status(ServerStatus::Unrecognized), NodeStatus::Unrecognized);
    }

    #[test]
    fn test_hardware_id_round_trip() {
        assert_eq!(hardware_id(5000, 4096, 50), "cpu=5000,ram=4096,disk=50");
        assert_eq!(parse_hardware_id("cpu=5000,ram=4096,disk=50").unwrap(), (5000, 4096, 50));
        assert!(parse_hardware_id("cpu=5000,ram=4096").is_err());
        assert!(parse_hardware_id("small").is_err());
    }

    #[tokio::test]
    async fn test_hardware_cross_product() {
        let client = ElasticStackClient::new(
            "https://api-lon-p.elastichosts.com",
            crate::domain::credentials::Credentials::new("user", "key"),
        )
        .unwrap();
        let adapter = ElasticStackComputeServiceAdapter::new(client, Location::provider("elastichosts-lon-p"), vec![]);
        let profiles = adapter.list_hardware_profiles().await.unwrap();
        assert_eq!(profiles.len(), 20);

        let biggest = profiles.iter().find(|h| h.id == "cpu=20000,ram=32768,disk=200").unwrap();
        assert_eq!(biggest.total_disk_gb(), 200.0);
        assert_eq!(biggest.total_speed(), 20.0);
        assert_eq!(biggest.ram_mb, 32768);
    }

    #[tokio::test]
    async fn test_failed_server_creation_destroys_drive() {
        let server = MockServer::start();
        let drive_uuid = "0012e70c-2e3b-4ed7-b1d6-2c4ba5a7ac53";
        let image_uuid = "38df0986-4d85-4b76-b502-3878ffc80161";
        let drive_info = format!("drive {}\nname web-001\nsize 1073741824\nstatus active\n", drive_uuid);
        server.mock(|when, then| {
            when.method(POST).path("/drives/create");
            then.status(200).body(drive_info.clone());
        });
        server.mock(|when, then| {
            when.method(POST).path(format!("/drives/{}/image/{}", drive_uuid, image_uuid));
            then.status(204);
        });
        server.mock(|when, then| {
            when.method(GET).path(format!("/drives/{}/info", drive_uuid));
            then.status(200).body(drive_info.clone());
        });
        let create = server.mock(|when, then| {
            when.method(POST).path("/servers/create");
            then.status(500).body("error system Out of capacity");
        });
        let destroy = server.mock(|when, then| {
            when.method(POST).path(format!("/drives/{}/destroy", drive_uuid));
            then.status(204);
        });

        let client = ElasticStackClient::new(&server.base_url(), Credentials::new("foo", "bar")).unwrap();
        let adapter = ElasticStackComputeServiceAdapter::new(client, Location::provider("elastichosts-lon-p"), vec![])
            .with_imaging_policy(RetryPolicy::new(
                Duration::from_secs(1),
                Duration::from_millis(10),
                Duration::from_millis(10),
            ));
        let template = Template {
            hardware: hardware(1000, 512, 1, None),
            image: Image {
                id: image_uuid.to_string(),
                name: "Ubuntu 22.04".to_string(),
                os: OperatingSystem::from_description("Ubuntu 22.04"),
                description: "Ubuntu 22.04".to_string(),
                location: None,
                status: ImageStatus::Available,
                default_credentials: None,
            },
            location: Location::provider("elastichosts-lon-p"),
            options: TemplateOptions::default(),
        };

        let err = adapter
            .create_node_with_group_encoded_into_name("web", "web-001", &template)
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        create.assert();
        destroy.assert();
    }
}
