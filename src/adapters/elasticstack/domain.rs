use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Active,
    Stopped,
    Paused,
    Dumped,
    Dead,
    Unrecognized,
}

impl ServerStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => ServerStatus::Active,
            "stopped" => ServerStatus::Stopped,
            "paused" => ServerStatus::Paused,
            "dumped" => ServerStatus::Dumped,
            "dead" => ServerStatus::Dead,
            _ => ServerStatus::Unrecognized,
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerStatus::Active => "active",
            ServerStatus::Stopped => "stopped",
            ServerStatus::Paused => "paused",
            ServerStatus::Dumped => "dumped",
            ServerStatus::Dead => "dead",
            ServerStatus::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStatus {
    Active,
    Inaccessible,
    Unrecognized,
}

impl DriveStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => DriveStatus::Active,
            "inaccessible" => DriveStatus::Inaccessible,
            _ => DriveStatus::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimType {
    Exclusive,
    Shared,
}

impl ClaimType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exclusive" => Some(ClaimType::Exclusive),
            "shared" => Some(ClaimType::Shared),
            _ => None,
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimType::Exclusive => f.write_str("exclusive"),
            ClaimType::Shared => f.write_str("shared"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NicModel {
    #[default]
    E1000,
    Rtl8139,
    Virtio,
}

impl NicModel {
    pub fn parse(value: &str) -> Self {
        match value {
            "rtl8139" => NicModel::Rtl8139,
            "virtio" => NicModel::Virtio,
            _ => NicModel::E1000,
        }
    }
}

impl fmt::Display for NicModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NicModel::E1000 => f.write_str("e1000"),
            NicModel::Rtl8139 => f.write_str("rtl8139"),
            NicModel::Virtio => f.write_str("virtio"),
        }
    }
}

/// `nic:N:*` keys. `dhcp` is `auto` on requests and the leased address on replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nic {
    pub model: NicModel,
    pub dhcp: Option<String>,
    pub vlan: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vnc {
    pub ip: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
}

/// The writable part of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub name: String,
    /// MHz
    pub cpu: u32,
    /// `None` renders as `smp auto`.
    pub smp: Option<u32>,
    /// MB
    pub mem: u32,
    pub persistent: bool,
    /// Bus address such as `ide:0:0` to drive uuid.
    pub devices: BTreeMap<String, String>,
    pub boot_device_ids: Vec<String>,
    pub nics: Vec<Nic>,
    pub vnc: Vnc,
    pub tags: Vec<String>,
    pub user_metadata: BTreeMap<String, String>,
}

impl Server {
    pub fn new(name: impl Into<String>, cpu: u32, mem: u32) -> Self {
        Self {
            name: name.into(),
            cpu,
            smp: None,
            mem,
            persistent: true,
            devices: BTreeMap::new(),
            boot_device_ids: Vec::new(),
            nics: Vec::new(),
            vnc: Vnc::default(),
            tags: Vec::new(),
            user_metadata: BTreeMap::new(),
        }
    }

    /// Attaches `drive` on the first IDE slot and boots from it.
    pub fn boot_drive(mut self, drive: impl Into<String>) -> Self {
        self.devices.insert("ide:0:0".to_string(), drive.into());
        self.boot_device_ids = vec!["ide:0:0".to_string()];
        self
    }

    pub fn nic(mut self, nic: Nic) -> Self {
        self.nics.push(nic);
        self
    }

    pub fn vnc_password(mut self, password: impl Into<String>) -> Self {
        self.vnc = Vnc {
            ip: Some("auto".to_string()),
            password: Some(password.into()),
            tls: false,
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub uuid: String,
    pub server: Server,
    pub status: ServerStatus,
    pub started: Option<DateTime<Utc>>,
    pub user: Option<String>,
    pub tx_bytes: Option<u64>,
    pub rx_bytes: Option<u64>,
}

impl ServerInfo {
    pub fn drive_uuids(&self) -> impl Iterator<Item = &str> {
        self.server.devices.values().map(String::as_str)
    }
}

/// The writable part of a drive; also the body of `drives/create`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drive {
    pub name: String,
    /// Bytes
    pub size: u64,
    pub claim_type: Option<ClaimType>,
    pub readers: Vec<String>,
    pub tags: Vec<String>,
    pub uses: Vec<String>,
    pub user_metadata: BTreeMap<String, String>,
}

impl Drive {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            ..Default::default()
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriveInfo {
    pub uuid: String,
    pub drive: Drive,
    pub status: DriveStatus,
    pub user: Option<String>,
    pub claimed: Vec<String>,
    /// Progress such as `12%` while an image copy runs.
    pub imaging: Option<String>,
    pub drive_type: Option<String>,
}

impl DriveInfo {
    pub fn is_imaging(&self) -> bool {
        self.imaging.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageConversion {
    Gunzip,
}
