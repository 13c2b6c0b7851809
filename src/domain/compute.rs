use crate::domain::credentials::LoginCredentials;
use crate::domain::location::Location;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+(?:\.\d+)*)\b").expect("static version pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Ubuntu,
    Debian,
    Centos,
    Rhel,
    Fedora,
    Suse,
    CloudLinux,
    Windows,
    Unrecognized,
}

impl OsFamily {
    const KEYWORDS: [(&'static str, OsFamily); 9] = [
        ("ubuntu", OsFamily::Ubuntu),
        ("debian", OsFamily::Debian),
        ("centos", OsFamily::Centos),
        ("red hat", OsFamily::Rhel),
        ("rhel", OsFamily::Rhel),
        ("fedora", OsFamily::Fedora),
        ("suse", OsFamily::Suse),
        ("cloudlinux", OsFamily::CloudLinux),
        ("windows", OsFamily::Windows),
    ];

    /// Case-insensitive keyword search over a free-form description.
    pub fn from_description(description: &str) -> OsFamily {
        let lower = description.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
            .map(|(_, family)| *family)
            .unwrap_or(OsFamily::Unrecognized)
    }

    pub fn parse(value: &str) -> OsFamily {
        match value.to_lowercase().as_str() {
            "ubuntu" => OsFamily::Ubuntu,
            "debian" => OsFamily::Debian,
            "centos" => OsFamily::Centos,
            "rhel" => OsFamily::Rhel,
            "fedora" => OsFamily::Fedora,
            "suse" => OsFamily::Suse,
            "cloudlinux" => OsFamily::CloudLinux,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Unrecognized,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsFamily::Ubuntu => "ubuntu",
            OsFamily::Debian => "debian",
            OsFamily::Centos => "centos",
            OsFamily::Rhel => "rhel",
            OsFamily::Fedora => "fedora",
            OsFamily::Suse => "suse",
            OsFamily::CloudLinux => "cloudlinux",
            OsFamily::Windows => "windows",
            OsFamily::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub family: OsFamily,
    pub version: Option<String>,
    pub arch: Option<String>,
    pub description: String,
    pub is_64bit: bool,
}

impl OperatingSystem {
    /// Best-effort parse of an image name such as "Ubuntu 12.04 LTS Server 64-bit".
    pub fn from_description(description: &str) -> Self {
        let lower = description.to_lowercase();
        Self {
            family: OsFamily::from_description(description),
            version: first_version(description),
            arch: None,
            description: description.to_string(),
            is_64bit: lower.contains("64") && !lower.contains("32"),
        }
    }
}

impl Default for OperatingSystem {
    fn default() -> Self {
        Self {
            family: OsFamily::Unrecognized,
            version: None,
            arch: None,
            description: String::new(),
            is_64bit: true,
        }
    }
}

/// First dotted number in `text`, e.g. "12.04" out of "Ubuntu 12.04 LTS".
pub fn first_version(text: &str) -> Option<String> {
    VERSION_PATTERN
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Numeric, segment-wise version ordering: "10.04" > "9.10", "7" < "7.1".
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Available,
    Pending,
    Deleted,
    Error,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub os: OperatingSystem,
    pub description: String,
    pub location: Option<Location>,
    pub status: ImageStatus,
    pub default_credentials: Option<LoginCredentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub cores: f64,
    /// GHz per core
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeType {
    Local,
    San,
    Nas,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: Option<String>,
    pub kind: VolumeType,
    pub size_gb: Option<f32>,
    pub device: Option<String>,
    pub boot_device: bool,
    pub durable: bool,
}

impl Volume {
    pub fn local(size_gb: f32, boot_device: bool) -> Self {
        Self {
            id: None,
            kind: VolumeType::Local,
            size_gb: Some(size_gb),
            device: None,
            boot_device,
            durable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hardware {
    pub id: String,
    pub name: String,
    pub processors: Vec<Processor>,
    pub ram_mb: u32,
    pub volumes: Vec<Volume>,
    pub location: Option<Location>,
    pub hypervisor: Option<String>,
}

impl Hardware {
    pub fn total_cores(&self) -> f64 {
        self.processors.iter().map(|p| p.cores).sum()
    }

    /// Cores times speed; the "fastest" ordering key.
    pub fn total_speed(&self) -> f64 {
        self.processors.iter().map(|p| p.cores * p.speed).sum()
    }

    pub fn total_disk_gb(&self) -> f64 {
        self.volumes
            .iter()
            .filter_map(|v| v.size_gb)
            .map(f64::from)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Suspended,
    Terminated,
    Error,
    Unrecognized,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Running => "running",
            NodeStatus::Suspended => "suspended",
            NodeStatus::Terminated => "terminated",
            NodeStatus::Error => "error",
            NodeStatus::Unrecognized => "unrecognized",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub id: String,
    pub name: String,
    pub group: Option<String>,
    pub status: NodeStatus,
    pub backend_status: Option<String>,
    pub location: Option<Location>,
    pub hardware: Option<Hardware>,
    pub image_id: Option<String>,
    pub os: Option<OperatingSystem>,
    #[serde(default)]
    pub public_addresses: Vec<String>,
    #[serde(default)]
    pub private_addresses: Vec<String>,
    pub login_port: u16,
    pub credentials: Option<LoginCredentials>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
}

impl NodeMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: NodeStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            group: None,
            status,
            backend_status: None,
            location: None,
            hardware: None,
            image_id: None,
            os: None,
            public_addresses: Vec::new(),
            private_addresses: Vec::new(),
            login_port: 22,
            credentials: None,
            tags: BTreeSet::new(),
            user_metadata: BTreeMap::new(),
        }
    }
}

/// What an adapter hands back right after creating a node.
#[derive(Debug, Clone)]
pub struct NodeAndInitialCredentials<N> {
    pub node: N,
    pub node_id: String,
    pub credentials: Option<LoginCredentials>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOptions {
    #[serde(default)]
    pub inbound_ports: Vec<u16>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub login_user: Option<String>,
    pub login_password: Option<String>,
    pub login_private_key: Option<String>,
    pub block_until_running: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            inbound_ports: Vec::new(),
            user_metadata: BTreeMap::new(),
            tags: BTreeSet::new(),
            login_user: None,
            login_password: None,
            login_private_key: None,
            block_until_running: true,
        }
    }
}

impl TemplateOptions {
    pub fn inbound_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.inbound_ports = ports.into_iter().collect();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn user_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.insert(key.into(), value.into());
        self
    }

    pub fn login_password(mut self, password: impl Into<String>) -> Self {
        self.login_password = Some(password.into());
        self
    }

    pub fn block_until_running(mut self, block: bool) -> Self {
        self.block_until_running = block;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub hardware: Hardware,
    pub image: Image,
    pub location: Location,
    pub options: TemplateOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_family_from_description() {
        assert_eq!(OsFamily::from_description("Ubuntu 12.04 LTS"), OsFamily::Ubuntu);
        assert_eq!(OsFamily::from_description("Red Hat Enterprise Linux 6"), OsFamily::Rhel);
        assert_eq!(OsFamily::from_description("CentOS 7 (64 bit)"), OsFamily::Centos);
        assert_eq!(OsFamily::from_description("Plan 9"), OsFamily::Unrecognized);
    }

    #[test]
    fn test_operating_system_from_description() {
        let os = OperatingSystem::from_description("Ubuntu 12.04 LTS Server 64-bit");
        assert_eq!(os.family, OsFamily::Ubuntu);
        assert_eq!(os.version.as_deref(), Some("12.04"));
        assert!(os.is_64bit);

        let os = OperatingSystem::from_description("Debian 6.0 32-bit");
        assert!(!os.is_64bit);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("10.04", "9.10"), Ordering::Greater);
        assert_eq!(compare_versions("7", "7.1"), Ordering::Less);
        assert_eq!(compare_versions("22.04", "22.04"), Ordering::Equal);
    }

    #[test]
    fn test_hardware_totals() {
        let hardware = Hardware {
            id: "h".into(),
            name: "h".into(),
            processors: vec![
                Processor { cores: 2.0, speed: 2.0 },
                Processor { cores: 1.0, speed: 3.0 },
            ],
            ram_mb: 2048,
            volumes: vec![Volume::local(10.0, true), Volume::local(20.0, false)],
            location: None,
            hypervisor: None,
        };
        assert_eq!(hardware.total_cores(), 3.0);
        assert_eq!(hardware.total_speed(), 7.0);
        assert_eq!(hardware.total_disk_gb(), 30.0);
    }
}
