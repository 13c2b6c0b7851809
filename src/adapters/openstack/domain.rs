use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub tenant: Option<Tenant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "publicURL")]
    pub public_url: String,
    #[serde(default, rename = "internalURL")]
    pub internal_url: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// A Keystone v2.0 authentication result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub token: Token,
    #[serde(default)]
    pub service_catalog: Vec<Service>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Access {
    pub fn endpoints<'a>(&'a self, service_type: &'a str) -> impl Iterator<Item = &'a Endpoint> + 'a {
        self.service_catalog
            .iter()
            .filter(move |s| s.service_type == service_type)
            .flat_map(|s| s.endpoints.iter())
    }

    /// The endpoint in `region`, or the first one when no region is asked for.
    pub fn endpoint(&self, service_type: &str, region: Option<&str>) -> Option<&Endpoint> {
        self.service_catalog
            .iter()
            .filter(|s| s.service_type == service_type)
            .flat_map(|s| s.endpoints.iter())
            .find(|e| match region {
                Some(region) => e.region.as_deref() == Some(region),
                None => true,
            })
    }

    /// Distinct regions offering `service_type`, in catalog order.
    pub fn regions(&self, service_type: &str) -> Vec<String> {
        let mut regions: Vec<String> = Vec::new();
        for region in self.endpoints(service_type).filter_map(|e| e.region.clone()) {
            if !regions.contains(&region) {
                regions.push(region);
            }
        }
        regions
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessResponse {
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// A reference to another resource, as embedded in a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub addr: String,
    #[serde(default = "default_ip_version")]
    pub version: u8,
}

fn default_ip_version() -> u8 {
    4
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Active,
    Build,
    Rebuild,
    Suspended,
    Paused,
    Shutoff,
    Stopped,
    Resize,
    VerifyResize,
    Reboot,
    HardReboot,
    Password,
    Migrating,
    Deleted,
    Error,
    Unrecognized,
}

impl ServerStatus {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ACTIVE" => ServerStatus::Active,
            "BUILD" => ServerStatus::Build,
            "REBUILD" => ServerStatus::Rebuild,
            "SUSPENDED" => ServerStatus::Suspended,
            "PAUSED" => ServerStatus::Paused,
            "SHUTOFF" => ServerStatus::Shutoff,
            "STOPPED" => ServerStatus::Stopped,
            "RESIZE" => ServerStatus::Resize,
            "VERIFY_RESIZE" => ServerStatus::VerifyResize,
            "REBOOT" => ServerStatus::Reboot,
            "HARD_REBOOT" => ServerStatus::HardReboot,
            "PASSWORD" => ServerStatus::Password,
            "MIGRATING" => ServerStatus::Migrating,
            "DELETED" => ServerStatus::Deleted,
            "ERROR" => ServerStatus::Error,
            _ => ServerStatus::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Active => "ACTIVE",
            ServerStatus::Build => "BUILD",
            ServerStatus::Rebuild => "REBUILD",
            ServerStatus::Suspended => "SUSPENDED",
            ServerStatus::Paused => "PAUSED",
            ServerStatus::Shutoff => "SHUTOFF",
            ServerStatus::Stopped => "STOPPED",
            ServerStatus::Resize => "RESIZE",
            ServerStatus::VerifyResize => "VERIFY_RESIZE",
            ServerStatus::Reboot => "REBOOT",
            ServerStatus::HardReboot => "HARD_REBOOT",
            ServerStatus::Password => "PASSWORD",
            ServerStatus::Migrating => "MIGRATING",
            ServerStatus::Deleted => "DELETED",
            ServerStatus::Error => "ERROR",
            ServerStatus::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServerStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(ServerStatus::parse(&value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub status: ServerStatus,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "hostId")]
    pub host_id: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image: Option<Resource>,
    #[serde(default)]
    pub flavor: Option<Resource>,
    /// Network label to the addresses on it.
    #[serde(default)]
    pub addresses: BTreeMap<String, Vec<Address>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, rename = "accessIPv4")]
    pub access_ipv4: Option<String>,
    #[serde(default, rename = "accessIPv6")]
    pub access_ipv6: Option<String>,
    #[serde(default, rename = "OS-EXT-AZ:availability_zone")]
    pub availability_zone: Option<String>,
}

impl Server {
    /// Every address on every network plus the access IPs, without duplicates.
    pub fn all_addresses(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        let access = self.access_ipv4.iter().chain(self.access_ipv6.iter());
        for addr in self
            .addresses
            .values()
            .flat_map(|list| list.iter().map(|a| &a.addr))
            .chain(access)
        {
            if !addr.is_empty() && !all.contains(addr) {
                all.push(addr.clone());
            }
        }
        all
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    pub id: String,
    pub name: String,
    pub ram: u32,
    #[serde(default)]
    pub disk: u32,
    pub vcpus: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovaImage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServerOptions {
    pub name: String,
    pub image_ref: String,
    pub flavor_ref: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_pass: Option<String>,
}

/// What Nova answers to a create: the id and the generated root password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCreated {
    pub id: String,
    #[serde(default)]
    pub admin_pass: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootType {
    Hard,
    Soft,
}

impl RebootType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebootType::Hard => "HARD",
            RebootType::Soft => "SOFT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS: &str = r#"{
        "access": {
            "token": {
                "id": "Aso0YV0xAm0AfbuRVJiyNXoJ",
                "expires": "2012-04-28T12:42:50.000-05:00",
                "tenant": {"id": "3456", "name": "demo"}
            },
            "serviceCatalog": [
                {"name": "Compute", "type": "compute", "endpoints": [
                    {"tenantId": "3456", "publicURL": "https://az-1.compute.example.com/v2/3456",
                     "region": "az-1.region-a.geo-1", "versionId": "2"},
                    {"tenantId": "3456", "publicURL": "https://az-2.compute.example.com/v2/3456",
                     "region": "az-2.region-a.geo-1", "versionId": "2"}
                ]},
                {"name": "Object Storage", "type": "object-store", "endpoints": [
                    {"publicURL": "https://objects.example.com/v1/3456", "region": "region-a.geo-1"}
                ]}
            ],
            "user": {"id": "1000", "name": "demo", "roles": [{"name": "member"}]}
        }
    }"#;

    #[test]
    fn test_parse_access_and_catalog() {
        let access = serde_json::from_str::<AccessResponse>(ACCESS).unwrap().access;
        assert_eq!(access.token.id, "Aso0YV0xAm0AfbuRVJiyNXoJ");
        assert_eq!(access.token.expires.to_rfc3339(), "2012-04-28T17:42:50+00:00");
        assert_eq!(access.token.tenant.as_ref().unwrap().id, "3456");
        assert_eq!(
            access.regions("compute"),
            vec!["az-1.region-a.geo-1", "az-2.region-a.geo-1"]
        );
        assert_eq!(
            access.endpoint("compute", Some("az-2.region-a.geo-1")).unwrap().public_url,
            "https://az-2.compute.example.com/v2/3456"
        );
        assert_eq!(
            access.endpoint("compute", None).unwrap().public_url,
            "https://az-1.compute.example.com/v2/3456"
        );
        assert!(access.endpoint("compute", Some("nowhere")).is_none());
        assert!(access.endpoint("volume", None).is_none());
    }

    #[test]
    fn test_parse_server() {
        let server: Server = serde_json::from_str(
            r#"{
                "id": "71752", "name": "web-1a2", "status": "VERIFY_RESIZE",
                "tenant_id": "3456", "hostId": "e4d9",
                "created": "2012-03-19T06:21:13Z",
                "image": {"id": "1241", "links": []},
                "flavor": {"id": "100"},
                "addresses": {"private": [{"addr": "10.4.4.4", "version": 4}, {"addr": "67.23.10.132"}]},
                "accessIPv4": "67.23.10.132",
                "metadata": {"Server Label": "Web Head 1"}
            }"#,
        )
        .unwrap();
        assert_eq!(server.status, ServerStatus::VerifyResize);
        assert_eq!(server.flavor.unwrap().id, "100");
        assert_eq!(server.addresses["private"][1].version, 4);
        assert_eq!(server.metadata["Server Label"], "Web Head 1");
        assert_eq!(server.host_id.as_deref(), Some("e4d9"));

        let unknown = ServerStatus::parse("SHELVED");
        assert_eq!(unknown, ServerStatus::Unrecognized);
    }

    #[test]
    fn test_all_addresses_dedupes_access_ip() {
        let server: Server = serde_json::from_str(
            r#"{"id": "1", "name": "a", "status": "ACTIVE",
                "addresses": {"public": [{"addr": "67.23.10.132"}], "private": [{"addr": "10.4.4.4"}]},
                "accessIPv4": "67.23.10.132", "accessIPv6": ""}"#,
        )
        .unwrap();
        assert_eq!(server.all_addresses(), vec!["10.4.4.4", "67.23.10.132"]);
    }

    #[test]
    fn test_create_options_body() {
        let options = CreateServerOptions {
            name: "web-1a2".into(),
            image_ref: "1241".into(),
            flavor_ref: "100".into(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&options).unwrap(),
            r#"{"name":"web-1a2","imageRef":"1241","flavorRef":"100"}"#
        );
    }
}
