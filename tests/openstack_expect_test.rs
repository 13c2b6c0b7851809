use httpmock::prelude::*;
use polycloud::adapters::openstack::domain::{CreateServerOptions, ServerStatus};
use polycloud::adapters::openstack::{NovaClient, NovaComputeServiceAdapter};
use polycloud::config::{ComputeConfig, KeystoneConfig};
use polycloud::domain::compute::NodeStatus;
use polycloud::domain::credentials::Credentials;
use polycloud::{AdapterComputeService, CloudError, ComputeService};
use serde_json::json;

const TOKEN: &str = "Auth_4f173437e4b013bee56d1007";

fn access(server: &MockServer) -> serde_json::Value {
    json!({
        "access": {
            "token": {
                "id": TOKEN,
                "expires": "2099-04-28T17:42:50Z",
                "tenant": { "id": "3456", "name": "demo" }
            },
            "serviceCatalog": [{
                "type": "compute",
                "name": "nova",
                "endpoints": [{
                    "region": "RegionOne",
                    "publicURL": server.url("/v1.1/3456"),
                    "tenantId": "3456",
                    "versionId": "1.1"
                }, {
                    "region": "RegionTwo",
                    "publicURL": server.url("/other/3456")
                }]
            }],
            "user": { "id": "alice", "name": "alice", "roles": [{ "name": "Member" }] }
        }
    })
}

fn keystone_mock(server: &MockServer) -> httpmock::Mock<'_> {
    let body = access(server);
    server.mock(|when, then| {
        when.method(POST)
            .path("/v2.0/tokens")
            .json_body(json!({
                "auth": {
                    "passwordCredentials": { "username": "alice", "password": "secret" },
                    "tenantName": "demo"
                }
            }));
        then.status(200).json_body(body);
    })
}

fn client(server: &MockServer, region: Option<&str>) -> NovaClient {
    NovaClient::new(
        &server.url("/v2.0"),
        Credentials::new("demo:alice", "secret"),
        &KeystoneConfig::default(),
        region.map(str::to_string),
    )
    .unwrap()
}

fn server_json(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "web-1a2",
        "status": status,
        "tenant_id": "3456",
        "hostId": "e4d909c290d0fb1ca068ffaddf22cbd0",
        "image": { "id": "1241" },
        "flavor": { "id": "100" },
        "addresses": {
            "public": [{ "addr": "67.23.10.132", "version": 4 }],
            "private": [{ "addr": "10.176.42.16", "version": 4 }]
        },
        "metadata": { "Server Label": "Web Head 1" },
        "OS-EXT-AZ:availability_zone": "nova"
    })
}

#[tokio::test]
async fn test_token_is_reused_across_calls() {
    let server = MockServer::start();
    let auth = keystone_mock(&server);
    let servers = server.mock(|when, then| {
        when.method(GET)
            .path("/v1.1/3456/servers/detail")
            .header("x-auth-token", TOKEN)
            .header("accept", "application/json");
        then.status(200)
            .json_body(json!({ "servers": [server_json("52415800-8b69-11e0-9b19-734f6af67565", "ACTIVE")] }));
    });
    let flavors = server.mock(|when, then| {
        when.method(GET).path("/v1.1/3456/flavors/detail");
        then.status(200).json_body(json!({
            "flavors": [{ "id": "100", "name": "256 MB Server", "ram": 256, "disk": 10, "vcpus": 1 }]
        }));
    });

    let client = client(&server, None);
    let listed = client.list_servers().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, ServerStatus::Active);
    assert_eq!(client.list_flavors().await.unwrap()[0].ram, 256);
    assert_eq!(client.regions().await.unwrap(), vec!["RegionOne", "RegionTwo"]);
    auth.assert_hits(1);
    servers.assert();
    flavors.assert();
}

#[tokio::test]
async fn test_region_selects_catalog_endpoint() {
    let server = MockServer::start();
    keystone_mock(&server);
    let images = server.mock(|when, then| {
        when.method(GET).path("/other/3456/images/detail");
        then.status(200).json_body(json!({
            "images": [{ "id": "1241", "name": "Ubuntu 12.04 LTS", "status": "ACTIVE" }]
        }));
    });

    let images_listed = client(&server, Some("RegionTwo")).list_images().await.unwrap();
    images.assert();
    assert_eq!(images_listed[0].name, "Ubuntu 12.04 LTS");
}

#[tokio::test]
async fn test_unknown_region_is_illegal_state() {
    let server = MockServer::start();
    keystone_mock(&server);

    let err = client(&server, Some("Mars")).list_servers().await.unwrap_err();
    assert!(matches!(err, CloudError::IllegalState { .. }));
}

#[tokio::test]
async fn test_rejected_token_authenticates_once_more() {
    let server = MockServer::start();
    let auth = keystone_mock(&server);
    let servers = server.mock(|when, then| {
        when.method(GET).path("/v1.1/3456/servers/detail");
        then.status(401).body("This server could not verify that you are authorized");
    });

    let err = client(&server, None).list_servers().await.unwrap_err();
    assert!(matches!(err, CloudError::Unauthorized { .. }));
    auth.assert_hits(2);
    servers.assert_hits(2);
}

#[tokio::test]
async fn test_create_server_returns_admin_pass() {
    let server = MockServer::start();
    keystone_mock(&server);
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/v1.1/3456/servers")
            .header("x-auth-token", TOKEN)
            .json_body(json!({ "server": { "name": "web-1a2", "imageRef": "1241", "flavorRef": "100" } }));
        then.status(202).json_body(json!({
            "server": {
                "id": "71752",
                "adminPass": "GFf1j9aP",
                "links": [{ "rel": "self", "href": "http://servers.api.openstack.org/v1.1/3456/servers/71752" }]
            }
        }));
    });

    let options = CreateServerOptions {
        name: "web-1a2".to_string(),
        image_ref: "1241".to_string(),
        flavor_ref: "100".to_string(),
        ..Default::default()
    };
    let created = client(&server, None).create_server(&options).await.unwrap();
    create.assert();
    assert_eq!(created.id, "71752");
    assert_eq!(created.admin_pass.as_deref(), Some("GFf1j9aP"));
}

#[tokio::test]
async fn test_delete_and_get_missing_server() {
    let server = MockServer::start();
    keystone_mock(&server);
    server.mock(|when, then| {
        when.method(DELETE).path("/v1.1/3456/servers/71752");
        then.status(404).json_body(json!({ "itemNotFound": { "message": "Instance could not be found", "code": 404 } }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1.1/3456/servers/71752");
        then.status(404);
    });

    let client = client(&server, None);
    assert!(!client.delete_server("71752").await.unwrap());
    assert!(client.get_server("71752").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reboot_is_hard() {
    let server = MockServer::start();
    keystone_mock(&server);
    let reboot = server.mock(|when, then| {
        when.method(POST)
            .path("/v1.1/3456/servers/71752/action")
            .json_body(json!({ "reboot": { "type": "HARD" } }));
        then.status(202);
    });

    let service = AdapterComputeService::new(
        NovaComputeServiceAdapter::new(client(&server, None)),
        ComputeConfig::default(),
    );
    service.reboot_node("71752").await.unwrap();
    reboot.assert();
}

#[tokio::test]
async fn test_nodes_split_public_and_private_addresses() {
    let server = MockServer::start();
    keystone_mock(&server);
    server.mock(|when, then| {
        when.method(GET).path("/v1.1/3456/servers/detail");
        then.status(200).json_body(json!({ "servers": [server_json("71752", "BUILD")] }));
    });

    let service = AdapterComputeService::new(
        NovaComputeServiceAdapter::new(client(&server, None)),
        ComputeConfig::default(),
    );
    let nodes = service.list_nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].status, NodeStatus::Pending);
    assert_eq!(nodes[0].public_addresses, vec!["67.23.10.132"]);
    assert_eq!(nodes[0].private_addresses, vec!["10.176.42.16"]);
    assert_eq!(nodes[0].location.as_ref().map(|l| l.id.as_str()), Some("nova"));
}
