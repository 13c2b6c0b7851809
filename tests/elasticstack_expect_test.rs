use httpmock::prelude::*;
use polycloud::adapters::elasticstack::domain::{Drive, DriveStatus, Nic, Server, ServerStatus};
use polycloud::adapters::elasticstack::ElasticStackClient;
use polycloud::domain::credentials::Credentials;
use polycloud::CloudError;

const AUTH: &str = "Basic Zm9vOmJhcg==";
const SERVER_UUID: &str = "f8bee9cd-8e4b-4a05-8593-1314e3bfe49b";
const DRIVE_UUID: &str = "0012e70c-2e3b-4ed7-b1d6-2c4ba5a7ac53";

fn client(server: &MockServer) -> ElasticStackClient {
    ElasticStackClient::new(&server.base_url(), Credentials::new("foo", "bar")).unwrap()
}

fn server_info(uuid: &str, name: &str, status: &str) -> String {
    format!(
        "server {}\nname {}\ncpu 2000\nsmp auto\nmem 1024\npersistent true\nstatus {}\n\
         ide:0:0 {}\nboot ide:0:0\nnic:0:model e1000\nnic:0:dhcp 46.20.114.124\n\
         vnc:ip 46.20.114.124\nvnc:password XXXXXXXX\n",
        uuid, name, status, DRIVE_UUID
    )
}

#[tokio::test]
async fn test_list_server_info_parses_every_record() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/servers/info")
            .header("authorization", AUTH)
            .header("accept", "text/plain");
        then.status(200).body(format!(
            "{}\n{}",
            server_info(SERVER_UUID, "web-1", "active"),
            server_info("a3dc5f8d-6c0a-4d6f-8e25-6a0c1c4ae57d", "web-2", "stopped")
        ));
    });

    let servers = client(&server).list_server_info().await.unwrap();
    mock.assert();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].uuid, SERVER_UUID);
    assert_eq!(servers[0].status, ServerStatus::Active);
    assert_eq!(servers[0].server.smp, None);
    assert_eq!(servers[0].drive_uuids().collect::<Vec<_>>(), vec![DRIVE_UUID]);
    assert_eq!(servers[1].server.name, "web-2");
    assert_eq!(servers[1].status, ServerStatus::Stopped);
}

#[tokio::test]
async fn test_list_servers_is_one_uuid_per_line() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/servers/list");
        then.status(200).body(format!("{}\n\n", SERVER_UUID));
    });

    assert_eq!(client(&server).list_servers().await.unwrap(), vec![SERVER_UUID]);
}

#[tokio::test]
async fn test_get_missing_server_is_none() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path(format!("/servers/{}/info", SERVER_UUID));
        then.status(404).body("error notfound Server not found");
    });

    assert!(client(&server).get_server_info(SERVER_UUID).await.unwrap().is_none());
    mock.assert();
}

#[tokio::test]
async fn test_create_stopped_server_sends_plain_text() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/servers/create/stopped")
            .header("content-type", "text/plain")
            .body(format!(
                "name TestServer\ncpu 2000\nsmp auto\nmem 1024\npersistent true\nide:0:0 {}\n\
                 boot ide:0:0\nnic:0:model e1000\nnic:0:dhcp auto\nvnc:ip auto\nvnc:password XXXXXXXX",
                DRIVE_UUID
            ));
        then.status(200)
            .body(server_info(SERVER_UUID, "TestServer", "stopped"));
    });

    let nic = Nic {
        dhcp: Some("auto".to_string()),
        ..Default::default()
    };
    let request = Server::new("TestServer", 2000, 1024)
        .boot_drive(DRIVE_UUID)
        .nic(nic)
        .vnc_password("XXXXXXXX");
    let info = client(&server).create_server(&request).await.unwrap();
    mock.assert();
    assert_eq!(info.uuid, SERVER_UUID);
    assert_eq!(info.status, ServerStatus::Stopped);
}

#[tokio::test]
async fn test_create_drive_and_destroy() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/drives/create")
            .header("authorization", AUTH)
            .body("name foo\nsize 10000\ntags web");
        then.status(200).body(format!(
            "drive {}\nname foo\nsize 10000\nstatus active\ntags web\nuser 2f6244eb-50bc-4403-847e-f03cc3706a1f\n",
            DRIVE_UUID
        ));
    });
    let destroy = server.mock(|when, then| {
        when.method(POST).path(format!("/drives/{}/destroy", DRIVE_UUID));
        then.status(204);
    });

    let client = client(&server);
    let info = client.create_drive(&Drive::new("foo", 10000).tags(["web"])).await.unwrap();
    assert_eq!(info.uuid, DRIVE_UUID);
    assert_eq!(info.status, DriveStatus::Active);
    assert_eq!(info.drive.tags, vec!["web"]);
    client.destroy_drive(DRIVE_UUID).await.unwrap();
    create.assert();
    destroy.assert();
}

#[tokio::test]
async fn test_image_drive_with_gunzip() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/drives/{}/image/{}/gunzip", DRIVE_UUID, "38df0986-4d85-4b76-b502-3878ffc80161"));
        then.status(204);
    });

    client(&server)
        .image_drive_with_conversion(
            "38df0986-4d85-4b76-b502-3878ffc80161",
            DRIVE_UUID,
            Some(polycloud::adapters::elasticstack::domain::ImageConversion::Gunzip),
        )
        .await
        .unwrap();
    mock.assert();
}

#[tokio::test]
async fn test_bad_credentials_are_unauthorized() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/drives/info");
        then.status(401).body("error auth Unauthorized");
    });

    let err = client(&server).list_drive_info().await.unwrap_err();
    assert!(matches!(err, CloudError::Unauthorized { .. }));
}
