use chrono::{DateTime, TimeZone, Utc};
use httpmock::prelude::*;
use httpmock::Method::HEAD;
use polycloud::adapters::atmos::{AtmosBlobStore, AtmosClient, AtmosSigner};
use polycloud::domain::blob::{Blob, ByteRange, GetOptions, ListContainerOptions, StorageType};
use polycloud::domain::credentials::Credentials;
use polycloud::{BlobStore, CloudError};
use std::sync::atomic::{AtomicI64, Ordering};

const DATE: &str = "Thu, 05 Jun 2008 16:38:19 GMT";

fn fixed() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2008, 6, 5, 16, 38, 19).unwrap()
}

fn store(server: &MockServer) -> AtmosBlobStore {
    let credentials = Credentials::new("identity", "c2VjcmV0");
    let signer = AtmosSigner::new(&credentials).unwrap().with_clock(fixed);
    let client = AtmosClient::new(&server.base_url(), &credentials)
        .unwrap()
        .with_signer(signer);
    AtmosBlobStore::new(client)
}

fn listing(entries: &[(&str, &str)]) -> String {
    let body: String = entries
        .iter()
        .enumerate()
        .map(|(i, (kind, name))| {
            format!(
                "<DirectoryEntry><ObjectID>4980cdb2a411106a04a4538c92a1b204ad92077de6e{}</ObjectID>\
                 <FileType>{}</FileType><Filename>{}</Filename></DirectoryEntry>",
                i, kind, name
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListDirectoryResponse xmlns="http://www.emc.com/cos/"><DirectoryList>{}</DirectoryList></ListDirectoryResponse>"#,
        body
    )
}

#[tokio::test]
async fn test_list_containers_is_signed() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/namespace/")
            .header("accept", "text/xml")
            .header("date", DATE)
            .header("x-emc-date", DATE)
            .header("x-emc-uid", "identity")
            .header("x-emc-signature", "kTBtfDpNg517GMfi5CHh1W4cm+w=");
        then.status(200)
            .header("content-type", "text/xml")
            .body(listing(&[("directory", "photos"), ("regular", "stray"), ("directory", "docs")]));
    });

    let page = store(&server).list().await.unwrap();
    mock.assert();
    let names: Vec<_> = page.items.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["docs", "photos"]);
    assert!(page.items.iter().all(|c| c.kind == StorageType::Container));
}

#[tokio::test]
async fn test_create_container_reports_existing() {
    let server = MockServer::start();
    let created = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/namespace/photos/")
            .header("content-type", "application/octet-stream");
        then.status(201)
            .header("location", "/rest/objects/4980cdb2a411106a04a4538c92a1b204ad92077de6e3");
    });
    let exists = server.mock(|when, then| {
        when.method(POST).path("/rest/namespace/docs/");
        then.status(400)
            .body("<Error><Code>1016</Code><Message>The resource you are trying to create already exists.</Message></Error>");
    });

    let store = store(&server);
    assert!(store.create_container_in_location(None, "photos").await.unwrap());
    assert!(!store.create_container_in_location(None, "docs").await.unwrap());
    created.assert();
    exists.assert();
}

#[tokio::test]
async fn test_put_blob_sends_digest_and_metadata() {
    let server = MockServer::start();
    let container = server.mock(|when, then| {
        when.method(HEAD).path("/rest/namespace/photos/");
        then.status(200);
    });
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/namespace/photos/hello")
            .header("content-type", "text/plain")
            .header("content-md5", "XUFAKrxLKna5cZ2REBfFkg==")
            .header("x-emc-meta", "color=blue")
            .header_exists("x-emc-signature")
            .body("hello");
        then.status(201)
            .header("location", "/rest/objects/4980cdb2a411106a04a4538c92a1b204ad92077de6e4");
    });

    let blob = Blob::builder("hello")
        .payload("hello")
        .content_type("text/plain")
        .user_metadata([("Color", "blue")])
        .build();
    let etag = store(&server).put_blob("photos", blob).await.unwrap();
    container.assert();
    upload.assert();
    assert_eq!(etag, "5d41402abc4b2a76b9719d911017c592");
}

#[tokio::test]
async fn test_put_blob_into_missing_container() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(HEAD).path("/rest/namespace/nowhere/");
        then.status(404);
    });

    let blob = Blob::builder("hello").payload("hello").build();
    let err = store(&server).put_blob("nowhere", blob).await.unwrap_err();
    assert!(matches!(err, CloudError::ContainerNotFound { .. }));
}

#[tokio::test]
async fn test_get_blob_range_and_missing() {
    let server = MockServer::start();
    let ranged = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/namespace/photos/hello")
            .header("range", "bytes=0-1");
        then.status(206)
            .header("content-type", "text/plain")
            .header("x-emc-meta", "size=5, type=regular, mtime=2008-06-05T16:38:19Z, color=blue")
            .body("he");
    });
    let container = server.mock(|when, then| {
        when.method(HEAD).path("/rest/namespace/photos/");
        then.status(200);
    });
    let missing = server.mock(|when, then| {
        when.method(GET).path("/rest/namespace/photos/gone");
        then.status(404)
            .body("<Error><Code>1003</Code><Message>The requested object was not found.</Message></Error>");
    });

    let store = store(&server);
    let blob = store
        .get_blob("photos", "hello", &GetOptions::default().range(ByteRange::Between(0, 1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(blob.payload, b"he");
    assert_eq!(blob.metadata.user_metadata.get("color").map(String::as_str), Some("blue"));
    assert!(store
        .get_blob("photos", "gone", &GetOptions::default())
        .await
        .unwrap()
        .is_none());
    ranged.assert();
    missing.assert();
    container.assert();
}

#[tokio::test]
async fn test_list_container_one_level_with_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/rest/namespace/photos/")
            .header("x-emc-limit", "2");
        then.status(200)
            .header("x-emc-token", "8b0d8a0e-2b8f-4e2e-9c8c-0c4b3e1e6f01")
            .body(listing(&[("regular", "a.jpg"), ("directory", "2024")]));
    });

    let options = ListContainerOptions::default().max_results(2);
    let page = store(&server).list_container("photos", &options).await.unwrap();
    mock.assert();
    assert_eq!(page.next_marker.as_deref(), Some("8b0d8a0e-2b8f-4e2e-9c8c-0c4b3e1e6f01"));
    let entries: Vec<_> = page.items.iter().map(|e| (e.kind, e.name.as_str())).collect();
    assert!(entries.contains(&(StorageType::Blob, "a.jpg")));
    assert!(entries.contains(&(StorageType::RelativePath, "2024")));
}

static TICKS: AtomicI64 = AtomicI64::new(0);

/// One second later on every signed request.
fn ticking() -> DateTime<Utc> {
    fixed() + chrono::Duration::seconds(TICKS.fetch_add(1, Ordering::SeqCst))
}

#[tokio::test]
async fn test_put_blob_replaces_existing_file() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(HEAD).path("/rest/namespace/photos/");
        then.status(200);
    });
    let conflict = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/namespace/photos/hello")
            .header("x-emc-date", "Thu, 05 Jun 2008 16:38:20 GMT");
        then.status(400)
            .body("<Error><Code>1016</Code><Message>The resource you are trying to create already exists.</Message></Error>");
    });
    let removed = server.mock(|when, then| {
        when.method(DELETE)
            .path("/rest/namespace/photos/hello")
            .header("x-emc-date", "Thu, 05 Jun 2008 16:38:21 GMT");
        then.status(204);
    });
    let recreated = server.mock(|when, then| {
        when.method(POST)
            .path("/rest/namespace/photos/hello")
            .header("x-emc-date", "Thu, 05 Jun 2008 16:38:22 GMT")
            .body("hello");
        then.status(201)
            .header("location", "/rest/objects/4980cdb2a411106a04a4538c92a1b204ad92077de6e5");
    });

    let credentials = Credentials::new("identity", "c2VjcmV0");
    let signer = AtmosSigner::new(&credentials).unwrap().with_clock(ticking);
    let client = AtmosClient::new(&server.base_url(), &credentials)
        .unwrap()
        .with_signer(signer);
    let blob = Blob::builder("hello").payload("hello").build();
    let etag = AtmosBlobStore::new(client).put_blob("photos", blob).await.unwrap();

    conflict.assert();
    removed.assert();
    recreated.assert();
    assert_eq!(etag, "5d41402abc4b2a76b9719d911017c592");
}

#[tokio::test]
async fn test_detailed_listing_reads_each_blob() {
    let server = MockServer::start();
    let list = server.mock(|when, then| {
        when.method(GET).path("/rest/namespace/photos/");
        then.status(200)
            .body(listing(&[("regular", "a.jpg"), ("directory", "2024")]));
    });
    let head = server.mock(|when, then| {
        when.method(HEAD).path("/rest/namespace/photos/a.jpg");
        then.status(200)
            .header("content-type", "image/jpeg")
            .header("content-md5", "XUFAKrxLKna5cZ2REBfFkg==")
            .header("x-emc-meta", "size=5, type=regular, mtime=2008-06-05T16:38:19Z, color=blue");
    });

    let options = ListContainerOptions::default().with_details();
    let page = store(&server).list_container("photos", &options).await.unwrap();
    list.assert();
    head.assert();

    let blob = page.items.iter().find(|i| i.name == "a.jpg").unwrap();
    assert_eq!(blob.etag.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
    assert_eq!(blob.size, Some(5));
    assert_eq!(blob.user_metadata.get("color").map(String::as_str), Some("blue"));
    let dir = page.items.iter().find(|i| i.name == "2024").unwrap();
    assert_eq!(dir.kind, StorageType::RelativePath);
}

#[tokio::test]
async fn test_reserved_characters_stay_in_the_path() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(HEAD).path("/rest/namespace/c/");
        then.status(200);
    });
    let upload = server.mock(|when, then| {
        when.method(POST).path("/rest/namespace/c/report%231.txt");
        then.status(201);
    });
    let truncated = server.mock(|when, then| {
        when.method(POST).path("/rest/namespace/c/report");
        then.status(201);
    });

    let blob = Blob::builder("report#1.txt").payload("q1").build();
    store(&server).put_blob("c", blob).await.unwrap();
    upload.assert();
    truncated.assert_hits(0);
}

#[tokio::test]
async fn test_lookups_in_missing_container_fail() {
    let server = MockServer::start();
    let store = store(&server);

    let err = store.get_blob("nope", "a.txt", &GetOptions::default()).await.unwrap_err();
    assert!(matches!(err, CloudError::ContainerNotFound { .. }));
    let err = store.blob_exists("nope", "a.txt").await.unwrap_err();
    assert!(matches!(err, CloudError::ContainerNotFound { .. }));
    let err = store.blob_metadata("nope", "a.txt").await.unwrap_err();
    assert!(matches!(err, CloudError::ContainerNotFound { .. }));
    let err = store.directory_exists("nope", "docs").await.unwrap_err();
    assert!(matches!(err, CloudError::ContainerNotFound { .. }));
}
