//! Response bodies and the `x-emc-meta` header format.

use super::domain::{DirectoryEntry, FileType, SystemMetadata, UserMetadata};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct ListDirectoryResponse {
    #[serde(rename = "DirectoryList", default)]
    directory_list: DirectoryList,
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryList {
    #[serde(rename = "DirectoryEntry", default)]
    entries: Vec<DirectoryEntryXml>,
}

#[derive(Debug, Deserialize)]
struct DirectoryEntryXml {
    #[serde(rename = "ObjectID")]
    object_id: String,
    #[serde(rename = "FileType")]
    file_type: String,
    #[serde(rename = "Filename")]
    filename: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorXml {
    #[serde(rename = "Code")]
    pub code: u32,
    #[serde(rename = "Message", default)]
    pub message: String,
}

pub fn parse_directory_listing(body: &str) -> Result<Vec<DirectoryEntry>> {
    let response: ListDirectoryResponse = quick_xml::de::from_str(body)?;
    Ok(response
        .directory_list
        .entries
        .into_iter()
        .map(|e| DirectoryEntry {
            object_id: e.object_id,
            file_type: FileType::parse(&e.file_type),
            object_name: e.filename,
        })
        .collect())
}

pub fn parse_error(body: &str) -> Option<ErrorXml> {
    quick_xml::de::from_str(body).ok()
}

const SYSTEM_KEYS: [&str; 12] = [
    "atime",
    "ctime",
    "gid",
    "itime",
    "mtime",
    "nlink",
    "objectid",
    "objname",
    "policyname",
    "size",
    "type",
    "uid",
];

/// Splits `k1=v1, k2=v2` into pairs; values may not contain commas.
pub fn parse_meta_header(value: &str) -> BTreeMap<String, String> {
    value
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

pub fn render_meta_header(metadata: &BTreeMap<String, String>) -> Option<String> {
    if metadata.is_empty() {
        return None;
    }
    Some(
        metadata
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn timestamp(value: Option<&String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|d| d.with_timezone(&Utc))
}

pub fn parse_system_metadata(meta: &BTreeMap<String, String>) -> SystemMetadata {
    SystemMetadata {
        atime: timestamp(meta.get("atime")),
        ctime: timestamp(meta.get("ctime")),
        itime: timestamp(meta.get("itime")),
        mtime: timestamp(meta.get("mtime")),
        gid: meta.get("gid").cloned(),
        uid: meta.get("uid").cloned(),
        nlink: meta.get("nlink").and_then(|v| v.parse().ok()),
        object_id: meta.get("objectid").cloned(),
        object_name: meta.get("objname").cloned(),
        policy_name: meta.get("policyname").cloned(),
        size: meta.get("size").and_then(|v| v.parse().ok()),
        file_type: meta.get("type").map(|v| FileType::parse(v)),
    }
}

/// User keys of `x-emc-meta` plus everything in `x-emc-listable-meta`.
pub fn parse_user_metadata(meta: &BTreeMap<String, String>, listable: Option<&str>) -> UserMetadata {
    UserMetadata {
        metadata: meta
            .iter()
            .filter(|(k, _)| !SYSTEM_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        listable_metadata: listable.map(parse_meta_header).unwrap_or_default(),
        ..Default::default()
    }
}
