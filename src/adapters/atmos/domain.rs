use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    RegularFile,
}

impl FileType {
    pub fn parse(value: &str) -> FileType {
        match value {
            "directory" => FileType::Directory,
            _ => FileType::RegularFile,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Directory => f.write_str("directory"),
            FileType::RegularFile => f.write_str("regular"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub object_id: String,
    pub file_type: FileType,
    pub object_name: String,
}

/// A page of directory entries plus the `x-emc-token` for the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedSet<T> {
    pub items: Vec<T>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemMetadata {
    pub atime: Option<DateTime<Utc>>,
    pub ctime: Option<DateTime<Utc>>,
    pub itime: Option<DateTime<Utc>>,
    pub mtime: Option<DateTime<Utc>>,
    pub gid: Option<String>,
    pub uid: Option<String>,
    pub nlink: Option<u32>,
    pub object_id: Option<String>,
    pub object_name: Option<String>,
    pub policy_name: Option<String>,
    pub size: Option<u64>,
    pub file_type: Option<FileType>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserMetadata {
    pub metadata: BTreeMap<String, String>,
    pub listable_metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub listable_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentMetadata {
    pub name: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_md5: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtmosObject {
    pub content_metadata: ContentMetadata,
    pub system_metadata: Option<SystemMetadata>,
    pub user_metadata: UserMetadata,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub token: Option<String>,
}

impl ListOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub public_read: bool,
}

impl PutOptions {
    pub fn public_read() -> Self {
        Self { public_read: true }
    }
}
