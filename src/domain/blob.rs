use crate::domain::location::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MAX_RESULTS: usize = 1000;
pub const DIRECTORY_CONTENT_TYPE: &str = "application/directory";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Container,
    Blob,
    Folder,
    RelativePath,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageType::Container => "container",
            StorageType::Blob => "blob",
            StorageType::Folder => "folder",
            StorageType::RelativePath => "relative_path",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content_md5: Option<Vec<u8>>,
    pub content_disposition: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
}

/// One entry of a listing: a container, a blob or a collapsed directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMetadata {
    pub kind: StorageType,
    pub name: String,
    pub location: Option<Location>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
}

impl StorageMetadata {
    pub fn new(kind: StorageType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            location: None,
            etag: None,
            last_modified: None,
            size: None,
            user_metadata: BTreeMap::new(),
        }
    }

    pub fn container(name: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            location,
            ..Self::new(StorageType::Container, name)
        }
    }

    pub fn relative_path(name: impl Into<String>) -> Self {
        Self::new(StorageType::RelativePath, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub name: String,
    pub container: String,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    #[serde(default)]
    pub user_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub content: ContentMetadata,
}

impl BlobMetadata {
    pub fn is_directory_marker(&self) -> bool {
        self.content.content_type.as_deref() == Some(DIRECTORY_CONTENT_TYPE)
    }

    pub fn to_storage_metadata(&self) -> StorageMetadata {
        StorageMetadata {
            kind: StorageType::Blob,
            name: self.name.clone(),
            location: None,
            etag: self.etag.clone(),
            last_modified: self.last_modified,
            size: self.size,
            user_metadata: self.user_metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub metadata: BlobMetadata,
    pub payload: Vec<u8>,
}

impl Blob {
    pub fn builder(name: impl Into<String>) -> BlobBuilder {
        BlobBuilder {
            metadata: BlobMetadata {
                name: name.into(),
                ..Default::default()
            },
            payload: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

pub struct BlobBuilder {
    metadata: BlobMetadata,
    payload: Vec<u8>,
}

impl BlobBuilder {
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content.content_type = Some(content_type.into());
        self
    }

    pub fn content_disposition(mut self, value: impl Into<String>) -> Self {
        self.metadata.content.content_disposition = Some(value.into());
        self
    }

    pub fn content_encoding(mut self, value: impl Into<String>) -> Self {
        self.metadata.content.content_encoding = Some(value.into());
        self
    }

    pub fn user_metadata<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata
            .user_metadata
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn build(mut self) -> Blob {
        let len = self.payload.len() as u64;
        self.metadata.content.content_length = Some(len);
        self.metadata.size = Some(len);
        if self.metadata.content.content_type.is_none() {
            self.metadata.content.content_type = Some(DEFAULT_CONTENT_TYPE.to_string());
        }
        Blob {
            metadata: self.metadata,
            payload: self.payload,
        }
    }
}

/// A page of results; `next_marker` is set when more entries follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSet<T> {
    pub items: Vec<T>,
    pub next_marker: Option<String>,
}

impl<T> PageSet<T> {
    pub fn new(items: Vec<T>, next_marker: Option<String>) -> Self {
        Self { items, next_marker }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> IntoIterator for PageSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListContainerOptions {
    pub dir: Option<String>,
    pub marker: Option<String>,
    pub max_results: Option<usize>,
    pub recursive: bool,
    pub detailed: bool,
}

impl ListContainerOptions {
    pub fn in_directory(dir: impl Into<String>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Default::default()
        }
    }

    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Default::default()
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn with_details(mut self) -> Self {
        self.detailed = true;
        self
    }

    pub fn effective_max_results(&self) -> usize {
        self.max_results.unwrap_or(DEFAULT_MAX_RESULTS)
    }

    /// Directory without trailing slashes, or `None` for the container root.
    pub fn normalized_dir(&self) -> Option<&str> {
        self.dir
            .as_deref()
            .map(|d| d.trim_end_matches('/'))
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=N-`
    From(u64),
    /// `bytes=-N`, the final N bytes
    Last(u64),
    /// `bytes=A-B`, inclusive
    Between(u64, u64),
}

impl ByteRange {
    pub fn parse(value: &str) -> Option<ByteRange> {
        let value = value.trim();
        if let Some(len) = value.strip_prefix('-') {
            return len.parse().ok().map(ByteRange::Last);
        }
        if let Some(offset) = value.strip_suffix('-') {
            return offset.parse().ok().map(ByteRange::From);
        }
        let (first, last) = value.split_once('-')?;
        let first: u64 = first.parse().ok()?;
        let last: u64 = last.parse().ok()?;
        (first <= last).then_some(ByteRange::Between(first, last))
    }

    /// Renders ranges as a single `Range` header value.
    pub fn header_value(ranges: &[ByteRange]) -> Option<String> {
        if ranges.is_empty() {
            return None;
        }
        let parts: Vec<String> = ranges.iter().map(ToString::to_string).collect();
        Some(format!("bytes={}", parts.join(",")))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteRange::From(offset) => write!(f, "{}-", offset),
            ByteRange::Last(len) => write!(f, "-{}", len),
            ByteRange::Between(first, last) => write!(f, "{}-{}", first, last),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetOptions {
    pub ranges: Vec<ByteRange>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl GetOptions {
    pub fn range(mut self, range: ByteRange) -> Self {
        self.ranges.push(range);
        self
    }

    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    pub fn if_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(since);
        self
    }

    pub fn if_unmodified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_unmodified_since = Some(since);
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.if_match.is_some()
            || self.if_none_match.is_some()
            || self.if_modified_since.is_some()
            || self.if_unmodified_since.is_some()
    }
}
