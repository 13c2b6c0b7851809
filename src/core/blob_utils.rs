use crate::domain::blob::{Blob, ByteRange, GetOptions, ListContainerOptions, StorageMetadata, StorageType};
use crate::domain::ports::BlobStore;
use crate::utils::error::{CloudError, Result};
use md5::{Digest, Md5};

/// Every entry of a container, following markers across pages.
pub async fn list_all<S: BlobStore + ?Sized>(store: &S, container: &str) -> Result<Vec<StorageMetadata>> {
    let mut entries = Vec::new();
    let mut options = ListContainerOptions::recursive();
    loop {
        let page = store.list_container(container, &options).await?;
        let next = page.next_marker.clone();
        entries.extend(page);
        match next {
            Some(marker) => options = options.with_marker(marker),
            None => return Ok(entries),
        }
    }
}

pub async fn clear_container<S: BlobStore + ?Sized>(store: &S, container: &str) -> Result<()> {
    let entries = list_all(store, container).await?;
    let (blobs, mut dirs): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.kind == StorageType::Blob);

    tracing::debug!(container, blobs = blobs.len(), dirs = dirs.len(), ">> clearing container");
    for blob in &blobs {
        store.remove_blob(container, &blob.name).await?;
    }
    // deepest first so parents are empty when removed
    dirs.sort_by_key(|d| std::cmp::Reverse(d.name.matches('/').count()));
    for dir in &dirs {
        store.delete_directory(container, &dir.name).await?;
    }
    tracing::debug!(container, "<< cleared container");
    Ok(())
}

pub async fn count_blobs<S: BlobStore + ?Sized>(store: &S, container: &str) -> Result<u64> {
    let entries = list_all(store, container).await?;
    Ok(entries.iter().filter(|e| e.kind == StorageType::Blob).count() as u64)
}

/// MD5 digest of a payload and its lowercase hex form, the etag local stores report.
pub fn md5_etag(payload: &[u8]) -> (Vec<u8>, String) {
    let digest = Md5::digest(payload).to_vec();
    let etag = hex::encode(&digest);
    (digest, etag)
}

fn unquote(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}

/// Applies conditional headers, then byte ranges, to a stored blob.
pub fn apply_get_options(mut blob: Blob, options: &GetOptions) -> Result<Blob> {
    let etag = blob.metadata.etag.clone().unwrap_or_default();
    let modified = blob.metadata.last_modified;

    if let Some(expected) = &options.if_match {
        if unquote(expected) != etag {
            return Err(CloudError::PreconditionFailed {
                message: format!("{} does not match etag {}", expected, etag),
            });
        }
    }
    if let Some(unexpected) = &options.if_none_match {
        if unquote(unexpected) == etag {
            return Err(CloudError::NotModified {
                message: format!("etag {} matches", etag),
            });
        }
    }
    if let (Some(since), Some(modified)) = (options.if_modified_since, modified) {
        if modified <= since {
            return Err(CloudError::NotModified {
                message: format!("not modified since {}", since),
            });
        }
    }
    if let (Some(since), Some(modified)) = (options.if_unmodified_since, modified) {
        if modified > since {
            return Err(CloudError::PreconditionFailed {
                message: format!("modified after {}", since),
            });
        }
    }

    if options.ranges.is_empty() {
        return Ok(blob);
    }

    let len = blob.payload.len() as u64;
    let mut selected = Vec::new();
    for range in &options.ranges {
        let (start, end) = match *range {
            ByteRange::From(offset) => (offset, len.saturating_sub(1)),
            ByteRange::Last(count) => (len.saturating_sub(count), len.saturating_sub(1)),
            ByteRange::Between(first, last) => (first, last.min(len.saturating_sub(1))),
        };
        if len == 0 || start >= len {
            return Err(CloudError::invalid_argument(format!(
                "range {} starts beyond the {} byte payload of {}",
                range,
                len,
                blob.name()
            )));
        }
        if start > end {
            return Err(CloudError::invalid_argument(format!("range {} ends before it starts", range)));
        }
        selected.extend_from_slice(&blob.payload[start as usize..=end as usize]);
    }
    blob.metadata.content.content_length = Some(selected.len() as u64);
    blob.payload = selected;
    Ok(blob)
}
