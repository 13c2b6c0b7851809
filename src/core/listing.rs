//! Container listing for stores that hold every entry locally: marker, directory
//! prefix, page size, `/` delimiter collapsing and the detailed flag.

use crate::domain::blob::{BlobMetadata, ListContainerOptions, PageSet, StorageMetadata, StorageType};
use std::collections::BTreeSet;

const DELIMITER: char = '/';

/// Pages `entries` (any order) according to `options`.
pub fn page_listing(mut entries: Vec<BlobMetadata>, options: &ListContainerOptions) -> PageSet<StorageMetadata> {
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let prefix = options.normalized_dir().map(|d| format!("{}{}", d, DELIMITER));

    let filtered: Vec<BlobMetadata> = entries
        .into_iter()
        .filter(|e| options.marker.as_ref().map_or(true, |m| e.name.as_str() > m.as_str()))
        .filter(|e| match &prefix {
            Some(p) => e.name.starts_with(p.as_str()) && e.name != *p,
            None => true,
        })
        .collect();

    let max = options.effective_max_results();
    let truncated = filtered.len() > max;
    let page: Vec<BlobMetadata> = filtered.into_iter().take(max).collect();
    let next_marker = if truncated {
        page.last().map(|e| e.name.clone())
    } else {
        None
    };

    let items = if options.recursive {
        page.into_iter().map(|e| to_listing_entry(e, options.detailed)).collect()
    } else {
        collapse(page, prefix.as_deref().unwrap_or(""), options.detailed)
    };

    PageSet::new(items, next_marker)
}

fn to_listing_entry(entry: BlobMetadata, detailed: bool) -> StorageMetadata {
    if entry.is_directory_marker() || entry.name.ends_with(DELIMITER) {
        return StorageMetadata::relative_path(entry.name.trim_end_matches(DELIMITER));
    }
    let mut md = entry.to_storage_metadata();
    if !detailed {
        md.user_metadata.clear();
    }
    md
}

fn collapse(page: Vec<BlobMetadata>, prefix: &str, detailed: bool) -> Vec<StorageMetadata> {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();
    for entry in page {
        let rest = &entry.name[prefix.len()..];
        match rest.split_once(DELIMITER) {
            None => items.push(to_listing_entry(entry, detailed)),
            Some((segment, _)) => {
                let name = format!("{}{}", prefix, segment);
                if seen.insert(name.clone()) {
                    items.push(StorageMetadata::new(StorageType::RelativePath, name));
                }
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blob::DIRECTORY_CONTENT_TYPE;

    fn blob(name: &str) -> BlobMetadata {
        let mut md = BlobMetadata {
            name: name.to_string(),
            container: "c".to_string(),
            size: Some(1),
            ..Default::default()
        };
        md.user_metadata.insert("owner".into(), "ops".into());
        md
    }

    fn marker(name: &str) -> BlobMetadata {
        let mut md = blob(name);
        md.content.content_type = Some(DIRECTORY_CONTENT_TYPE.to_string());
        md
    }

    fn names(page: &PageSet<StorageMetadata>) -> Vec<(StorageType, String)> {
        page.items.iter().map(|m| (m.kind, m.name.clone())).collect()
    }

    fn fixture() -> Vec<BlobMetadata> {
        vec![
            blob("b.txt"),
            blob("a.txt"),
            marker("dir/"),
            blob("dir/one.txt"),
            blob("dir/sub/two.txt"),
            blob("dir/sub/three.txt"),
            blob("other/x"),
        ]
    }

    #[test]
    fn test_root_listing_collapses_directories() {
        let page = page_listing(fixture(), &ListContainerOptions::default());
        assert_eq!(
            names(&page),
            vec![
                (StorageType::Blob, "a.txt".to_string()),
                (StorageType::Blob, "b.txt".to_string()),
                (StorageType::RelativePath, "dir".to_string()),
                (StorageType::RelativePath, "other".to_string()),
            ]
        );
        assert_eq!(page.next_marker, None);
        assert!(page.items[0].user_metadata.is_empty());
    }

    #[test]
    fn test_dir_listing_reports_full_prefix() {
        let page = page_listing(fixture(), &ListContainerOptions::in_directory("dir"));
        assert_eq!(
            names(&page),
            vec![
                (StorageType::Blob, "dir/one.txt".to_string()),
                (StorageType::RelativePath, "dir/sub".to_string()),
            ]
        );
    }

    #[test]
    fn test_recursive_listing_keeps_everything() {
        let page = page_listing(fixture(), &ListContainerOptions::recursive().with_details());
        assert_eq!(page.len(), 7);
        assert_eq!(page.items[2].kind, StorageType::RelativePath);
        assert_eq!(page.items[2].name, "dir");
        assert_eq!(page.items[0].user_metadata.get("owner").map(String::as_str), Some("ops"));
    }

    #[test]
    fn test_marker_and_max_results() {
        let options = ListContainerOptions::recursive().max_results(2);
        let first = page_listing(fixture(), &options);
        assert_eq!(first.len(), 2);
        assert_eq!(first.next_marker.as_deref(), Some("b.txt"));

        let second = page_listing(fixture(), &options.clone().with_marker("b.txt"));
        assert_eq!(second.items[0].name, "dir");
        assert_eq!(second.next_marker.as_deref(), Some("dir/one.txt"));

        let last = page_listing(fixture(), &options.with_marker("dir/sub/two.txt"));
        assert_eq!(last.len(), 1);
        assert_eq!(last.next_marker, None);
    }

    #[test]
    fn test_exact_page_has_no_marker() {
        let options = ListContainerOptions::recursive().max_results(7);
        assert_eq!(page_listing(fixture(), &options).next_marker, None);
    }
}
