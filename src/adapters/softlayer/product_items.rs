//! Conversions from catalog product items to portable hardware and images.

use super::domain::ProductItem;
use crate::domain::compute::{Hardware, Image, ImageStatus, OperatingSystem, OsFamily, Processor, Volume, VolumeType};
use crate::utils::error::{CloudError, Result};
use regex::Regex;
use std::sync::LazyLock;

pub const CORE_CATEGORY: &str = "guest_core";
pub const RAM_CATEGORY: &str = "ram";
pub const BOOT_DISK_CATEGORY: &str = "guest_disk0";
pub const OS_CATEGORY: &str = "os";
pub const DEFAULT_CORE_SPEED: f64 = 2.0;

static CORE_SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Private )?[0-9]+ x ([.0-9]+) GHz Cores?").expect("static core speed pattern"));
static DISK_CATEGORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^guest_disk(\d+)$").expect("static disk category pattern"));
static BITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+) ?bit").expect("static bits pattern"));
static VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)*)").expect("static version pattern"));

const OS_PREFIXES: [(&str, OsFamily); 7] = [
    ("CentOS", OsFamily::Centos),
    ("Debian GNU/Linux", OsFamily::Debian),
    ("Fedora Release", OsFamily::Fedora),
    ("Red Hat Enterprise Linux", OsFamily::Rhel),
    ("Ubuntu Linux", OsFamily::Ubuntu),
    ("Windows Server", OsFamily::Windows),
    ("CloudLinux", OsFamily::CloudLinux),
];

/// GHz per core out of descriptions like `Private 2 x 2.0 GHz Cores`.
pub fn core_speed(description: &str) -> f64 {
    CORE_SPEED
        .captures(description)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(DEFAULT_CORE_SPEED)
}

fn disk_index(item: &ProductItem) -> Option<u32> {
    item.categories
        .iter()
        .chain(item.prices.iter().flat_map(|p| p.categories.iter()))
        .find_map(|c| DISK_CATEGORY.captures(&c.category_code))
        .and_then(|caps| caps[1].parse().ok())
}

fn price_id(item: &ProductItem) -> Result<u64> {
    item.price_id()
        .ok_or_else(|| CloudError::invalid_argument(format!("product item {} has no price", item.id)))
}

fn exactly_one<'a>(items: &'a [ProductItem], category: &str) -> Result<&'a ProductItem> {
    let mut matching = items.iter().filter(|i| i.has_category(category));
    match (matching.next(), matching.next()) {
        (Some(item), None) => Ok(item),
        (None, _) => Err(CloudError::invalid_argument(format!("no {} item", category))),
        (Some(_), Some(_)) => Err(CloudError::invalid_argument(format!("more than one {} item", category))),
    }
}

/// One core item, one ram item and at least one `guest_disk0` item become a
/// hardware profile whose id lists their price ids.
pub fn product_items_to_hardware(items: &[ProductItem]) -> Result<Hardware> {
    let core = exactly_one(items, CORE_CATEGORY)?;
    let ram = exactly_one(items, RAM_CATEGORY)?;
    if !items.iter().any(|i| i.has_category(BOOT_DISK_CATEGORY)) {
        return Err(CloudError::invalid_argument(format!("no {} item", BOOT_DISK_CATEGORY)));
    }

    let mut disks: Vec<(u32, &ProductItem)> = items
        .iter()
        .filter_map(|i| disk_index(i).map(|index| (index, i)))
        .collect();
    disks.sort_by_key(|(index, _)| *index);

    let mut ids = vec![price_id(core)?, price_id(ram)?];
    for (_, disk) in &disks {
        ids.push(price_id(disk)?);
    }
    let id = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");

    let volumes = disks
        .iter()
        .map(|(index, disk)| Volume {
            id: None,
            kind: if disk.description.contains("SAN") {
                VolumeType::San
            } else {
                VolumeType::Local
            },
            size_gb: disk.capacity.map(|c| c as f32),
            device: None,
            boot_device: *index == 0,
            durable: true,
        })
        .collect();

    Ok(Hardware {
        name: id.clone(),
        id,
        processors: vec![Processor {
            cores: core.capacity.unwrap_or(1.0),
            speed: core_speed(&core.description),
        }],
        ram_mb: (ram.capacity.unwrap_or(0.0) * 1024.0).round() as u32,
        volumes,
        location: None,
        hypervisor: Some("XenServer".to_string()),
    })
}

/// The operating system an `os` item describes.
pub fn os_from_description(description: &str) -> OperatingSystem {
    let (family, rest) = OS_PREFIXES
        .iter()
        .find_map(|(prefix, family)| description.strip_prefix(prefix).map(|rest| (*family, rest)))
        .unwrap_or((OsFamily::Unrecognized, description));
    let is_64bit = BITS
        .captures(description)
        .map(|caps| &caps[1] == "64")
        .unwrap_or(false)
        || description.contains("x64");
    OperatingSystem {
        family,
        version: VERSION.captures(rest).map(|caps| caps[1].to_string()),
        arch: None,
        description: description.to_string(),
        is_64bit,
    }
}

pub fn product_item_to_image(item: &ProductItem) -> Result<Image> {
    Ok(Image {
        id: price_id(item)?.to_string(),
        name: item.description.clone(),
        os: os_from_description(&item.description),
        description: item.description.clone(),
        location: None,
        status: ImageStatus::Available,
        default_credentials: None,
    })
}
