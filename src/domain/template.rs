use crate::domain::compute::{compare_versions, Hardware, Image, OsFamily, Template, TemplateOptions};
use crate::domain::location::Location;
use crate::utils::error::{CloudError, Result};
use regex::Regex;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwarePreference {
    #[default]
    Smallest,
    Fastest,
    Biggest,
}

/// Criteria for choosing hardware, image and location out of a provider's catalog.
#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    pub hardware_id: Option<String>,
    pub image_id: Option<String>,
    pub location_id: Option<String>,
    pub os_family: Option<OsFamily>,
    pub os_version_matches: Option<String>,
    pub os_64bit: Option<bool>,
    pub image_name_matches: Option<String>,
    pub min_cores: Option<f64>,
    pub min_ram_mb: Option<u32>,
    pub min_disk_gb: Option<f64>,
    pub preference: HardwarePreference,
    pub options: TemplateOptions,
}

impl TemplateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hardware_id(mut self, id: impl Into<String>) -> Self {
        self.hardware_id = Some(id.into());
        self
    }

    pub fn image_id(mut self, id: impl Into<String>) -> Self {
        self.image_id = Some(id.into());
        self
    }

    pub fn location_id(mut self, id: impl Into<String>) -> Self {
        self.location_id = Some(id.into());
        self
    }

    pub fn os_family(mut self, family: OsFamily) -> Self {
        self.os_family = Some(family);
        self
    }

    pub fn os_version_matches(mut self, pattern: impl Into<String>) -> Self {
        self.os_version_matches = Some(pattern.into());
        self
    }

    pub fn os_64bit(mut self, is_64bit: bool) -> Self {
        self.os_64bit = Some(is_64bit);
        self
    }

    pub fn image_name_matches(mut self, pattern: impl Into<String>) -> Self {
        self.image_name_matches = Some(pattern.into());
        self
    }

    pub fn min_cores(mut self, cores: f64) -> Self {
        self.min_cores = Some(cores);
        self
    }

    pub fn min_ram(mut self, ram_mb: u32) -> Self {
        self.min_ram_mb = Some(ram_mb);
        self
    }

    pub fn min_disk(mut self, disk_gb: f64) -> Self {
        self.min_disk_gb = Some(disk_gb);
        self
    }

    pub fn smallest(mut self) -> Self {
        self.preference = HardwarePreference::Smallest;
        self
    }

    pub fn fastest(mut self) -> Self {
        self.preference = HardwarePreference::Fastest;
        self
    }

    pub fn biggest(mut self) -> Self {
        self.preference = HardwarePreference::Biggest;
        self
    }

    pub fn options(mut self, options: TemplateOptions) -> Self {
        self.options = options;
        self
    }

    /// Picks the best match from the catalogs.
    pub fn resolve(
        &self,
        hardware: &[Hardware],
        images: &[Image],
        locations: &[Location],
    ) -> Result<Template> {
        let location = self.resolve_location(locations)?;
        let image = self.resolve_image(images, &location)?;
        let hardware = self.resolve_hardware(hardware, &location)?;
        tracing::debug!(
            hardware = %hardware.id,
            image = %image.id,
            location = %location.id,
            "resolved template"
        );
        Ok(Template {
            hardware,
            image,
            location,
            options: self.options.clone(),
        })
    }

    fn resolve_location(&self, locations: &[Location]) -> Result<Location> {
        match &self.location_id {
            Some(id) => locations.iter().find(|l| &l.id == id).cloned().ok_or_else(|| {
                CloudError::ResourceNotFound {
                    resource: format!("location {}", id),
                }
            }),
            None => locations
                .first()
                .cloned()
                .ok_or_else(|| CloudError::ResourceNotFound {
                    resource: "any assignable location".to_string(),
                }),
        }
    }

    fn resolve_image(&self, images: &[Image], location: &Location) -> Result<Image> {
        let version_re = compile(self.os_version_matches.as_deref(), "os_version_matches")?;
        let name_re = compile(self.image_name_matches.as_deref(), "image_name_matches")?;

        images
            .iter()
            .filter(|image| self.image_id.as_ref().map_or(true, |id| &image.id == id))
            .filter(|image| self.os_family.map_or(true, |f| image.os.family == f))
            .filter(|image| self.os_64bit.map_or(true, |b| image.os.is_64bit == b))
            .filter(|image| {
                version_re.as_ref().map_or(true, |re| {
                    image.os.version.as_deref().is_some_and(|v| re.is_match(v))
                })
            })
            .filter(|image| name_re.as_ref().map_or(true, |re| re.is_match(&image.name)))
            .filter(|image| fits_location(image.location.as_ref(), location))
            .max_by(|a, b| compare_images(a, b))
            .cloned()
            .ok_or_else(|| CloudError::ResourceNotFound {
                resource: format!("image matching {}", self.describe_image_criteria()),
            })
    }

    fn resolve_hardware(&self, hardware: &[Hardware], location: &Location) -> Result<Hardware> {
        let candidates = hardware
            .iter()
            .filter(|h| self.hardware_id.as_ref().map_or(true, |id| &h.id == id))
            .filter(|h| self.min_cores.map_or(true, |c| h.total_cores() >= c))
            .filter(|h| self.min_ram_mb.map_or(true, |r| h.ram_mb >= r))
            .filter(|h| self.min_disk_gb.map_or(true, |d| h.total_disk_gb() >= d))
            .filter(|h| fits_location(h.location.as_ref(), location));

        let chosen = match self.preference {
            HardwarePreference::Smallest => candidates.min_by(|a, b| compare_size(a, b)),
            HardwarePreference::Biggest => candidates.max_by(|a, b| compare_size(a, b)),
            HardwarePreference::Fastest => candidates.max_by(|a, b| {
                a.total_speed()
                    .partial_cmp(&b.total_speed())
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| compare_size(b, a))
            }),
        };

        chosen.cloned().ok_or_else(|| CloudError::ResourceNotFound {
            resource: format!("hardware matching {}", self.describe_hardware_criteria()),
        })
    }

    fn describe_image_criteria(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = &self.image_id {
            parts.push(format!("id={}", id));
        }
        if let Some(family) = self.os_family {
            parts.push(format!("os_family={}", family));
        }
        if let Some(v) = &self.os_version_matches {
            parts.push(format!("os_version~{}", v));
        }
        if let Some(b) = self.os_64bit {
            parts.push(format!("64bit={}", b));
        }
        if let Some(n) = &self.image_name_matches {
            parts.push(format!("name~{}", n));
        }
        if parts.is_empty() {
            "any".to_string()
        } else {
            parts.join(",")
        }
    }

    fn describe_hardware_criteria(&self) -> String {
        let mut parts = Vec::new();
        if let Some(id) = &self.hardware_id {
            parts.push(format!("id={}", id));
        }
        if let Some(c) = self.min_cores {
            parts.push(format!("min_cores={}", c));
        }
        if let Some(r) = self.min_ram_mb {
            parts.push(format!("min_ram={}", r));
        }
        if let Some(d) = self.min_disk_gb {
            parts.push(format!("min_disk={}", d));
        }
        if parts.is_empty() {
            "any".to_string()
        } else {
            parts.join(",")
        }
    }
}

fn compile(pattern: Option<&str>, field: &str) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| CloudError::InvalidArgument {
                message: format!("{}: {}", field, e),
            })
        })
        .transpose()
}

/// Unscoped resources fit anywhere; scoped ones fit their location and its children.
fn fits_location(resource_location: Option<&Location>, target: &Location) -> bool {
    match resource_location {
        None => true,
        Some(scope) => target.is_within(&scope.id),
    }
}

fn compare_images(a: &Image, b: &Image) -> Ordering {
    let by_version = match (&a.os.version, &b.os.version) {
        (Some(x), Some(y)) => compare_versions(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };
    by_version.then_with(|| a.name.cmp(&b.name))
}

fn compare_size(a: &Hardware, b: &Hardware) -> Ordering {
    a.total_cores()
        .partial_cmp(&b.total_cores())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.ram_mb.cmp(&b.ram_mb))
        .then_with(|| {
            a.total_disk_gb()
                .partial_cmp(&b.total_disk_gb())
                .unwrap_or(Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compute::{ImageStatus, OperatingSystem, Processor, Volume};
    use crate::domain::location::LocationScope;

    fn hardware(id: &str, cores: f64, speed: f64, ram: u32, disk: f32) -> Hardware {
        Hardware {
            id: id.into(),
            name: id.into(),
            processors: vec![Processor { cores, speed }],
            ram_mb: ram,
            volumes: vec![Volume::local(disk, true)],
            location: None,
            hypervisor: None,
        }
    }

    fn image(id: &str, description: &str, location: Option<Location>) -> Image {
        Image {
            id: id.into(),
            name: description.into(),
            os: OperatingSystem::from_description(description),
            description: description.into(),
            location,
            status: ImageStatus::Available,
            default_credentials: None,
        }
    }

    fn locations() -> Vec<Location> {
        let provider = Location::provider("test");
        let east = Location::new("east", LocationScope::Region, "east").with_parent(provider.clone());
        let west = Location::new("west", LocationScope::Region, "west").with_parent(provider);
        vec![east, west]
    }

    fn catalog() -> (Vec<Hardware>, Vec<Image>) {
        let hardware = vec![
            hardware("small", 1.0, 2.0, 1024, 20.0),
            hardware("fast", 2.0, 3.5, 2048, 20.0),
            hardware("big", 8.0, 2.0, 16384, 200.0),
        ];
        let images = vec![
            image("u1004", "Ubuntu 10.04 LTS 64-bit", None),
            image("u1204", "Ubuntu 12.04 LTS 64-bit", None),
            image("c7", "CentOS 7 64-bit", None),
            image("west-only", "Ubuntu 14.04 LTS 64-bit", Some(locations()[1].clone())),
        ];
        (hardware, images)
    }

    #[test]
    fn test_default_is_smallest_newest_image_first_location() {
        let (hardware, images) = catalog();
        let template = TemplateBuilder::new()
            .os_family(OsFamily::Ubuntu)
            .resolve(&hardware, &images, &locations())
            .unwrap();
        assert_eq!(template.hardware.id, "small");
        assert_eq!(template.location.id, "east");
        // the 14.04 image is scoped to west, so east gets 12.04
        assert_eq!(template.image.id, "u1204");
    }

    #[test]
    fn test_location_scoped_image_in_its_region() {
        let (hardware, images) = catalog();
        let template = TemplateBuilder::new()
            .os_family(OsFamily::Ubuntu)
            .location_id("west")
            .resolve(&hardware, &images, &locations())
            .unwrap();
        assert_eq!(template.image.id, "west-only");
    }

    #[test]
    fn test_fastest_and_biggest() {
        let (hardware, images) = catalog();
        let fastest = TemplateBuilder::new()
            .fastest()
            .resolve(&hardware, &images, &locations())
            .unwrap();
        assert_eq!(fastest.hardware.id, "big");

        let fast_small = TemplateBuilder::new()
            .fastest()
            .min_cores(2.0)
            .min_ram(1024)
            .resolve(&hardware[..2], &images, &locations())
            .unwrap();
        assert_eq!(fast_small.hardware.id, "fast");

        let biggest = TemplateBuilder::new()
            .biggest()
            .resolve(&hardware, &images, &locations())
            .unwrap();
        assert_eq!(biggest.hardware.id, "big");
    }

    #[test]
    fn test_min_ram_filters() {
        let (hardware, images) = catalog();
        let template = TemplateBuilder::new()
            .min_ram(2000)
            .resolve(&hardware, &images, &locations())
            .unwrap();
        assert_eq!(template.hardware.id, "fast");
    }

    #[test]
    fn test_version_regex_and_no_match() {
        let (hardware, images) = catalog();
        let template = TemplateBuilder::new()
            .os_version_matches("^10\\.")
            .resolve(&hardware, &images, &locations())
            .unwrap();
        assert_eq!(template.image.id, "u1004");

        let err = TemplateBuilder::new()
            .os_family(OsFamily::Windows)
            .resolve(&hardware, &images, &locations())
            .unwrap_err();
        assert!(matches!(err, CloudError::ResourceNotFound { .. }));
        assert!(err.to_string().contains("os_family=windows"));
    }

    #[test]
    fn test_unknown_location_is_error() {
        let (hardware, images) = catalog();
        let err = TemplateBuilder::new()
            .location_id("mars")
            .resolve(&hardware, &images, &locations())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_regex_is_invalid_argument() {
        let (hardware, images) = catalog();
        let err = TemplateBuilder::new()
            .image_name_matches("(")
            .resolve(&hardware, &images, &locations())
            .unwrap_err();
        assert!(matches!(err, CloudError::InvalidArgument { .. }));
    }
}
