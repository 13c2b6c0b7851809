use super::client::SoftLayerClient;
use super::domain::{
    Datacenter, OrderPrice, OrderedGuest, PowerStateKind, ProductItem, ProductOrder, ProductPackage, VirtualGuest,
};
use super::product_items::{
    product_item_to_image, product_items_to_hardware, BOOT_DISK_CATEGORY, CORE_CATEGORY, OS_CATEGORY, RAM_CATEGORY,
};
use crate::config::SoftLayerConfig;
use crate::core::cache::LoadingCache;
use crate::core::retry::{retry_until, RetryPolicy};
use crate::domain::compute::{Hardware, Image, NodeAndInitialCredentials, NodeMetadata, NodeStatus, Template};
use crate::domain::credentials::LoginCredentials;
use crate::domain::location::{Location, LocationScope};
use crate::domain::ports::ComputeServiceAdapter;
use crate::utils::error::{CloudError, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const PROVIDER_ID: &str = "softlayer";
const PACKAGE_CACHE_TTL: Duration = Duration::from_secs(3600);

pub fn node_status(guest: &VirtualGuest) -> NodeStatus {
    match guest.power_state.map(|p| p.key_name) {
        Some(PowerStateKind::Running) => NodeStatus::Running,
        Some(PowerStateKind::Halted) | Some(PowerStateKind::Paused) => NodeStatus::Suspended,
        Some(PowerStateKind::Unrecognized) => NodeStatus::Unrecognized,
        None => NodeStatus::Pending,
    }
}

fn guest_id(id: &str) -> Result<u64> {
    id.parse()
        .map_err(|_| CloudError::invalid_argument(format!("{} is not a virtual guest id", id)))
}

fn price_ids(id: &str) -> Result<Vec<u64>> {
    id.split(',')
        .map(|p| {
            p.trim()
                .parse()
                .map_err(|_| CloudError::invalid_argument(format!("{} is not a list of price ids", id)))
        })
        .collect()
}

fn login(guest: &VirtualGuest) -> Option<LoginCredentials> {
    guest
        .operating_system
        .as_ref()
        .and_then(|os| os.passwords.first())
        .map(|p| LoginCredentials::password(p.username.clone(), p.password.clone()))
}

/// Orders virtual guests out of one product package.
pub struct SoftLayerComputeServiceAdapter {
    client: SoftLayerClient,
    config: SoftLayerConfig,
    provider: Location,
    packages: LoadingCache<String, ProductPackage>,
    login_policy: RetryPolicy,
}

impl SoftLayerComputeServiceAdapter {
    pub fn new(client: SoftLayerClient, config: SoftLayerConfig) -> Self {
        Self {
            client,
            config,
            provider: Location::provider(PROVIDER_ID),
            packages: LoadingCache::new(PACKAGE_CACHE_TTL),
            login_policy: RetryPolicy::default(),
        }
    }

    /// How long to wait for an ordered guest to come up with login details.
    pub fn with_login_policy(mut self, policy: RetryPolicy) -> Self {
        self.login_policy = policy;
        self
    }

    async fn package(&self) -> Result<ProductPackage> {
        let name = &self.config.package_name;
        let client = &self.client;
        self.packages
            .get_or_load(name, || async move {
                let summary = client
                    .list_active_packages()
                    .await?
                    .into_iter()
                    .find(|p| &p.name == name)
                    .ok_or_else(|| CloudError::ResourceNotFound {
                        resource: format!("product package {}", name),
                    })?;
                client
                    .get_product_package(summary.id)
                    .await?
                    .ok_or_else(|| CloudError::ResourceNotFound {
                        resource: format!("product package {}", summary.id),
                    })
            })
            .await
    }

    fn items_in<'a>(package: &'a ProductPackage, category: &'a str) -> impl Iterator<Item = &'a ProductItem> + 'a {
        package.items.iter().filter(move |i| i.has_category(category))
    }
}

#[async_trait]
impl ComputeServiceAdapter for SoftLayerComputeServiceAdapter {
    type Node = VirtualGuest;
    type Hardware = Hardware;
    type Image = Image;
    type Location = Datacenter;

    async fn create_node_with_group_encoded_into_name(
        &self,
        group: &str,
        name: &str,
        template: &Template,
    ) -> Result<NodeAndInitialCredentials<VirtualGuest>> {
        let package = self.package().await?;
        let datacenter = package
            .locations
            .iter()
            .find(|d| d.name == template.location.id)
            .ok_or_else(|| CloudError::ResourceNotFound {
                resource: format!("datacenter {}", template.location.id),
            })?;

        let mut prices = price_ids(&template.hardware.id)?;
        prices.extend(price_ids(&template.image.id)?);
        prices.extend(self.config.default_prices.iter().copied());

        let order = ProductOrder {
            complex_type: ProductOrder::VIRTUAL_GUEST_ORDER.to_string(),
            package_id: package.id,
            location: datacenter.id.to_string(),
            quantity: 1,
            use_hourly_pricing: true,
            prices: prices.into_iter().map(|id| OrderPrice { id }).collect(),
            virtual_guests: vec![OrderedGuest {
                hostname: name.to_string(),
                domain: self.config.domain.clone(),
            }],
        };
        tracing::debug!(group, name, datacenter = %datacenter.name, ">> ordering guest");
        let receipt = self.client.place_order(&order).await?;

        let guest = self
            .client
            .list_virtual_guests()
            .await?
            .into_iter()
            .find(|g| g.hostname == name)
            .ok_or_else(|| {
                CloudError::illegal_state(format!("order {} placed but no guest named {}", receipt.order_id, name))
            })?;

        let client = &self.client;
        let id = guest.id;
        let guest = retry_until(&self.login_policy, &format!("guest {} login details", id), || async move {
            client
                .get_virtual_guest(id)
                .await
                .map(|g| g.filter(VirtualGuest::is_ready))
        })
        .await?;
        tracing::debug!(name, guest = id, "<< guest ready");

        Ok(NodeAndInitialCredentials {
            node_id: id.to_string(),
            credentials: login(&guest),
            node: guest,
        })
    }

    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>> {
        let package = self.package().await?;
        let mut profiles = Vec::new();
        for core in Self::items_in(&package, CORE_CATEGORY) {
            for ram in Self::items_in(&package, RAM_CATEGORY) {
                for disk in Self::items_in(&package, BOOT_DISK_CATEGORY) {
                    let items = [core.clone(), ram.clone(), disk.clone()];
                    match product_items_to_hardware(&items) {
                        Ok(hardware) => profiles.push(hardware),
                        Err(e) => tracing::debug!(error = %e, "skipping hardware combination"),
                    }
                }
            }
        }
        Ok(profiles)
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let package = self.package().await?;
        Ok(Self::items_in(&package, OS_CATEGORY)
            .filter_map(|item| match product_item_to_image(item) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::debug!(item = item.id, error = %e, "skipping os item");
                    None
                }
            })
            .collect())
    }

    async fn list_locations(&self) -> Result<Vec<Datacenter>> {
        Ok(self.package().await?.locations)
    }

    async fn list_nodes(&self) -> Result<Vec<VirtualGuest>> {
        self.client.list_virtual_guests().await
    }

    async fn get_node(&self, id: &str) -> Result<Option<VirtualGuest>> {
        self.client.get_virtual_guest(guest_id(id)?).await
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        let Some(guest) = self.client.get_virtual_guest(guest_id(id)?).await? else {
            return Ok(());
        };
        let billing = guest
            .billing_item
            .ok_or_else(|| CloudError::illegal_state(format!("guest {} has no billing item", id)))?;
        if !self.client.cancel_service(billing.id).await? {
            tracing::warn!(node = id, billing_item = billing.id, "billing item was not cancelled");
        }
        Ok(())
    }

    async fn reboot_node(&self, id: &str) -> Result<()> {
        self.client.reboot_hard_virtual_guest(guest_id(id)?).await
    }

    async fn resume_node(&self, id: &str) -> Result<()> {
        self.client.resume_virtual_guest(guest_id(id)?).await
    }

    async fn suspend_node(&self, id: &str) -> Result<()> {
        self.client.pause_virtual_guest(guest_id(id)?).await
    }

    fn to_node_metadata(&self, guest: &VirtualGuest) -> NodeMetadata {
        let mut md = NodeMetadata::new(guest.id.to_string(), guest.hostname.clone(), node_status(guest));
        md.backend_status = guest.power_state.map(|p| p.key_name.to_string());
        md.location = guest.datacenter.as_ref().map(|d| self.to_location(d));
        md.public_addresses = guest.primary_ip_address.iter().cloned().collect();
        md.private_addresses = guest.primary_backend_ip_address.iter().cloned().collect();
        md.credentials = login(guest);
        md
    }

    fn to_hardware(&self, hardware: &Hardware) -> Hardware {
        hardware.clone()
    }

    fn to_image(&self, image: &Image) -> Image {
        image.clone()
    }

    fn to_location(&self, datacenter: &Datacenter) -> Location {
        let mut location = Location::new(
            datacenter.name.clone(),
            LocationScope::Zone,
            datacenter.long_name.clone().unwrap_or_else(|| datacenter.name.clone()),
        )
        .with_parent(self.provider.clone());
        if let Some(address) = &datacenter.location_address {
            let code = match (&address.country, &address.state) {
                (Some(country), Some(state)) => Some(format!("{}-{}", country, state)),
                (Some(country), None) => Some(country.clone()),
                _ => None,
            };
            location = location.with_iso3166_codes(code);
        }
        location
    }
}
