use super::domain::{ProductOrder, ProductOrderReceipt, ProductPackage, VirtualGuest};
use crate::core::http::{FallbackExt, RestClient};
use crate::domain::credentials::Credentials;
use crate::utils::error::Result;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

pub const DEFAULT_ENDPOINT: &str = "https://api.softlayer.com/rest/v3";

pub const GUEST_MASK: &str =
    "virtualGuests.powerState;virtualGuests.operatingSystem.passwords;virtualGuests.datacenter;virtualGuests.billingItem";
const SINGLE_GUEST_MASK: &str = "powerState;operatingSystem.passwords;datacenter;billingItem";
const PACKAGE_MASK: &str = "items;items.prices;items.categories;locations";

/// JSON client for the SoftLayer REST interface.
#[derive(Clone)]
pub struct SoftLayerClient {
    rest: RestClient,
    credentials: Credentials,
}

impl SoftLayerClient {
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(endpoint)?,
            credentials,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .rest
            .request(method, path)?
            .basic_auth(&self.credentials.identity, Some(&self.credentials.credential))
            .header(ACCEPT, "application/json"))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.rest.execute(builder).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn list_virtual_guests(&self) -> Result<Vec<VirtualGuest>> {
        let builder = self
            .request(Method::GET, "SoftLayer_Account/VirtualGuests.json")?
            .query(&[("objectMask", GUEST_MASK)]);
        self.json(builder).await
    }

    pub async fn get_virtual_guest(&self, id: u64) -> Result<Option<VirtualGuest>> {
        let builder = self
            .request(Method::GET, &format!("SoftLayer_Virtual_Guest/{}.json", id))?
            .query(&[("objectMask", SINGLE_GUEST_MASK)]);
        self.json(builder).await.or_none_on_not_found()
    }

    async fn guest_action(&self, id: u64, action: &str) -> Result<()> {
        tracing::debug!(guest = id, action, ">> guest action");
        let builder = self.request(Method::GET, &format!("SoftLayer_Virtual_Guest/{}/{}.json", id, action))?;
        self.rest.execute(builder).await?;
        tracing::debug!(guest = id, action, "<< guest action");
        Ok(())
    }

    pub async fn reboot_hard_virtual_guest(&self, id: u64) -> Result<()> {
        self.guest_action(id, "rebootHard").await
    }

    pub async fn pause_virtual_guest(&self, id: u64) -> Result<()> {
        self.guest_action(id, "pause").await
    }

    pub async fn resume_virtual_guest(&self, id: u64) -> Result<()> {
        self.guest_action(id, "resume").await
    }

    /// False when the billing item no longer exists.
    pub async fn cancel_service(&self, billing_item_id: u64) -> Result<bool> {
        tracing::debug!(billing_item = billing_item_id, ">> cancelling service");
        let builder = self.request(
            Method::GET,
            &format!("SoftLayer_Billing_Item/{}/cancelService.json", billing_item_id),
        )?;
        let cancelled = self.json::<bool>(builder).await.or_none_on_not_found()?;
        tracing::debug!(billing_item = billing_item_id, ?cancelled, "<< cancelled service");
        Ok(cancelled.unwrap_or(false))
    }

    pub async fn list_active_packages(&self) -> Result<Vec<ProductPackage>> {
        self.json(self.request(Method::GET, "SoftLayer_Account/ActivePackages.json")?)
            .await
    }

    pub async fn get_product_package(&self, id: u64) -> Result<Option<ProductPackage>> {
        let builder = self
            .request(Method::GET, &format!("SoftLayer_Product_Package/{}.json", id))?
            .query(&[("objectMask", PACKAGE_MASK)]);
        self.json(builder).await.or_none_on_not_found()
    }

    pub async fn place_order(&self, order: &ProductOrder) -> Result<ProductOrderReceipt> {
        tracing::debug!(package = order.package_id, location = %order.location, ">> placing order");
        let builder = self
            .request(Method::POST, "SoftLayer_Product_Order/placeOrder.json")?
            .json(&json!({ "parameters": [order] }));
        let receipt: ProductOrderReceipt = self.json(builder).await?;
        tracing::debug!(order = receipt.order_id, "<< placed order");
        Ok(receipt)
    }
}
