use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItemCategory {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub category_code: String,
}

impl ProductItemCategory {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id: 0,
            name: code.clone(),
            category_code: code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItemPrice {
    pub id: u64,
    #[serde(default)]
    pub item_id: Option<u64>,
    #[serde(default)]
    pub recurring_fee: Option<String>,
    #[serde(default)]
    pub hourly_recurring_fee: Option<String>,
    #[serde(default)]
    pub categories: Vec<ProductItemCategory>,
}

impl ProductItemPrice {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            item_id: None,
            recurring_fee: None,
            hourly_recurring_fee: None,
            categories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItem {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub capacity: Option<f64>,
    #[serde(default)]
    pub prices: Vec<ProductItemPrice>,
    #[serde(default)]
    pub categories: Vec<ProductItemCategory>,
}

impl ProductItem {
    pub fn has_category(&self, code: &str) -> bool {
        self.categories.iter().any(|c| c.category_code == code)
            || self
                .prices
                .iter()
                .flat_map(|p| p.categories.iter())
                .any(|c| c.category_code == code)
    }

    /// The first price; orders reference prices rather than items.
    pub fn price_id(&self) -> Option<u64> {
        self.prices.first().map(|p| p.id)
    }
}

/// Capacity arrives as a number or a numeric string depending on the item.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datacenter {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub location_address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPackage {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<ProductItem>,
    #[serde(default)]
    pub locations: Vec<Datacenter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerStateKind {
    Halted,
    Paused,
    Running,
    Unrecognized,
}

impl PowerStateKind {
    /// Accepts both `Running` and `RUNNING`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "HALTED" => PowerStateKind::Halted,
            "PAUSED" => PowerStateKind::Paused,
            "RUNNING" => PowerStateKind::Running,
            _ => PowerStateKind::Unrecognized,
        }
    }
}

impl fmt::Display for PowerStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PowerStateKind::Halted => "Halted",
            PowerStateKind::Paused => "Paused",
            PowerStateKind::Running => "Running",
            PowerStateKind::Unrecognized => "Unrecognized",
        };
        f.write_str(s)
    }
}

impl Serialize for PowerStateKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PowerStateKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(PowerStateKind::parse(&value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerState {
    pub key_name: PowerStateKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Password {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemInfo {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub passwords: Vec<Password>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingItem {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualGuest {
    pub id: u64,
    pub hostname: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub fully_qualified_domain_name: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub max_cpu: Option<u32>,
    #[serde(default)]
    pub max_memory: Option<u32>,
    #[serde(default)]
    pub start_cpus: Option<u32>,
    #[serde(default)]
    pub primary_ip_address: Option<String>,
    #[serde(default)]
    pub primary_backend_ip_address: Option<String>,
    #[serde(default)]
    pub active_transaction_count: Option<u32>,
    #[serde(default)]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub billing_item: Option<BillingItem>,
    #[serde(default)]
    pub operating_system: Option<OperatingSystemInfo>,
    #[serde(default)]
    pub datacenter: Option<Datacenter>,
    #[serde(default)]
    pub power_state: Option<PowerState>,
}

impl VirtualGuest {
    /// Addresses assigned and no provisioning transaction left.
    pub fn is_ready(&self) -> bool {
        self.primary_backend_ip_address.is_some() && self.active_transaction_count.unwrap_or(0) == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedGuest {
    pub hostname: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOrder {
    pub complex_type: String,
    pub package_id: u64,
    /// Datacenter id.
    pub location: String,
    pub quantity: u32,
    pub use_hourly_pricing: bool,
    pub prices: Vec<OrderPrice>,
    pub virtual_guests: Vec<OrderedGuest>,
}

impl ProductOrder {
    pub const VIRTUAL_GUEST_ORDER: &'static str = "SoftLayer_Container_Product_Order_Virtual_Guest";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPrice {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOrderReceipt {
    pub order_id: u64,
    #[serde(default)]
    pub order_details: Option<serde_json::Value>,
}
